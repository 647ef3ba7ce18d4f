//! Advisory lock repository, grounded in the concurrency-guard pattern:
//! a lock row with an expiry, acquired with an upsert-if-expired dance
//! rather than a real database advisory lock, so it works identically
//! whether the backing store is Postgres or (in tests) SQLite.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::ConcurrencyLockRow, DbError};

/// Attempt to acquire `lock_key` for `execution_id`. Returns `true` if the
/// lock was acquired (no live holder existed), `false` if another
/// execution currently holds it.
pub async fn acquire(
    pool: &PgPool,
    lock_key: &str,
    execution_id: Uuid,
    ttl_seconds: i64,
) -> Result<bool, DbError> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(ttl_seconds);

    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, ConcurrencyLockRow>(
        "SELECT lock_key, execution_id, acquired_at, expires_at FROM core_concurrency_locks WHERE lock_key = $1 FOR UPDATE",
    )
    .bind(lock_key)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(existing) = existing {
        if existing.expires_at > now {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query("DELETE FROM core_concurrency_locks WHERE lock_key = $1")
            .bind(lock_key)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        "INSERT INTO core_concurrency_locks (lock_key, execution_id, acquired_at, expires_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(lock_key)
    .bind(execution_id)
    .bind(now)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Release a lock. A no-op if the lock does not exist (already expired
/// and reclaimed, or never held).
pub async fn release(pool: &PgPool, lock_key: &str) -> Result<(), DbError> {
    sqlx::query("DELETE FROM core_concurrency_locks WHERE lock_key = $1")
        .bind(lock_key)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn is_locked(pool: &PgPool, lock_key: &str) -> Result<bool, DbError> {
    Ok(get_lock_holder(pool, lock_key).await?.is_some())
}

pub async fn get_lock_holder(
    pool: &PgPool,
    lock_key: &str,
) -> Result<Option<ConcurrencyLockRow>, DbError> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, ConcurrencyLockRow>(
        "SELECT lock_key, execution_id, acquired_at, expires_at FROM core_concurrency_locks WHERE lock_key = $1 AND expires_at > $2",
    )
    .bind(lock_key)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Extend the expiry of a lock still held by `execution_id`. Used for
/// long-running steps that periodically renew their hold.
pub async fn renew(
    pool: &PgPool,
    lock_key: &str,
    execution_id: Uuid,
    ttl_seconds: i64,
) -> Result<bool, DbError> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(ttl_seconds);

    let result = sqlx::query(
        "UPDATE core_concurrency_locks SET expires_at = $1 WHERE lock_key = $2 AND execution_id = $3",
    )
    .bind(expires_at)
    .bind(lock_key)
    .bind(execution_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
