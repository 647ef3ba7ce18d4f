//! Advisory lock client — a thin domain wrapper around
//! `db::repository::locks`, grounded on the original source's
//! `examples/03_resilience/04_concurrency_guard.py` "acquire or skip"
//! pattern. The row itself is the source of truth; this type just gives
//! callers an ergonomic `owner_id` + TTL surface instead of
//! threading a raw pool through every call site.

use db::DbPool;
use uuid::Uuid;

/// Serializes logical work units behind a string key (e.g.
/// `"pipeline:etl:2024-W03"`, `"scheduler:leader"`).
#[derive(Clone)]
pub struct AdvisoryLock {
    pool: DbPool,
}

impl AdvisoryLock {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Attempt to acquire `key` for `owner_id`. Returns `true` iff the
    /// caller now holds the lock (no live holder existed, or the previous
    /// holder's TTL had expired).
    pub async fn acquire(&self, key: &str, owner_id: Uuid, ttl_seconds: i64) -> Result<bool, db::DbError> {
        db::repository::locks::acquire(&self.pool, key, owner_id, ttl_seconds).await
    }

    pub async fn release(&self, key: &str) -> Result<(), db::DbError> {
        db::repository::locks::release(&self.pool, key).await
    }

    pub async fn is_locked(&self, key: &str) -> Result<bool, db::DbError> {
        db::repository::locks::is_locked(&self.pool, key).await
    }

    pub async fn renew(&self, key: &str, owner_id: Uuid, ttl_seconds: i64) -> Result<bool, db::DbError> {
        db::repository::locks::renew(&self.pool, key, owner_id, ttl_seconds).await
    }

    /// Run `f` only if `key` is successfully acquired for the duration of
    /// the call, releasing it afterwards regardless of outcome. Used by the
    /// scheduler's `"scheduler:leader"` election and by any dispatcher call
    /// site that needs to serialize on a logical resource.
    pub async fn with_lock<F, Fut, T>(
        &self,
        key: &str,
        owner_id: Uuid,
        ttl_seconds: i64,
        f: F,
    ) -> Result<Option<T>, db::DbError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        if !self.acquire(key, owner_id, ttl_seconds).await? {
            return Ok(None);
        }
        let result = f().await;
        self.release(key).await?;
        Ok(Some(result))
    }
}
