//! Postgres connection pool.

use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

/// Type alias for the shared Postgres pool used across the whole application.
pub type DbPool = PgPool;

/// Create a new connection pool from the given `database_url`.
///
/// `max_connections` controls the pool ceiling.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!("Connecting to database (max_connections={})", max_connections);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run embedded SQLx migrations located in `db/migrations`.
///
/// Files are numbered (`0001_core.sql`, `0002_...`) and applied in order;
/// every `CREATE TABLE` is `IF NOT EXISTS` so re-running is a no-op.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// List the table names spine-core owns (all carry the `core_` prefix).
/// Used by `GET /database/tables`.
pub async fn list_tables(pool: &DbPool) -> Result<Vec<String>, DbError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT table_name FROM information_schema.tables
        WHERE table_schema = 'public' AND table_name LIKE 'core_%'
        ORDER BY table_name
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(n,)| n).collect())
}

/// Shallow health check: a roundtrip `SELECT 1`.
pub async fn health_check(pool: &DbPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Row counts deleted by [`purge_older_than`], one field per table touched.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct PurgeSummary {
    pub executions: u64,
    pub quality_results: u64,
    pub rejects: u64,
    pub anomalies: u64,
    pub alert_deliveries: u64,
    pub schedule_runs: u64,
}

/// Time-windowed archival: deletes whole rows older than `older_than_days`,
/// never updates one in place.
///
/// `core_dead_letters` is intentionally excluded: its retention is monotone
/// and only `resolved_at` may ever be set on a row, never a delete.
/// Terminal executions cascade-delete their `core_execution_events` rows.
pub async fn purge_older_than(pool: &DbPool, older_than_days: i64) -> Result<PurgeSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = PurgeSummary::default();

    let result = sqlx::query(
        r#"
        DELETE FROM core_executions
        WHERE status IN ('succeeded', 'failed', 'cancelled', 'dead_lettered')
          AND completed_at IS NOT NULL
          AND completed_at < now() - ($1 || ' days')::interval
        "#,
    )
    .bind(older_than_days)
    .execute(&mut *tx)
    .await?;
    summary.executions = result.rows_affected();

    let result = sqlx::query(
        "DELETE FROM core_quality_results WHERE created_at < now() - ($1 || ' days')::interval",
    )
    .bind(older_than_days)
    .execute(&mut *tx)
    .await?;
    summary.quality_results = result.rows_affected();

    let result = sqlx::query(
        "DELETE FROM core_rejects WHERE created_at < now() - ($1 || ' days')::interval",
    )
    .bind(older_than_days)
    .execute(&mut *tx)
    .await?;
    summary.rejects = result.rows_affected();

    let result = sqlx::query(
        "DELETE FROM core_anomalies WHERE created_at < now() - ($1 || ' days')::interval",
    )
    .bind(older_than_days)
    .execute(&mut *tx)
    .await?;
    summary.anomalies = result.rows_affected();

    let result = sqlx::query(
        "DELETE FROM core_alert_deliveries WHERE attempted_at < now() - ($1 || ' days')::interval",
    )
    .bind(older_than_days)
    .execute(&mut *tx)
    .await?;
    summary.alert_deliveries = result.rows_affected();

    let result = sqlx::query(
        "DELETE FROM core_schedule_runs WHERE fired_at < now() - ($1 || ' days')::interval",
    )
    .bind(older_than_days)
    .execute(&mut *tx)
    .await?;
    summary.schedule_runs = result.rows_affected();

    tx.commit().await?;
    info!(?summary, older_than_days, "purged archival rows");
    Ok(summary)
}
