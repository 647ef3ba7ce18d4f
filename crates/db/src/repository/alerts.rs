//! Alert and alert-channel repository.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::{AlertChannelRow, AlertDeliveryRow, AlertRow}, DbError};

// ---------------------------------------------------------------------------
// channels
// ---------------------------------------------------------------------------

pub struct NewAlertChannel {
    pub name: String,
    pub channel_type: String,
    pub config: serde_json::Value,
    pub min_severity: String,
    pub throttle_minutes: i32,
    pub description: Option<String>,
}

pub async fn create_alert_channel(
    pool: &PgPool,
    new: NewAlertChannel,
) -> Result<AlertChannelRow, DbError> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, AlertChannelRow>(
        r#"
        INSERT INTO core_alert_channels (id, name, channel_type, config, min_severity, throttle_minutes, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, name, channel_type, config, enabled, min_severity, throttle_minutes, consecutive_failures, description, created_at
        "#,
    )
    .bind(id)
    .bind(new.name)
    .bind(new.channel_type)
    .bind(new.config)
    .bind(new.min_severity)
    .bind(new.throttle_minutes)
    .bind(new.description)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_alert_channel(pool: &PgPool, id: Uuid) -> Result<AlertChannelRow, DbError> {
    sqlx::query_as::<_, AlertChannelRow>(
        r#"SELECT id, name, channel_type, config, enabled, min_severity, throttle_minutes, consecutive_failures, description, created_at
           FROM core_alert_channels WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

pub async fn list_alert_channels(pool: &PgPool) -> Result<Vec<AlertChannelRow>, DbError> {
    let rows = sqlx::query_as::<_, AlertChannelRow>(
        r#"SELECT id, name, channel_type, config, enabled, min_severity, throttle_minutes, consecutive_failures, description, created_at
           FROM core_alert_channels ORDER BY name ASC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub struct AlertChannelUpdate {
    pub enabled: Option<bool>,
    pub min_severity: Option<String>,
    pub throttle_minutes: Option<i32>,
    pub config: Option<serde_json::Value>,
}

pub async fn update_alert_channel(
    pool: &PgPool,
    id: Uuid,
    patch: AlertChannelUpdate,
) -> Result<AlertChannelRow, DbError> {
    let row = sqlx::query_as::<_, AlertChannelRow>(
        r#"
        UPDATE core_alert_channels
        SET enabled = COALESCE($1, enabled),
            min_severity = COALESCE($2, min_severity),
            throttle_minutes = COALESCE($3, throttle_minutes),
            config = COALESCE($4, config)
        WHERE id = $5
        RETURNING id, name, channel_type, config, enabled, min_severity, throttle_minutes, consecutive_failures, description, created_at
        "#,
    )
    .bind(patch.enabled)
    .bind(patch.min_severity)
    .bind(patch.throttle_minutes)
    .bind(patch.config)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Bumps `consecutive_failures` by one, used after a failed delivery
/// attempt so the caller can decide whether to auto-disable the channel.
pub async fn increment_consecutive_failures(pool: &PgPool, id: Uuid) -> Result<AlertChannelRow, DbError> {
    sqlx::query_as::<_, AlertChannelRow>(
        r#"
        UPDATE core_alert_channels SET consecutive_failures = consecutive_failures + 1
        WHERE id = $1
        RETURNING id, name, channel_type, config, enabled, min_severity, throttle_minutes, consecutive_failures, description, created_at
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Resets `consecutive_failures` to zero, called after a successful
/// delivery.
pub async fn reset_consecutive_failures(pool: &PgPool, id: Uuid) -> Result<AlertChannelRow, DbError> {
    sqlx::query_as::<_, AlertChannelRow>(
        r#"
        UPDATE core_alert_channels SET consecutive_failures = 0
        WHERE id = $1
        RETURNING id, name, channel_type, config, enabled, min_severity, throttle_minutes, consecutive_failures, description, created_at
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

pub async fn delete_alert_channel(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM core_alert_channels WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// alerts
// ---------------------------------------------------------------------------

pub struct NewAlert {
    pub severity: String,
    pub source: String,
    pub title: String,
    pub message: String,
    pub fingerprint: String,
    pub operation_id: Option<Uuid>,
    pub workflow_id: Option<Uuid>,
    pub source_id: Option<String>,
    pub metadata: serde_json::Value,
    pub tags: serde_json::Value,
}

pub async fn create_alert(pool: &PgPool, new: NewAlert) -> Result<AlertRow, DbError> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, AlertRow>(
        r#"
        INSERT INTO core_alerts
            (id, severity, source, title, message, status, fingerprint,
             operation_id, workflow_id, source_id, metadata, tags)
        VALUES ($1, $2, $3, $4, $5, 'open', $6, $7, $8, $9, $10, $11)
        RETURNING id, severity, source, title, message, status, fingerprint, acknowledged,
                  acknowledged_by, acknowledged_at, resolved, resolved_at, operation_id,
                  workflow_id, source_id, metadata, tags, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(new.severity)
    .bind(new.source)
    .bind(new.title)
    .bind(new.message)
    .bind(new.fingerprint)
    .bind(new.operation_id)
    .bind(new.workflow_id)
    .bind(new.source_id)
    .bind(new.metadata)
    .bind(new.tags)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Most recent alert sharing `fingerprint`, used to decide whether a new
/// occurrence should be grouped/throttled instead of raised again.
pub async fn get_latest_by_fingerprint(
    pool: &PgPool,
    fingerprint: &str,
) -> Result<Option<AlertRow>, DbError> {
    let row = sqlx::query_as::<_, AlertRow>(
        r#"SELECT id, severity, source, title, message, status, fingerprint, acknowledged,
                  acknowledged_by, acknowledged_at, resolved, resolved_at, operation_id,
                  workflow_id, source_id, metadata, tags, created_at, updated_at
           FROM core_alerts WHERE fingerprint = $1 ORDER BY created_at DESC LIMIT 1"#,
    )
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn count_alerts(pool: &PgPool, status: Option<&str>) -> Result<i64, DbError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM core_alerts WHERE ($1::text IS NULL OR status = $1)",
    )
    .bind(status)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn list_alerts(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<AlertRow>, DbError> {
    let rows = sqlx::query_as::<_, AlertRow>(
        r#"
        SELECT id, severity, source, title, message, status, fingerprint, acknowledged,
               acknowledged_by, acknowledged_at, resolved, resolved_at, operation_id,
               workflow_id, source_id, metadata, tags, created_at, updated_at
        FROM core_alerts
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn acknowledge_alert(
    pool: &PgPool,
    id: Uuid,
    acknowledged_by: &str,
) -> Result<AlertRow, DbError> {
    let row = sqlx::query_as::<_, AlertRow>(
        r#"
        UPDATE core_alerts
        SET acknowledged = true, acknowledged_by = $1, acknowledged_at = now(),
            status = 'acknowledged', updated_at = now()
        WHERE id = $2
        RETURNING id, severity, source, title, message, status, fingerprint, acknowledged,
                  acknowledged_by, acknowledged_at, resolved, resolved_at, operation_id,
                  workflow_id, source_id, metadata, tags, created_at, updated_at
        "#,
    )
    .bind(acknowledged_by)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

pub async fn resolve_alert(pool: &PgPool, id: Uuid) -> Result<AlertRow, DbError> {
    let row = sqlx::query_as::<_, AlertRow>(
        r#"
        UPDATE core_alerts
        SET resolved = true, resolved_at = now(), status = 'resolved', updated_at = now()
        WHERE id = $1
        RETURNING id, severity, source, title, message, status, fingerprint, acknowledged,
                  acknowledged_by, acknowledged_at, resolved, resolved_at, operation_id,
                  workflow_id, source_id, metadata, tags, created_at, updated_at
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// deliveries
// ---------------------------------------------------------------------------

pub async fn record_delivery(
    pool: &PgPool,
    alert_id: Uuid,
    channel_id: Uuid,
    status: &str,
    error: Option<&str>,
) -> Result<AlertDeliveryRow, DbError> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, AlertDeliveryRow>(
        r#"
        INSERT INTO core_alert_deliveries (id, alert_id, channel_id, status, error)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, alert_id, channel_id, status, error, attempted_at
        "#,
    )
    .bind(id)
    .bind(alert_id)
    .bind(channel_id)
    .bind(status)
    .bind(error)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn list_alert_deliveries(
    pool: &PgPool,
    alert_id: Uuid,
) -> Result<Vec<AlertDeliveryRow>, DbError> {
    let rows = sqlx::query_as::<_, AlertDeliveryRow>(
        r#"SELECT id, alert_id, channel_id, status, error, attempted_at
           FROM core_alert_deliveries WHERE alert_id = $1 ORDER BY attempted_at ASC"#,
    )
    .bind(alert_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Most recent delivery of `alert`'s fingerprint group through `channel_id`,
/// used to enforce `throttle_minutes`.
pub async fn last_delivery_for_fingerprint(
    pool: &PgPool,
    fingerprint: &str,
    channel_id: Uuid,
) -> Result<Option<AlertDeliveryRow>, DbError> {
    let row = sqlx::query_as::<_, AlertDeliveryRow>(
        r#"
        SELECT d.id, d.alert_id, d.channel_id, d.status, d.error, d.attempted_at
        FROM core_alert_deliveries d
        JOIN core_alerts a ON a.id = d.alert_id
        WHERE a.fingerprint = $1 AND d.channel_id = $2
        ORDER BY d.attempted_at DESC
        LIMIT 1
        "#,
    )
    .bind(fingerprint)
    .bind(channel_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
