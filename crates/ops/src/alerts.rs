//! Alert channels and delivery throttling. A channel accepts an alert
//! iff its severity clears the channel's floor and the last delivery of
//! the same fingerprint through this channel is older than the
//! channel's throttle window.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use db::models::{AlertChannelRow, AlertRow};
use db::repository::alerts::{self as alerts_repo, NewAlert, NewAlertChannel};
use db::DbPool;
use engine::SpineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Deterministic hash of `(severity, source, title, domain)`, used to
/// group repeat alerts under one fingerprint.
pub fn compute_fingerprint(severity: Severity, source: &str, title: &str, domain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(severity.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(source.as_bytes());
    hasher.update(b"\0");
    hasher.update(title.as_bytes());
    hasher.update(b"\0");
    hasher.update(domain.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct NewAlertInput {
    pub severity: Severity,
    pub source: String,
    pub title: String,
    pub message: String,
    pub domain: String,
    pub operation_id: Option<Uuid>,
    pub workflow_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

/// Raises an alert, computing its fingerprint from `(severity, source,
/// title, domain)` so repeats group under the same value.
pub async fn raise(pool: &DbPool, input: NewAlertInput) -> Result<AlertRow, SpineError> {
    let fingerprint = compute_fingerprint(input.severity, &input.source, &input.title, &input.domain);
    Ok(alerts_repo::create_alert(
        pool,
        NewAlert {
            severity: input.severity.as_str().to_string(),
            source: input.source,
            title: input.title,
            message: input.message,
            fingerprint,
            operation_id: input.operation_id,
            workflow_id: input.workflow_id,
            source_id: None,
            metadata: input.metadata,
            tags: serde_json::json!({ "domain": input.domain }),
        },
    )
    .await?)
}

pub async fn list(pool: &DbPool, status: Option<&str>, limit: i64, offset: i64) -> Result<Vec<AlertRow>, SpineError> {
    Ok(alerts_repo::list_alerts(pool, status, limit, offset).await?)
}

pub async fn count(pool: &DbPool, status: Option<&str>) -> Result<i64, SpineError> {
    Ok(alerts_repo::count_alerts(pool, status).await?)
}

pub async fn acknowledge(pool: &DbPool, id: Uuid, acknowledged_by: &str) -> Result<AlertRow, SpineError> {
    Ok(alerts_repo::acknowledge_alert(pool, id, acknowledged_by).await?)
}

pub async fn resolve(pool: &DbPool, id: Uuid) -> Result<AlertRow, SpineError> {
    Ok(alerts_repo::resolve_alert(pool, id).await?)
}

pub async fn create_channel(pool: &DbPool, new: NewAlertChannel) -> Result<AlertChannelRow, SpineError> {
    Ok(alerts_repo::create_alert_channel(pool, new).await?)
}

pub async fn list_channels(pool: &DbPool) -> Result<Vec<AlertChannelRow>, SpineError> {
    Ok(alerts_repo::list_alert_channels(pool).await?)
}

pub async fn delete_channel(pool: &DbPool, id: Uuid) -> Result<(), SpineError> {
    Ok(alerts_repo::delete_alert_channel(pool, id).await?)
}

/// How many consecutive delivery failures disable a channel
/// automatically. Chosen to tolerate a brief outage in the downstream
/// sink (webhook endpoint, SMTP relay) without disabling on one blip.
const AUTO_DISABLE_THRESHOLD: i32 = 5;

/// A concrete delivery mechanism (console, webhook, email, …). External
/// collaborators implement this; the dispatch logic below only depends
/// on the trait.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &AlertRow) -> Result<(), String>;
}

/// Evaluates whether `channel` should receive `alert` right now:
/// severity must clear the channel's floor, and the fingerprint's last
/// delivery through this channel (if any) must be older than the
/// channel's throttle window.
pub async fn should_send(pool: &DbPool, alert: &AlertRow, channel: &AlertChannelRow) -> Result<bool, SpineError> {
    if !channel.enabled {
        return Ok(false);
    }
    let alert_sev = Severity::parse(&alert.severity).ok_or_else(|| SpineError::Internal(format!("unknown severity '{}'", alert.severity)))?;
    let floor = Severity::parse(&channel.min_severity).ok_or_else(|| SpineError::Internal(format!("unknown min_severity '{}'", channel.min_severity)))?;
    if alert_sev < floor {
        return Ok(false);
    }

    let last = alerts_repo::last_delivery_for_fingerprint(pool, &alert.fingerprint, channel.id).await?;
    match last {
        None => Ok(true),
        Some(delivery) => {
            let elapsed = chrono::Utc::now() - delivery.attempted_at;
            Ok(elapsed >= chrono::Duration::minutes(channel.throttle_minutes as i64))
        }
    }
}

/// Delivers `alert` through `channel` via `sink` if `should_send`
/// allows it, recording the attempt either way. Auto-disables the
/// channel after `AUTO_DISABLE_THRESHOLD` consecutive failures.
pub async fn deliver(
    pool: &DbPool,
    alert: &AlertRow,
    channel: &AlertChannelRow,
    sink: &dyn AlertSink,
) -> Result<bool, SpineError> {
    if !should_send(pool, alert, channel).await? {
        return Ok(false);
    }

    match sink.send(alert).await {
        Ok(()) => {
            alerts_repo::record_delivery(pool, alert.id, channel.id, "delivered", None).await?;
            alerts_repo::reset_consecutive_failures(pool, channel.id).await?;
            Ok(true)
        }
        Err(err) => {
            alerts_repo::record_delivery(pool, alert.id, channel.id, "failed", Some(&err)).await?;
            let updated = alerts_repo::increment_consecutive_failures(pool, channel.id).await?;
            if updated.consecutive_failures >= AUTO_DISABLE_THRESHOLD {
                alerts_repo::update_alert_channel(
                    pool,
                    channel.id,
                    alerts_repo::AlertChannelUpdate { enabled: Some(false), min_severity: None, throttle_minutes: None, config: None },
                )
                .await?;
            }
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = compute_fingerprint(Severity::Error, "ingest", "disk full", "etl");
        let b = compute_fingerprint(Severity::Error, "ingest", "disk full", "etl");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_by_severity() {
        let a = compute_fingerprint(Severity::Warning, "ingest", "disk full", "etl");
        let b = compute_fingerprint(Severity::Error, "ingest", "disk full", "etl");
        assert_ne!(a, b);
    }

    #[test]
    fn severity_ordering_matches_spec() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }
}
