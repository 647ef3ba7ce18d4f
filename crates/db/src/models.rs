//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `engine` crate; these rows are the
//! serialized-to-SQL shadow of those types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// core_executions / core_execution_events
// ---------------------------------------------------------------------------

/// Possible statuses for an execution as tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    DeadLettered,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadLettered => write!(f, "dead_lettered"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "dead_lettered" => Ok(Self::DeadLettered),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled | Self::DeadLettered)
    }
}

/// A row in `core_executions` — the root run record for a single workflow
/// invocation. This is the unit the ledger, dispatcher and scheduler all
/// key off of.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionRow {
    pub id: Uuid,
    pub workflow: String,
    pub params: serde_json::Value,
    pub status: String,
    pub lane: String,
    pub trigger_source: String,
    pub parent_execution_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub retry_count: i32,
    pub idempotency_key: Option<String>,
}

/// A row in `core_execution_events` — one append-only entry in an
/// execution's event timeline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionEventRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// core_concurrency_locks
// ---------------------------------------------------------------------------

/// A row in `core_concurrency_locks` — a TTL-bound advisory lock held by
/// an in-flight execution.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConcurrencyLockRow {
    pub lock_key: String,
    pub execution_id: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// core_dead_letters
// ---------------------------------------------------------------------------

/// A row in `core_dead_letters` — an execution that exhausted its retry
/// budget and has been parked for manual inspection or replay.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeadLetterRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub workflow: String,
    pub params: serde_json::Value,
    pub error: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

// ---------------------------------------------------------------------------
// core_manifest
// ---------------------------------------------------------------------------

/// A row in `core_manifest` — records that a given partition has advanced
/// to a given processing stage. Keyed by `(domain, partition_key, stage)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ManifestRow {
    pub domain: String,
    pub partition_key: String,
    pub stage: String,
    pub stage_rank: i32,
    pub row_count: i64,
    pub metrics_json: serde_json::Value,
    pub execution_id: Uuid,
    pub batch_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// core_workflows / core_workflow_step_runs
// ---------------------------------------------------------------------------

/// A row in `core_workflows` — an immutable, versioned workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub description: Option<String>,
    pub version: i32,
    pub defaults: serde_json::Value,
    pub tags: serde_json::Value,
    /// Full JSON workflow definition (steps, edges, trigger, execution policy, …).
    pub definition: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A row in `core_workflow_step_runs` — the per-run record of a single
/// step's execution within a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowStepRunRow {
    pub step_id: Uuid,
    pub run_id: Uuid,
    pub step_name: String,
    pub step_type: String,
    pub step_order: i32,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub metrics: serde_json::Value,
}

// ---------------------------------------------------------------------------
// core_schedules / core_schedule_runs
// ---------------------------------------------------------------------------

/// A row in `core_schedules` — a cron or interval trigger definition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleRow {
    pub id: Uuid,
    pub name: String,
    pub target_type: String,
    pub target_name: String,
    pub schedule_type: String,
    pub cron_expression: Option<String>,
    pub interval_seconds: Option<i64>,
    pub timezone: String,
    pub enabled: bool,
    pub misfire_grace_seconds: i64,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_status: Option<String>,
    pub last_run_execution_id: Option<Uuid>,
    pub params: serde_json::Value,
    pub version: i32,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row in `core_schedule_runs` — one firing (successful or misfired) of
/// a schedule.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleRunRow {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub execution_id: Option<Uuid>,
    pub fired_at: DateTime<Utc>,
    pub status: String,
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// core_alert_channels / core_alerts / core_alert_deliveries
// ---------------------------------------------------------------------------

/// A row in `core_alert_channels` — a configured alert sink (webhook,
/// email, Slack, …).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertChannelRow {
    pub id: Uuid,
    pub name: String,
    pub channel_type: String,
    pub config: serde_json::Value,
    pub enabled: bool,
    pub min_severity: String,
    pub throttle_minutes: i32,
    pub consecutive_failures: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row in `core_alerts` — a raised alert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRow {
    pub id: Uuid,
    pub severity: String,
    pub source: String,
    pub title: String,
    pub message: String,
    pub status: String,
    pub fingerprint: String,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub operation_id: Option<Uuid>,
    pub workflow_id: Option<Uuid>,
    pub source_id: Option<String>,
    pub metadata: serde_json::Value,
    pub tags: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row in `core_alert_deliveries` — the audit trail of one attempt to
/// deliver an alert through a channel.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertDeliveryRow {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub channel_id: Uuid,
    pub status: String,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// core_quality_results / core_rejects / core_anomalies
// ---------------------------------------------------------------------------

/// A row in `core_quality_results` — the outcome of a single quality
/// check run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QualityResultRow {
    pub id: Uuid,
    pub domain: String,
    pub execution_id: Option<Uuid>,
    pub check_name: String,
    pub category: String,
    pub status: String,
    pub message: Option<String>,
    pub actual_value: Option<serde_json::Value>,
    pub expected_value: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A row in `core_rejects` — a record rejected during processing, kept
/// for audit and replay.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RejectRow {
    pub id: Uuid,
    pub domain: String,
    pub execution_id: Option<Uuid>,
    pub source: String,
    pub reason: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A row in `core_anomalies` — a detected statistical or business-rule
/// deviation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnomalyRow {
    pub id: Uuid,
    pub domain: String,
    pub execution_id: Option<Uuid>,
    pub metric: String,
    pub observed: f64,
    pub expected: Option<f64>,
    pub deviation: Option<f64>,
    pub severity: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
