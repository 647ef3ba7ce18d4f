pub mod alerts;
pub mod database;
pub mod dlq;
pub mod events;
pub mod health;
pub mod quality;
pub mod runs;
pub mod schedules;
pub mod workflows;

use serde::Deserialize;

fn default_limit() -> i64 {
    50
}

/// Shared `?limit=&offset=` query accepted by every list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// A list endpoint that also filters by domain (quality, rejects, anomalies).
#[derive(Debug, Deserialize)]
pub struct DomainListQuery {
    pub domain: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// A list endpoint that also filters by status (runs, alerts, dlq).
#[derive(Debug, Deserialize)]
pub struct StatusListQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
