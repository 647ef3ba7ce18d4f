//! `ops` — the quality/rejects/anomalies audit trails and the alert
//! channel registry. Everything here is append-only bookkeeping around
//! the execution ledger, not a new execution path.

pub mod alerts;
pub mod anomalies;
pub mod error;
pub mod quality;
pub mod rejects;

pub use error::OpsError;
