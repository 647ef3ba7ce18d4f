//! `ops` re-exports the shared error hierarchy rather than minting its
//! own — quality/rejects/anomalies/alerts are thin audit-recording
//! services, not a new failure domain.

pub use engine::SpineError as OpsError;
