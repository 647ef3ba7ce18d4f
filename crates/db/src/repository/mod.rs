//! Repository functions — one module per table family, one function per
//! database operation.
//!
//! Every function takes a `&DbPool` and returns a `Result<T, DbError>`.
//! No business logic, no domain types — pure SQL.

pub mod alerts;
pub mod dlq;
pub mod ledger;
pub mod locks;
pub mod manifest;
pub mod quality;
pub mod schedules;
pub mod workflows;
