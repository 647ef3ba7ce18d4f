//! `db` crate — pure persistence layer.
//!
//! Provides a connection pool, a `Dialect` abstraction over placeholder
//! syntax, typed row structs, and repository functions for every table
//! spine-core owns. No business logic lives here — domain types and
//! rules live in `engine` and `ops`.

pub mod dialect;
pub mod error;
pub mod models;
pub mod pool;
pub mod repository;

pub use dialect::{Dialect, IntervalUnit, PostgresDialect, SqliteDialect};
pub use error::DbError;
pub use pool::DbPool;
