//! Portable SQL surface — placeholder syntax, ISO-8601 helpers, `interval(n, unit)`.
//!
//! Spine-core only ships a Postgres `Connection` (via sqlx), but the
//! `Dialect` trait keeps the placeholder/DDL differences that would be
//! needed for a second backend (e.g. SQLite in tests) isolated from the
//! repository layer, behind a thin `DbPool` type alias around the
//! concrete driver.

use chrono::{DateTime, Utc};

/// Unit for [`Dialect::interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

/// Placeholder + expression differences between SQL backends.
///
/// Only Postgres is wired up to a real `Connection` in this workspace;
/// the trait exists so `db::repository` call sites never hardcode `$1`
/// vs `?`.
pub trait Dialect: Send + Sync {
    /// Render the Nth (1-indexed) bound-parameter placeholder.
    fn placeholder(&self, index: usize) -> String;

    /// Render a `NOW() + n unit` style expression for use in a WHERE/SET clause.
    fn interval_expr(&self, n: i64, unit: IntervalUnit) -> String;

    /// Format a timestamp the way this dialect expects it in SQL text contexts
    /// (migrations, logging) — always ISO-8601 UTC.
    fn format_timestamp(&self, ts: DateTime<Utc>) -> String {
        ts.to_rfc3339()
    }
}

/// The only dialect spine-core ships against in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn interval_expr(&self, n: i64, unit: IntervalUnit) -> String {
        let unit = match unit {
            IntervalUnit::Seconds => "seconds",
            IntervalUnit::Minutes => "minutes",
            IntervalUnit::Hours => "hours",
            IntervalUnit::Days => "days",
        };
        format!("NOW() + INTERVAL '{n} {unit}'")
    }
}

/// A dialect usable in unit tests without a live connection (SQLite-flavoured
/// placeholder syntax); kept so `db::dialect` has more than one impl, the way
/// the original source's `SQLiteDialect` was used for example/test fixtures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn interval_expr(&self, n: i64, unit: IntervalUnit) -> String {
        let unit = match unit {
            IntervalUnit::Seconds => "seconds",
            IntervalUnit::Minutes => "minutes",
            IntervalUnit::Hours => "hours",
            IntervalUnit::Days => "days",
        };
        format!("datetime('now', '+{n} {unit}')")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_placeholders_are_positional() {
        let d = PostgresDialect;
        assert_eq!(d.placeholder(1), "$1");
        assert_eq!(d.placeholder(2), "$2");
    }

    #[test]
    fn sqlite_placeholders_are_question_marks() {
        let d = SqliteDialect;
        assert_eq!(d.placeholder(1), "?");
        assert_eq!(d.placeholder(7), "?");
    }

    #[test]
    fn interval_expressions_differ_by_dialect() {
        assert!(PostgresDialect.interval_expr(5, IntervalUnit::Seconds).contains("INTERVAL"));
        assert!(SqliteDialect.interval_expr(5, IntervalUnit::Seconds).contains("datetime"));
    }
}
