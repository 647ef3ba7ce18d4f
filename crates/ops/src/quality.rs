//! Data-quality checks and the append-only audit trail behind them.
//! A `QualityRunner` chains checks against one domain, recording every
//! result before any step downstream acts on the pass/fail verdict.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use db::models::QualityResultRow;
use db::repository::quality::{self as quality_repo, NewQualityResult};
use db::DbPool;
use engine::SpineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }
}

/// The outcome of a single named check, before it's persisted.
#[derive(Debug, Clone)]
pub struct QualityResult {
    pub check_name: String,
    pub category: String,
    pub status: CheckStatus,
    pub message: Option<String>,
    pub actual: Option<Value>,
    pub expected: Option<Value>,
}

impl QualityResult {
    pub fn pass(check_name: impl Into<String>, category: impl Into<String>) -> Self {
        Self { check_name: check_name.into(), category: category.into(), status: CheckStatus::Pass, message: None, actual: None, expected: None }
    }

    pub fn warn(check_name: impl Into<String>, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self { check_name: check_name.into(), category: category.into(), status: CheckStatus::Warn, message: Some(message.into()), actual: None, expected: None }
    }

    pub fn fail(check_name: impl Into<String>, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self { check_name: check_name.into(), category: category.into(), status: CheckStatus::Fail, message: Some(message.into()), actual: None, expected: None }
    }

    pub fn with_actual(mut self, actual: Value) -> Self {
        self.actual = Some(actual);
        self
    }

    pub fn with_expected(mut self, expected: Value) -> Self {
        self.expected = Some(expected);
        self
    }
}

/// A single check: given a domain and execution context, produces a
/// `QualityResult`. Implemented as a closure-friendly trait so callers
/// can chain ad hoc checks without a handler registry.
pub trait QualityCheck: Send + Sync {
    fn run(&self) -> QualityResult;
}

impl<F> QualityCheck for F
where
    F: Fn() -> QualityResult + Send + Sync,
{
    fn run(&self) -> QualityResult {
        self()
    }
}

/// Chains checks against one domain, recording each result as it runs
/// and offering a gating decision (`has_failures`) for the calling step.
pub struct QualityRunner {
    pool: DbPool,
    domain: String,
    execution_id: Option<Uuid>,
    recorded: Vec<QualityResultRow>,
}

impl QualityRunner {
    pub fn new(pool: DbPool, domain: impl Into<String>, execution_id: Option<Uuid>) -> Self {
        Self { pool, domain: domain.into(), execution_id, recorded: Vec::new() }
    }

    pub async fn run(&mut self, check: &dyn QualityCheck) -> Result<&QualityResultRow, SpineError> {
        let result = check.run();
        let row = quality_repo::record_quality_result(
            &self.pool,
            NewQualityResult {
                domain: self.domain.clone(),
                execution_id: self.execution_id,
                check_name: result.check_name,
                category: result.category,
                status: result.status.as_str().to_string(),
                message: result.message,
                actual_value: result.actual,
                expected_value: result.expected,
            },
        )
        .await?;
        self.recorded.push(row);
        Ok(self.recorded.last().unwrap())
    }

    pub fn has_failures(&self) -> bool {
        self.recorded.iter().any(|r| r.status == "fail")
    }

    pub fn failures(&self) -> Vec<&QualityResultRow> {
        self.recorded.iter().filter(|r| r.status == "fail").collect()
    }

    pub fn recorded(&self) -> &[QualityResultRow] {
        &self.recorded
    }
}

pub async fn list_quality_results(pool: &DbPool, domain: Option<&str>, limit: i64, offset: i64) -> Result<Vec<QualityResultRow>, SpineError> {
    Ok(quality_repo::list_quality_results(pool, domain, limit, offset).await?)
}

pub async fn count_quality_results(pool: &DbPool, domain: Option<&str>) -> Result<i64, SpineError> {
    Ok(quality_repo::count_quality_results(pool, domain).await?)
}

/// The "consecutive weeks present" quality gate used for rolling
/// computations: given the set of week-ending dates actually observed in
/// `filters`-scoped data, checks that every week in the
/// `[week_ending - window_weeks + 1, week_ending]` range is present.
///
/// Returns `(ok, missing_weeks)` where `missing` is strictly the expected
/// set minus the found set, in ascending order.
pub fn require_history_window(
    week_ending: NaiveDate,
    window_weeks: u32,
    found_weeks: &HashSet<NaiveDate>,
) -> (bool, Vec<NaiveDate>) {
    let mut expected = Vec::with_capacity(window_weeks as usize);
    for i in 0..window_weeks {
        if let Some(week) = week_ending.checked_sub_signed(chrono::Duration::weeks(i as i64)) {
            expected.push(week);
        }
    }
    expected.sort();

    let missing: Vec<NaiveDate> = expected.into_iter().filter(|w| !found_weeks.contains(w)).collect();
    (missing.is_empty(), missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_window_present_is_ok() {
        let week_ending = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        let mut found = HashSet::new();
        for i in 0..4 {
            found.insert(week_ending - chrono::Duration::weeks(i));
        }
        let (ok, missing) = require_history_window(week_ending, 4, &found);
        assert!(ok);
        assert!(missing.is_empty());
    }

    #[test]
    fn gap_in_window_is_reported_missing() {
        let week_ending = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        let mut found = HashSet::new();
        found.insert(week_ending);
        found.insert(week_ending - chrono::Duration::weeks(1));
        // weeks 2 and 3 back are missing
        let (ok, missing) = require_history_window(week_ending, 4, &found);
        assert!(!ok);
        assert_eq!(missing.len(), 2);
    }
}
