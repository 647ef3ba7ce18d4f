//! The scheduler — a tick loop that fires due CRON/INTERVAL schedules
//! through the dispatcher.
//!
//! Only one running instance acts at a time: each tick contends for the
//! `"scheduler:leader"` advisory lock and skips the tick entirely if it
//! loses. Grounded on the original source's
//! `examples/02_scheduling/*.py` due-set-then-fire loop, generalized onto
//! `core_schedules` instead of an in-memory job list.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use db::models::ScheduleRow;
use db::repository::schedules as schedules_repo;
use db::DbPool;
use nodes::HandlerKind;
use queue::locks::AdvisoryLock;

use crate::cancel::CancelToken;
use crate::dispatcher::{Dispatcher, SubmitRequest, SubmitWorkflowRequest};
use crate::error::SpineError;

/// How long the leader lock is held per tick, expressed as a multiple of
/// the tick interval so a leader that dies mid-tick doesn't wedge the
/// lock for long.
const LOCK_TTL_TICKS: i64 = 3;

pub struct Scheduler {
    pool: DbPool,
    dispatcher: Dispatcher,
    lock: AdvisoryLock,
    owner_id: Uuid,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(pool: DbPool, dispatcher: Dispatcher, tick_interval: Duration) -> Self {
        Self {
            lock: AdvisoryLock::new(pool.clone()),
            pool,
            dispatcher,
            owner_id: Uuid::new_v4(),
            tick_interval,
        }
    }

    /// Runs the tick loop until `shutdown` fires.
    pub async fn run(&self, shutdown: CancelToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.tick().await {
                        warn!(error = %err, "scheduler tick failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("scheduler shutting down");
                    return;
                }
            }
        }
    }

    /// Acquires the `"scheduler:leader"` lock for the duration of this tick
    /// only, releasing it before returning so the same instance can win
    /// election again on the next tick — the TTL is a crash-recovery
    /// backstop for a dead leader, not the steady-state release path.
    async fn tick(&self) -> Result<(), SpineError> {
        let ttl_seconds = (self.tick_interval.as_secs() as i64 * LOCK_TTL_TICKS).max(1);
        let ran = self
            .lock
            .with_lock("scheduler:leader", self.owner_id, ttl_seconds, || async {
                let now = Utc::now();
                let due = schedules_repo::get_due(&self.pool, now).await?;
                for schedule in due {
                    self.fire(&schedule, now).await;
                }
                Ok::<(), SpineError>(())
            })
            .await?;

        if let Some(result) = ran {
            result?;
        }
        Ok(())
    }

    async fn fire(&self, schedule: &ScheduleRow, now: DateTime<Utc>) {
        let next_run = compute_next_run(schedule, now);

        if let Some(scheduled_for) = schedule.next_run_at {
            let grace = chrono::Duration::seconds(schedule.misfire_grace_seconds.max(0));
            if now - scheduled_for > grace {
                warn!(schedule = %schedule.name, "misfire: grace period exceeded, skipping this firing");
                let _ = schedules_repo::record_run(
                    &self.pool,
                    schedule.id,
                    None,
                    "misfired",
                    Some("grace period exceeded"),
                    next_run,
                )
                .await;
                return;
            }
        }

        let result = self.dispatch(schedule).await;
        match result {
            Ok(execution_id) => {
                let _ = schedules_repo::record_run(&self.pool, schedule.id, Some(execution_id), "fired", None, next_run).await;
            }
            Err(err) => {
                warn!(schedule = %schedule.name, error = %err, "scheduled dispatch failed");
                let _ = schedules_repo::record_run(&self.pool, schedule.id, None, "failed", Some(&err.to_string()), next_run).await;
            }
        }
    }

    async fn dispatch(&self, schedule: &ScheduleRow) -> Result<Uuid, SpineError> {
        match schedule.target_type.as_str() {
            "workflow" => {
                let row = self
                    .dispatcher
                    .submit_workflow(SubmitWorkflowRequest {
                        workflow_name: schedule.target_name.clone(),
                        params: schedule.params.clone(),
                        lane: "scheduler".to_string(),
                        trigger_source: "scheduler".to_string(),
                        idempotency_key: None,
                        correlation_id: None,
                        sync: false,
                    })
                    .await?;
                Ok(row.id)
            }
            "task" | "operation" => {
                let kind = if schedule.target_type == "task" { HandlerKind::Task } else { HandlerKind::Operation };
                let mut req = SubmitRequest::new(kind, schedule.target_name.clone(), schedule.params.clone());
                req.lane = "scheduler".to_string();
                req.trigger_source = "scheduler".to_string();
                let row = self.dispatcher.submit(req).await?;
                Ok(row.id)
            }
            other => Err(SpineError::Validation(format!("unknown schedule target_type '{other}'"))),
        }
    }
}

/// Computes a schedule's next firing time from `now`. CRON expressions
/// are evaluated in UTC — `schedule.timezone` is recorded for display
/// purposes only in this version (see the grounding ledger's Open
/// Question decision on schedule time zones).
fn compute_next_run(schedule: &ScheduleRow, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule.schedule_type.as_str() {
        "cron" => {
            let expr = schedule.cron_expression.as_deref()?;
            cron::Schedule::from_str(expr).ok().and_then(|s| s.after(&now).next())
        }
        "interval" => schedule.interval_seconds.map(|secs| now + chrono::Duration::seconds(secs)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(schedule_type: &str, cron_expression: Option<&str>, interval_seconds: Option<i64>) -> ScheduleRow {
        ScheduleRow {
            id: Uuid::new_v4(),
            name: "nightly".into(),
            target_type: "task".into(),
            target_name: "noop".into(),
            schedule_type: schedule_type.into(),
            cron_expression: cron_expression.map(String::from),
            interval_seconds,
            timezone: "UTC".into(),
            enabled: true,
            misfire_grace_seconds: 60,
            next_run_at: None,
            last_run_at: None,
            last_run_status: None,
            last_run_execution_id: None,
            params: serde_json::json!({}),
            version: 1,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn interval_schedule_advances_by_seconds() {
        let now = Utc::now();
        let s = schedule("interval", None, Some(300));
        let next = compute_next_run(&s, now).unwrap();
        assert_eq!((next - now).num_seconds(), 300);
    }

    #[test]
    fn cron_schedule_computes_next_firing_after_now() {
        let now = Utc::now();
        // every minute, at second 0
        let s = schedule("cron", Some("0 * * * * *"), None);
        let next = compute_next_run(&s, now).unwrap();
        assert!(next > now);
    }

    #[test]
    fn unknown_schedule_type_yields_no_next_run() {
        let now = Utc::now();
        let s = schedule("weird", None, None);
        assert!(compute_next_run(&s, now).is_none());
    }
}
