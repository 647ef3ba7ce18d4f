//! `spine schedules list|get|create|update|delete`.

use clap::Subcommand;
use db::repository::schedules::{self as schedule_repo, NewSchedule, ScheduleUpdate};
use uuid::Uuid;

use crate::context::AppContext;
use crate::output::print_value;

#[derive(Subcommand)]
pub enum SchedulesCommand {
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long)]
        json: bool,
    },
    Get {
        id: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Register a new cron or interval schedule.
    Create {
        name: String,
        target_type: String,
        target_name: String,
        #[arg(long, value_enum)]
        schedule_type: ScheduleTypeArg,
        #[arg(long)]
        cron_expression: Option<String>,
        #[arg(long)]
        interval_seconds: Option<i64>,
        #[arg(long, default_value = "UTC")]
        timezone: String,
        #[arg(long, default_value_t = 60)]
        misfire_grace_seconds: i64,
        #[arg(long, default_value = "{}")]
        params: String,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        cron_expression: Option<String>,
        #[arg(long)]
        interval_seconds: Option<i64>,
    },
    Delete {
        id: Uuid,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum ScheduleTypeArg {
    Cron,
    Interval,
}

pub async fn run(cmd: SchedulesCommand, ctx: &AppContext) -> anyhow::Result<()> {
    match cmd {
        SchedulesCommand::List { limit, offset, json } => {
            let rows = schedule_repo::list(&ctx.pool, limit, offset).await?;
            print_value(&rows, json);
        }
        SchedulesCommand::Get { id, json } => {
            let row = schedule_repo::get(&ctx.pool, id).await?;
            print_value(&row, json);
        }
        SchedulesCommand::Create {
            name,
            target_type,
            target_name,
            schedule_type,
            cron_expression,
            interval_seconds,
            timezone,
            misfire_grace_seconds,
            params,
        } => {
            let params: serde_json::Value = serde_json::from_str(&params)?;
            let schedule_type = match schedule_type {
                ScheduleTypeArg::Cron => "cron",
                ScheduleTypeArg::Interval => "interval",
            };
            let row = schedule_repo::create(
                &ctx.pool,
                NewSchedule {
                    name,
                    target_type,
                    target_name,
                    schedule_type: schedule_type.to_string(),
                    cron_expression,
                    interval_seconds,
                    timezone,
                    misfire_grace_seconds,
                    params,
                    created_by: None,
                },
            )
            .await?;
            print_value(&row, true);
        }
        SchedulesCommand::Update { id, enabled, cron_expression, interval_seconds } => {
            let row = schedule_repo::update(
                &ctx.pool,
                id,
                ScheduleUpdate { enabled, cron_expression, interval_seconds, params: None },
            )
            .await?;
            print_value(&row, true);
        }
        SchedulesCommand::Delete { id, force } => {
            if !force {
                schedule_repo::get(&ctx.pool, id).await?;
            }
            schedule_repo::delete(&ctx.pool, id).await?;
            println!("deleted {id}");
        }
    }
    Ok(())
}
