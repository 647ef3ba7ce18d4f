//! `spine dlq list|resolve`.

use clap::Subcommand;
use db::repository::dlq;
use uuid::Uuid;

use crate::context::AppContext;
use crate::output::print_value;

#[derive(Subcommand)]
pub enum DlqCommand {
    /// List dead-lettered executions.
    List {
        #[arg(long)]
        include_resolved: bool,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long)]
        json: bool,
    },
    /// Fetch one dead letter by id.
    Get {
        id: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Mark a dead letter resolved, e.g. after a manual replay.
    Resolve {
        id: Uuid,
        #[arg(long, default_value = "cli")]
        resolved_by: String,
    },
    /// Resubmit a dead letter as a fresh execution, if `can_retry`.
    Retry {
        id: Uuid,
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(cmd: DlqCommand, ctx: &AppContext) -> anyhow::Result<()> {
    match cmd {
        DlqCommand::List { include_resolved, limit, offset, json } => {
            let rows = dlq::list_dead_letters(&ctx.pool, include_resolved, limit, offset).await?;
            print_value(&rows, json);
        }
        DlqCommand::Get { id, json } => {
            let row = dlq::get_dead_letter(&ctx.pool, id).await?;
            print_value(&row, json);
        }
        DlqCommand::Resolve { id, resolved_by } => {
            dlq::resolve(&ctx.pool, id, &resolved_by).await?;
            println!("resolved {id}");
        }
        DlqCommand::Retry { id, json } => {
            let execution = ctx.dispatcher.retry_dead_letter(id).await?;
            print_value(&execution, json);
        }
    }
    Ok(())
}
