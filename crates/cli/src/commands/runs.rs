//! `spine runs submit|list|get|cancel`.

use clap::{Subcommand, ValueEnum};
use db::repository::ledger::ListExecutionsFilter;
use nodes::HandlerKind;
use uuid::Uuid;

use crate::context::AppContext;
use crate::output::print_value;

#[derive(Subcommand)]
pub enum RunsCommand {
    /// Submit a task, operation, or workflow for execution.
    Submit {
        #[arg(value_enum)]
        kind: SubmitKindArg,
        name: String,
        #[arg(long, default_value = "{}")]
        params: String,
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// List executions.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long)]
        json: bool,
    },
    /// Fetch one execution by id.
    Get {
        id: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Cancel a running execution.
    Cancel {
        id: Uuid,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SubmitKindArg {
    Task,
    Operation,
    Workflow,
}

pub async fn run(cmd: RunsCommand, ctx: &AppContext) -> anyhow::Result<()> {
    match cmd {
        RunsCommand::Submit { kind, name, params, idempotency_key } => {
            let params: serde_json::Value = serde_json::from_str(&params)?;
            let row = match kind {
                SubmitKindArg::Workflow => {
                    let mut req = engine::SubmitWorkflowRequest::new(name, params);
                    req.idempotency_key = idempotency_key;
                    ctx.dispatcher.submit_workflow(req).await?
                }
                SubmitKindArg::Task | SubmitKindArg::Operation => {
                    let handler_kind = if matches!(kind, SubmitKindArg::Task) { HandlerKind::Task } else { HandlerKind::Operation };
                    let mut req = engine::SubmitRequest::new(handler_kind, name, params);
                    req.idempotency_key = idempotency_key;
                    ctx.dispatcher.submit(req).await?
                }
            };
            print_value(&row, true);
        }
        RunsCommand::List { status, limit, offset, json } => {
            let filter = ListExecutionsFilter { workflow: None, status, since: None, limit, offset };
            let rows = ctx.dispatcher.list(filter).await?;
            print_value(&rows, json);
        }
        RunsCommand::Get { id, json } => {
            let row = ctx.dispatcher.get(id).await?;
            print_value(&row, json);
        }
        RunsCommand::Cancel { id, force } => {
            if !force {
                let row = ctx.dispatcher.get(id).await?;
                if engine::ledger::is_terminal_status(&row.status) {
                    anyhow::bail!("execution {id} is already in terminal status '{}'; pass --force to no-op quietly", row.status);
                }
            }
            ctx.dispatcher.cancel(id).await?;
            println!("cancelled {id}");
        }
    }
    Ok(())
}
