//! `spine workflows list|get|validate`.

use clap::Subcommand;
use db::repository::workflows as workflow_repo;

use crate::context::AppContext;
use crate::output::print_value;

#[derive(Subcommand)]
pub enum WorkflowsCommand {
    /// List the latest version of every registered workflow.
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long)]
        json: bool,
    },
    /// Fetch the latest version of one workflow by name.
    Get {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Validate a workflow definition JSON file's step graph without
    /// registering it.
    Validate {
        path: std::path::PathBuf,
    },
}

pub async fn run(cmd: WorkflowsCommand, ctx: &AppContext) -> anyhow::Result<()> {
    match cmd {
        WorkflowsCommand::List { limit, offset, json } => {
            let rows = workflow_repo::list_latest_workflows(&ctx.pool, limit, offset).await?;
            print_value(&rows, json);
        }
        WorkflowsCommand::Get { name, json } => {
            let row = workflow_repo::get_latest_by_name(&ctx.pool, &name).await?;
            print_value(&row, json);
        }
        WorkflowsCommand::Validate { path } => {
            let content = std::fs::read_to_string(&path)?;
            let workflow: engine::Workflow = serde_json::from_str(&content)?;
            match engine::workflow::graph::topological_order(&workflow) {
                Ok(order) => println!("workflow is valid, execution order: {order:?}"),
                Err(err) => anyhow::bail!("{err}"),
            }
        }
    }
    Ok(())
}
