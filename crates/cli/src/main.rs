//! `spine` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`     — start the API server.
//! - `worker`    — start a queue worker.
//! - `migrate`   — run pending database migrations.
//! - `runs`      — submit, list, inspect, and cancel executions.
//! - `workflows` — list, inspect, and validate workflow definitions.
//! - `schedules` — manage cron/interval schedules.
//! - `alerts`    — list, acknowledge alerts and manage channels.
//! - `dlq`       — inspect and resolve dead-lettered executions.
//! - `database`  — migrate, health-check, list tables, purge.
//! - `profile`   — show resolved backend configuration.

mod commands;
mod context;
mod output;

use clap::{Parser, Subcommand};
use tracing::info;

use commands::alerts::AlertsCommand;
use commands::database::DatabaseCommand;
use commands::dlq::DlqCommand;
use commands::profile::ProfileCommand;
use commands::runs::RunsCommand;
use commands::schedules::SchedulesCommand;
use commands::workflows::WorkflowsCommand;

#[derive(Parser)]
#[command(name = "spine", about = "Workflow orchestration engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Start a background worker that processes queued jobs.
    Worker,
    /// Run pending database migrations.
    Migrate,
    /// Submit, list, inspect, and cancel executions.
    #[command(subcommand)]
    Runs(RunsCommand),
    /// List, inspect, and validate workflow definitions.
    #[command(subcommand)]
    Workflows(WorkflowsCommand),
    /// Manage cron/interval schedules.
    #[command(subcommand)]
    Schedules(SchedulesCommand),
    /// List, acknowledge alerts and manage delivery channels.
    #[command(subcommand)]
    Alerts(AlertsCommand),
    /// Inspect and resolve dead-lettered executions.
    #[command(subcommand)]
    Dlq(DlqCommand),
    /// Database administration.
    #[command(subcommand)]
    Database(DatabaseCommand),
    /// Show resolved backend configuration.
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let log_level = std::env::var("SPINE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli.command).await {
        match err.downcast::<engine::SpineError>() {
            Ok(spine_err) => output::exit_on_error(&spine_err),
            Err(err) => output::exit_on_anyhow(&err),
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(context::api_bind_from_env);
            info!("Starting API server on {bind}");
            let ctx = context::build(&context::database_url_from_env()).await?;
            let state = api::AppState { pool: ctx.pool, dispatcher: ctx.dispatcher, events: ctx.events };
            api::serve(&bind, state).await?;
            Ok(())
        }
        Command::Worker => {
            info!("Starting background worker");
            let ctx = context::build(&context::database_url_from_env()).await?;
            let scheduler = engine::Scheduler::new(ctx.pool.clone(), ctx.dispatcher.clone(), std::time::Duration::from_secs(5));
            let shutdown = engine::CancelToken::new();
            scheduler.run(shutdown).await;
            Ok(())
        }
        Command::Migrate => {
            let pool = db::pool::create_pool(&context::database_url_from_env(), 2).await?;
            db::pool::run_migrations(&pool).await?;
            info!("Migrations applied successfully");
            Ok(())
        }
        Command::Runs(cmd) => {
            let ctx = context::build(&context::database_url_from_env()).await?;
            commands::runs::run(cmd, &ctx).await
        }
        Command::Workflows(cmd) => {
            let ctx = context::build(&context::database_url_from_env()).await?;
            commands::workflows::run(cmd, &ctx).await
        }
        Command::Schedules(cmd) => {
            let ctx = context::build(&context::database_url_from_env()).await?;
            commands::schedules::run(cmd, &ctx).await
        }
        Command::Alerts(cmd) => {
            let ctx = context::build(&context::database_url_from_env()).await?;
            commands::alerts::run(cmd, &ctx).await
        }
        Command::Dlq(cmd) => {
            let ctx = context::build(&context::database_url_from_env()).await?;
            commands::dlq::run(cmd, &ctx).await
        }
        Command::Database(cmd) => {
            let ctx = context::build(&context::database_url_from_env()).await?;
            commands::database::run(cmd, &ctx).await
        }
        Command::Profile(cmd) => {
            let ctx = context::build(&context::database_url_from_env()).await?;
            commands::profile::run(cmd, &ctx).await
        }
    }
}
