//! `spine profile` — print the resolved backend configuration for this
//! install, the CLI-side counterpart of `GET /capabilities`.

use clap::Subcommand;
use serde_json::json;

use crate::context::AppContext;
use crate::output::print_value;

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Show resolved `SPINE_*` backend configuration and tier.
    Show {
        #[arg(long)]
        json: bool,
    },
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub async fn run(cmd: ProfileCommand, ctx: &AppContext) -> anyhow::Result<()> {
    match cmd {
        ProfileCommand::Show { json } => {
            let database_ok = db::pool::health_check(&ctx.pool).await.is_ok();
            let data = json!({
                "tier": env_or("SPINE_TIER", "default"),
                "database_backend": env_or("SPINE_DATABASE_BACKEND", "postgres"),
                "scheduler_backend": env_or("SPINE_SCHEDULER_BACKEND", "db_advisory_lock"),
                "cache_backend": env_or("SPINE_CACHE_BACKEND", "none"),
                "worker_backend": env_or("SPINE_WORKER_BACKEND", "in_process"),
                "metrics_backend": env_or("SPINE_METRICS_BACKEND", "none"),
                "tracing_backend": env_or("SPINE_TRACING_BACKEND", "none"),
                "log_level": env_or("SPINE_LOG_LEVEL", "info"),
                "database_reachable": database_ok,
            });
            print_value(&data, json);
        }
    }
    Ok(())
}
