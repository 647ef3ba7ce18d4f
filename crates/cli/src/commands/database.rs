//! `spine database migrate|health|tables|purge`.

use clap::Subcommand;

use crate::context::AppContext;
use crate::output::print_value;

#[derive(Subcommand)]
pub enum DatabaseCommand {
    /// Run pending migrations.
    Migrate,
    /// Shallow connectivity check.
    Health,
    /// List the tables spine-core owns.
    Tables {
        #[arg(long)]
        json: bool,
    },
    /// Delete terminal rows older than the given window.
    Purge {
        #[arg(long, default_value_t = 90)]
        older_than_days: i64,
    },
}

pub async fn run(cmd: DatabaseCommand, ctx: &AppContext) -> anyhow::Result<()> {
    match cmd {
        DatabaseCommand::Migrate => {
            db::pool::run_migrations(&ctx.pool).await?;
            println!("migrations applied");
        }
        DatabaseCommand::Health => {
            db::pool::health_check(&ctx.pool).await?;
            println!("database ok");
        }
        DatabaseCommand::Tables { json } => {
            let tables = db::pool::list_tables(&ctx.pool).await?;
            print_value(&tables, json);
        }
        DatabaseCommand::Purge { older_than_days } => {
            let summary = db::pool::purge_older_than(&ctx.pool, older_than_days).await?;
            print_value(&summary, true);
        }
    }
    Ok(())
}
