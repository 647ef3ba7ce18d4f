//! `spine alerts list|ack|channels`.

use clap::Subcommand;
use db::repository::alerts::NewAlertChannel;
use uuid::Uuid;

use crate::context::AppContext;
use crate::output::print_value;

#[derive(Subcommand)]
pub enum AlertsCommand {
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
    Ack {
        id: Uuid,
        #[arg(long, default_value = "cli")]
        acknowledged_by: String,
    },
    #[command(subcommand)]
    Channels(ChannelsCommand),
}

#[derive(Subcommand)]
pub enum ChannelsCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Create {
        name: String,
        channel_type: String,
        #[arg(long, default_value = "warning")]
        min_severity: String,
        #[arg(long, default_value_t = 15)]
        throttle_minutes: i32,
        #[arg(long, default_value = "{}")]
        config: String,
    },
    Delete {
        id: Uuid,
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(cmd: AlertsCommand, ctx: &AppContext) -> anyhow::Result<()> {
    match cmd {
        AlertsCommand::List { status, limit, offset, json } => {
            let rows = ops::alerts::list(&ctx.pool, status.as_deref(), limit, offset).await?;
            print_value(&rows, json);
        }
        AlertsCommand::Ack { id, acknowledged_by } => {
            let row = ops::alerts::acknowledge(&ctx.pool, id, &acknowledged_by).await?;
            print_value(&row, true);
        }
        AlertsCommand::Channels(sub) => match sub {
            ChannelsCommand::List { json } => {
                let rows = ops::alerts::list_channels(&ctx.pool).await?;
                print_value(&rows, json);
            }
            ChannelsCommand::Create { name, channel_type, min_severity, throttle_minutes, config } => {
                let config: serde_json::Value = serde_json::from_str(&config)?;
                let row = ops::alerts::create_channel(
                    &ctx.pool,
                    NewAlertChannel { name, channel_type, config, min_severity, throttle_minutes, description: None },
                )
                .await?;
                print_value(&row, true);
            }
            ChannelsCommand::Delete { id, force: _ } => {
                ops::alerts::delete_channel(&ctx.pool, id).await?;
                println!("deleted {id}");
            }
        },
    }
    Ok(())
}
