//! `notifications` subcommands

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use uuid::Uuid;

use crate::cli::AppContext;
use crate::cli::output::{OutputFormat, format_output, print_batch_report};
use crm_cli::crm::actions::close_notifications;
use crm_cli::crm::queries;

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// Unread notifications whose case is already resolved
    Inactive {
        /// Mark every listed notification as read
        #[arg(long)]
        close: bool,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Mark notifications as read
    Close {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
}

pub async fn handle(cmd: NotificationCommands) -> Result<()> {
    let ctx = AppContext::from_env()?;

    let ids = match cmd {
        NotificationCommands::Inactive { close, format } => {
            let notifications = queries::inactive_notifications(&ctx.client)
                .await
                .context("Failed to query notifications")?;

            if notifications.is_empty() {
                println!("{}", "No notifications found".yellow());
                return Ok(());
            }
            println!("{}", format_output(&serde_json::to_value(&notifications)?, format)?);

            if !close {
                return Ok(());
            }
            notifications
                .into_iter()
                .map(|n| n.coop_notificationid)
                .collect::<Vec<_>>()
        }
        NotificationCommands::Close { ids } => ids.iter().map(Uuid::to_string).collect(),
    };

    println!("Closing {} notification(s)...", ids.len().to_string().cyan());
    let outcomes = close_notifications(&ctx.client, ids, &ctx.limiter).await;
    let (_, failed) = print_batch_report("close notification", &outcomes);
    if failed > 0 {
        anyhow::bail!("{} notification(s) could not be closed", failed);
    }
    Ok(())
}
