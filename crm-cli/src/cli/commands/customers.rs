//! `customers` subcommands

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use serde_json::{Value, json};

use crate::cli::AppContext;
use crate::cli::output::{OutputFormat, format_output};
use crm_cli::crm::customer::{create_member, lookup_customers};

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Look up customers by personal number
    Lookup {
        #[arg(required = true)]
        personal_numbers: Vec<String>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Create a membership for an existing customer
    CreateMember {
        kim_customer_id: String,

        /// Sign-up channel, e.g. CAP
        #[arg(long)]
        channel: String,
    },
}

pub async fn handle(cmd: CustomerCommands) -> Result<()> {
    let ctx = AppContext::from_env()?;

    match cmd {
        CustomerCommands::Lookup {
            personal_numbers,
            format,
        } => {
            let outcomes = lookup_customers(&ctx.client, &ctx.config.customer_actions, personal_numbers, &ctx.limiter).await;

            let rows: Vec<Value> = outcomes
                .iter()
                .map(|outcome| match &outcome.result {
                    Ok(lookup) => json!({
                        "personal_number": outcome.key,
                        "status": if lookup.is_not_customer() { "not_found" } else { "found" },
                        "kim_customer_id": lookup.kim_customer_id(),
                        "member": lookup.is_paid_member(),
                        "result": lookup,
                    }),
                    Err(e) => {
                        log::error!("Lookup failed for {}: {}", outcome.key, e);
                        json!({
                            "personal_number": outcome.key,
                            "status": "error",
                            "error": e.to_string(),
                        })
                    }
                })
                .collect();

            println!("{}", format_output(&Value::Array(rows), format)?);
        }
        CustomerCommands::CreateMember {
            kim_customer_id,
            channel,
        } => {
            let response = create_member(&ctx.client, &ctx.config.customer_actions, &kim_customer_id, &channel)
                .await
                .with_context(|| format!("Failed to create member for {}", kim_customer_id))?;
            println!("{} {}", "Created member for".bright_green(), kim_customer_id);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
