//! `user-query` command

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use serde_json::Value;

use crate::cli::AppContext;
use crate::cli::output::{OutputFormat, format_output};
use crm_cli::crm::queries::run_user_query;

#[derive(Args)]
pub struct UserQueryArgs {
    /// Entity the view returns, e.g. incident
    pub entity: String,

    /// Exact name of the saved view
    pub name: String,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub async fn handle(args: UserQueryArgs) -> Result<()> {
    let ctx = AppContext::from_env()?;

    let result = run_user_query(&ctx.client, &args.entity, &args.name)
        .await
        .with_context(|| format!("Failed to run view '{}'", args.name))?;

    match result {
        Some(normalized) => {
            if let Some(total) = normalized.total_record_count() {
                log::info!("View '{}' matched {} records", args.name, total);
            }
            let records = Value::Array(normalized.records().iter().cloned().map(Value::Object).collect());
            println!("{}", format_output(&records, args.format)?);
        }
        None => println!("{}", format!("No results for view '{}'", args.name).yellow()),
    }
    Ok(())
}
