//! `subjects` subcommands

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;

use crate::cli::AppContext;
use crm_cli::crm::subjects::sync_subjects;

#[derive(Subcommand)]
pub enum SubjectCommands {
    /// Download the subject taxonomy and rewrite the lookup table
    Sync {
        /// OData filter narrowing which subjects are kept
        #[arg(long)]
        filter: Option<String>,
    },

    /// Print the labels accepted by --subject
    List,
}

pub async fn handle(cmd: SubjectCommands) -> Result<()> {
    let ctx = AppContext::from_env()?;

    match cmd {
        SubjectCommands::Sync { filter } => {
            let table = sync_subjects(&ctx.client, filter.as_deref(), &ctx.config.subjects_file)
                .await
                .context("Failed to sync subjects")?;
            println!(
                "Saved {} subjects to {}",
                table.len().to_string().bright_green(),
                ctx.config.subjects_file.display().to_string().cyan()
            );
        }
        SubjectCommands::List => {
            let table = ctx.subjects()?;
            if table.is_empty() {
                println!("{}", "No subjects stored; run 'crm-cli subjects sync'".yellow());
            }
            for label in table.labels() {
                println!("{}", label);
            }
        }
    }
    Ok(())
}
