//! `incidents` subcommands

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use uuid::Uuid;

use crate::cli::AppContext;
use crate::cli::output::{OutputFormat, format_output, print_batch_report};
use crm_cli::crm::actions::{close_incidents, update_incident};
use crm_cli::crm::models::IncidentPatch;
use crm_cli::crm::queries::{self, DEFAULT_LATEST_TOP};

#[derive(Subcommand)]
pub enum IncidentCommands {
    /// Latest open incidents owned by a team
    Latest {
        /// Owning team id
        #[arg(long)]
        team: Uuid,

        #[arg(long, default_value_t = DEFAULT_LATEST_TOP)]
        top: u32,

        /// Extra OData filter clause, e.g. "not contains(title,'Spam')"
        #[arg(long)]
        exclude: Option<String>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show one incident
    Get {
        id: Uuid,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Resolve one or more incidents
    Close {
        #[arg(required = true)]
        ids: Vec<Uuid>,

        /// Subject label to set before closing
        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        resolution: Option<String>,
    },

    /// Change fields on an incident
    Update {
        id: Uuid,

        #[arg(long)]
        title: Option<String>,

        /// Plain text; wrapped for the rich-text editor
        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        subject: Option<String>,
    },
}

pub async fn handle(cmd: IncidentCommands) -> Result<()> {
    let ctx = AppContext::from_env()?;

    match cmd {
        IncidentCommands::Latest {
            team,
            top,
            exclude,
            format,
        } => {
            let incidents = queries::latest_incidents(&ctx.client, &team.to_string(), top, exclude.as_deref())
                .await
                .context("Failed to query latest incidents")?;

            match incidents {
                Some(incidents) if !incidents.is_empty() => {
                    println!("{}", format_output(&serde_json::to_value(&incidents)?, format)?);
                }
                _ => println!("{}", "No incidents found".yellow()),
            }
        }
        IncidentCommands::Get { id, format } => {
            match queries::incident_by_id(&ctx.client, &id.to_string())
                .await
                .context("Failed to read incident")?
            {
                Some(incident) => println!("{}", format_output(&serde_json::to_value(&incident)?, format)?),
                None => println!("{}", format!("Incident {} not found", id).yellow()),
            }
        }
        IncidentCommands::Close {
            ids,
            subject,
            resolution,
        } => {
            let subjects = ctx.subjects()?;
            if let Some(label) = &subject {
                subjects.resolve(label)?;
            }

            println!("Closing {} incident(s)...", ids.len().to_string().cyan());
            let outcomes = close_incidents(
                &ctx.client,
                &subjects,
                ids.iter().map(Uuid::to_string).collect(),
                &ctx.limiter,
                resolution.as_deref(),
                subject.as_deref(),
            )
            .await;

            let (_, failed) = print_batch_report("close incident", &outcomes);
            if failed > 0 {
                anyhow::bail!("{} incident(s) could not be closed", failed);
            }
        }
        IncidentCommands::Update {
            id,
            title,
            description,
            subject,
        } => {
            let patch = IncidentPatch {
                title,
                description,
                subject,
                ..Default::default()
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update: pass --title, --description or --subject");
            }

            let subjects = ctx.subjects()?;
            update_incident(&ctx.client, &subjects, &id.to_string(), &patch)
                .await
                .with_context(|| format!("Failed to update incident {}", id))?;
            println!("{} {}", "Updated".bright_green(), id);
        }
    }

    Ok(())
}
