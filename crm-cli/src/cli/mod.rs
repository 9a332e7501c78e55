//! Command line interface

pub mod commands;
pub mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use is_terminal::IsTerminal;

use crm_cli::api::{ApiClient, AuthSession, ConcurrencyLimiter, PromptAuthenticator};
use crm_cli::config::Config;
use crm_cli::crm::SubjectTable;

use commands::{
    auth::AuthCommands, customers::CustomerCommands, fetch::FetchArgs,
    incidents::IncidentCommands, notifications::NotificationCommands,
    subjects::SubjectCommands, user_query::UserQueryArgs,
};

#[derive(Parser)]
#[command(name = "crm-cli")]
#[command(about = "Incident automation for Dynamics 365 customer service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query, update and close incidents
    #[command(subcommand)]
    Incidents(IncidentCommands),

    /// Work with case notifications
    #[command(subcommand)]
    Notifications(NotificationCommands),

    /// Customer lookup and membership creation
    #[command(subcommand)]
    Customers(CustomerCommands),

    /// Build and run a FetchXML query
    Fetch(FetchArgs),

    /// Run a saved personal view
    UserQuery(UserQueryArgs),

    /// Subject taxonomy lookup table
    #[command(subcommand)]
    Subjects(SubjectCommands),

    /// Manage the session cookies
    #[command(subcommand)]
    Auth(AuthCommands),
}

/// Initialize `env_logger`; `RUST_LOG` wins over `--verbose`
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

pub async fn run(cli: Cli) -> Result<()> {
    if cli.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Incidents(cmd) => commands::incidents::handle(cmd).await,
        Commands::Notifications(cmd) => commands::notifications::handle(cmd).await,
        Commands::Customers(cmd) => commands::customers::handle(cmd).await,
        Commands::Fetch(args) => commands::fetch::handle(args).await,
        Commands::UserQuery(args) => commands::user_query::handle(args).await,
        Commands::Subjects(cmd) => commands::subjects::handle(cmd).await,
        Commands::Auth(cmd) => commands::auth::handle(cmd).await,
    }
}

/// Everything a command needs to talk to the organization
pub struct AppContext {
    pub config: Config,
    pub client: ApiClient,
    pub limiter: ConcurrencyLimiter,
}

impl AppContext {
    pub fn from_env() -> Result<Self> {
        let config = Config::from_env().context("Failed to load configuration")?;
        log::debug!("Configuration: {:?}", config);

        let authenticator = PromptAuthenticator::new(config.base_url.clone(), config.session_lifetime);
        let session = AuthSession::new(
            authenticator,
            Some(config.credentials()),
            config.session_file.clone(),
        )
        .context("Failed to load session cookies")?;

        let client = ApiClient::from_config(&config, Arc::new(session))
            .context("Failed to create API client")?;
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_requests);

        Ok(Self {
            config,
            client,
            limiter,
        })
    }

    pub fn session(&self) -> &AuthSession {
        self.client.session()
    }

    pub fn subjects(&self) -> Result<SubjectTable> {
        SubjectTable::load(&self.config.subjects_file).with_context(|| {
            format!(
                "Failed to read subjects from {}",
                self.config.subjects_file.display()
            )
        })
    }
}
