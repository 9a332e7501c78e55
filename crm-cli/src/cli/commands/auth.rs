//! `auth` subcommands

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;

use crate::cli::AppContext;

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in and store fresh session cookies
    Login,
    /// Forget the stored session
    Logout,
    /// Show whether the stored session is usable
    Status,
}

pub async fn handle(cmd: AuthCommands) -> Result<()> {
    let ctx = AppContext::from_env()?;
    let session = ctx.session();

    match cmd {
        AuthCommands::Login => {
            let store = session.refresh().await.context("Login failed")?;
            println!(
                "{} ({} cookies saved to {})",
                "Logged in".bright_green().bold(),
                store.len(),
                ctx.config.session_file.display()
            );
        }
        AuthCommands::Logout => {
            session.logout().await.context("Logout failed")?;
            println!("{}", "Session cleared".bright_green());
        }
        AuthCommands::Status => {
            let store = session.store();
            println!("User: {}", ctx.config.username.cyan());
            if session.is_authenticated() {
                let minutes = store.remaining_secs().unwrap_or_default() / 60.0;
                println!("{} (expires in {:.0} min)", "Authenticated".bright_green().bold(), minutes);
            } else if store.is_empty() {
                println!("{}", "No session stored".yellow());
            } else {
                println!("{}", "Session expired or about to expire".yellow());
            }
        }
    }
    Ok(())
}
