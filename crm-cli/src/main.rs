use clap::Parser;
use colored::*;

mod cli;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbose);

    if let Err(e) = cli::run(cli).await {
        log::error!("{:#}", e);
        eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
        std::process::exit(1);
    }
}
