use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lookup_client::PeopleDirectory;
use tracing_subscriber::EnvFilter;

mod config;
mod scenario;

#[derive(Parser, Debug)]
#[command(name = "formsync-tools", about = "Drive control wrappers through validation cycles")]
struct Cli {
    /// Settings file; defaults to ./formsync.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk a field through pending and settled validation states.
    Scenario,
    /// Validate a user id against the people lookup service.
    CheckUser {
        id: String,
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = config::load_settings(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Scenario => {
            let (reports, status) = scenario::run_validation_scenario(&settings).await?;
            for report in &reports {
                println!("{report}");
            }
            println!(
                "synchronizer: state={} retries={} renders={}",
                status.state, status.retries, status.notifications
            );
        }
        Command::CheckUser { id, base_url } => {
            if let Some(base_url) = base_url {
                settings.lookup_base_url = base_url;
            }
            let directory =
                PeopleDirectory::with_timeout(&settings.lookup_base_url, settings.lookup_timeout())
                    .context("failed to build people lookup client")?;
            let reports = scenario::run_check_user(&directory, &id, &settings).await?;
            for report in &reports {
                println!("{report}");
            }
        }
    }

    Ok(())
}
