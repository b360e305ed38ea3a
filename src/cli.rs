use crate::config::{Settings, CONFIG_FILE_NAME};
use crate::deploy::{Deployer, Outcome};
use crate::flag::OperatorFlagStore;
use crate::github::GitHubClient;
use crate::server::{self, AppState};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Turn debugging information on
    #[arg(short, long)]
    pub debug: bool,

    #[arg(global = true, short, long, default_value = CONFIG_FILE_NAME)]
    pub config_file: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve `POST /deploy` until interrupted (the default)
    Serve {
        /// Address to bind, overriding `listen_addr` from configuration
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Run the stamp-and-commit flow once and exit, for cron-style triggers
    Run,
}

pub enum CliOutcome {
    Served,
    Ran(Outcome),
}

/// Wires the flag store and GitHub client described by `settings` into a
/// deployer.
pub fn build_deployer(settings: &Settings) -> Result<Deployer> {
    let flags = OperatorFlagStore::open_fs(&settings.state_dir)
        .context(format!("could not open flag store at {}", &settings.state_dir))?;
    let client = GitHubClient::new(
        &settings.github_token,
        &settings.api_base,
        &settings.commit_message,
        settings.committer.clone(),
        settings.http_timeout,
    )
    .context("could not build GitHub client")?;

    Ok(Deployer::new(
        settings.location.clone(),
        Arc::new(flags),
        Arc::new(client),
    ))
}

pub async fn run_cli(cli: Cli) -> Result<CliOutcome> {
    let settings = Settings::load(&cli.config_file)
        .context(format!("could not load config from {}", &cli.config_file))?;
    tracing::info!(
        location = %settings.location,
        state_dir = %settings.state_dir,
        api_base = %settings.api_base,
        "configuration loaded"
    );

    let deployer = build_deployer(&settings)?;

    match cli.command.unwrap_or(Commands::Serve { listen: None }) {
        Commands::Serve { listen } => {
            let addr = listen.unwrap_or_else(|| settings.listen_addr.clone());
            let state = AppState::new(deployer, &settings.deploy_token);
            server::serve(state, &addr)
                .await
                .context(format!("server on {} failed", addr))?;
            Ok(CliOutcome::Served)
        }
        Commands::Run => {
            let outcome = deployer.run().await.context("deploy run failed")?;
            Ok(CliOutcome::Ran(outcome))
        }
    }
}
