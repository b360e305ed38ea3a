use anyhow::Result;
use clap::Parser;
use deploy_stamp::cli::{run_cli, Cli, CliOutcome};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        "deploy_stamp=debug"
    } else {
        "deploy_stamp=info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run_cli(cli).await? {
        CliOutcome::Served => Ok(()),
        CliOutcome::Ran(outcome) => {
            println!("{}", outcome.to_json());
            Ok(())
        }
    }
}
