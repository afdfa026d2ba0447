use anyhow::Context;
use clap::Parser;

use tracker_config::TrackerConfig;
use tracker_engine::runner;

mod cli;
mod config_warnings;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("tracker error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = TrackerConfig::load_with_dotenv().context("failed to load tracker configuration")?;
    config_warnings::warn_unconfigured(&config);
    let tz = config.general.tz()?;

    let stamp = match cli.command {
        cli::Commands::Import => runner::import(&config, tz).await,
        cli::Commands::CrmExport => runner::crm_export(&config, tz).await,
        cli::Commands::PruneLogs { days } => runner::prune_logs(&config, tz, days).await,
    };
    println!("{stamp}");
    Ok(())
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("TRACKER_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
