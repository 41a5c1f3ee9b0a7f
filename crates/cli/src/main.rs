mod cli;
mod config;
mod run;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::cli::{CliArgs, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let config = config::load(args.config.as_deref()).context("failed to load configuration")?;

    match args.command {
        Command::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("failed to serialize configuration")?;
            print!("{rendered}");
        }
        Command::Run(run_args) => {
            let config = config::apply_flags(config, &run_args)?;
            info!(
                quantum_ms = config.quantum_ms,
                tick_interval_ms = config.tick_interval_ms,
                "Starting run"
            );

            let window = Duration::from_millis(run_args.window_ms);
            let report = run::run(config, &run_args.jobs, window).await?;

            if run_args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("failed to serialize report")?
                );
            } else {
                run::print_table(&report);
            }
        }
    }

    Ok(())
}
