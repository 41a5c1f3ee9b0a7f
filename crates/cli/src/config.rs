use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use fairtick_core::config::load_dotenv;
use fairtick_core::SchedulerConfig;
use tracing::debug;

use crate::cli::RunArgs;

/// Resolve the scheduler config.
/// Priority: command-line flags > env (`FAIRTICK_*`, profiled) > config file > defaults.
pub fn load(path: Option<&Path>) -> Result<SchedulerConfig> {
    let base = match path {
        Some(path) => {
            debug!(config_path = %path.display(), "Loading config");
            SchedulerConfig::from_file(path)
                .with_context(|| format!("failed to load config: {}", path.display()))?
        }
        None => SchedulerConfig::default(),
    };

    load_dotenv();
    let profile = env::var("FAIRTICK_PROFILE").unwrap_or_default();
    base.with_env_overrides(&profile)
        .context("invalid FAIRTICK_* environment override")
}

/// Apply per-run flag overrides.
pub fn apply_flags(mut config: SchedulerConfig, args: &RunArgs) -> Result<SchedulerConfig> {
    if let Some(quantum_ms) = args.quantum_ms {
        config.quantum_ms = quantum_ms;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.tick_interval_ms = tick_ms;
    }
    config.validate().context("invalid command-line override")?;
    Ok(config)
}
