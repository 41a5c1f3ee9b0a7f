use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};

/// Drive synthetic workloads through the fair scheduler.
///
/// Each `--job` registers a busy-wait body with a fixed cost per call; the
/// jobs are ticked by a real timer for the given window and the resulting
/// invocation counts are compared against the expected fair shares.
#[derive(Parser, Debug)]
#[command(name = "fairtick", about = "Cooperative weighted-fair job scheduler")]
pub struct CliArgs {
    /// Scheduler config file (TOML). Env overrides are applied on top.
    #[arg(long, global = true, env = "FAIRTICK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run jobs for a fixed window and report per-job statistics.
    Run(RunArgs),
    /// Print the effective scheduler configuration as TOML.
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Job as `name:weight:cost_ms[:count]`. Repeat for several jobs.
    #[arg(long = "job", required = true, value_name = "SPEC")]
    pub jobs: Vec<JobSpec>,

    /// How long to drive the scheduler, in milliseconds.
    #[arg(long, default_value = "1000")]
    pub window_ms: u64,

    /// Override the replenishment quantum (milliseconds).
    #[arg(long)]
    pub quantum_ms: Option<f64>,

    /// Override the tick period (milliseconds).
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Print the report as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// One synthetic job from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub name: String,
    pub weight: f64,
    pub cost_ms: f64,
    pub count: Option<u32>,
}

impl FromStr for JobSpec {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split(':').collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(format!("expected name:weight:cost_ms[:count], got {raw:?}"));
        }

        let name = parts[0].trim();
        if name.is_empty() {
            return Err("job name must not be empty".to_string());
        }
        let weight: f64 = parts[1]
            .parse()
            .map_err(|_| format!("invalid weight {:?}", parts[1]))?;
        let cost_ms: f64 = parts[2]
            .parse()
            .map_err(|_| format!("invalid cost {:?}", parts[2]))?;
        if !(cost_ms.is_finite() && cost_ms >= 0.0) {
            return Err(format!("cost must be a non-negative number, got {cost_ms}"));
        }
        let count = match parts.get(3) {
            Some(raw) => Some(raw.parse().map_err(|_| format!("invalid count {raw:?}"))?),
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            weight,
            cost_ms,
            count,
        })
    }
}
