use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: std::str::FromStr>(
    profile: &str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match profiled_env_opt(profile, key) {
        Some(raw) => raw.parse().map(Some).map_err(|_| ConfigError::Invalid {
            key,
            reason: format!("cannot parse {:?}", raw),
        }),
        None => Ok(None),
    }
}

/// Tuning for the scheduler loop and its fairness allocator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Credit granted to every running job per replenishment round, in
    /// milliseconds of weight-normalised execution time. Also the credit cap.
    #[serde(default = "default_quantum_ms")]
    pub quantum_ms: f64,
    /// Minimum cost charged per invocation, in microseconds.
    #[serde(default = "default_min_charge_us")]
    pub min_charge_us: u64,
    /// Smoothing factor of the per-job average duration estimate.
    #[serde(default = "default_duration_smoothing")]
    pub duration_smoothing: f64,
    /// Weight used when a job declares none.
    #[serde(default = "default_weight")]
    pub default_weight: f64,
    /// Keep `done` jobs queryable until history is cleared.
    #[serde(default = "default_keep_history")]
    pub keep_history: bool,
    /// Period of the interval tick source, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_quantum_ms() -> f64 { 20.0 }
fn default_min_charge_us() -> u64 { 100 }
fn default_duration_smoothing() -> f64 { 0.2 }
fn default_weight() -> f64 { 1.0 }
fn default_keep_history() -> bool { true }
fn default_tick_interval_ms() -> u64 { 1 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quantum_ms: default_quantum_ms(),
            min_charge_us: default_min_charge_us(),
            duration_smoothing: default_duration_smoothing(),
            default_weight: default_weight(),
            keep_history: default_keep_history(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "loaded scheduler config file");
        Self::from_toml_str(&raw)
    }

    /// Build config from environment variables (loads `.env` first).
    /// Profile is read from `FAIRTICK_PROFILE`. When set (e.g. `BENCH`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        let profile = env_opt("FAIRTICK_PROFILE").unwrap_or_default().to_uppercase();
        Self::default().with_env_overrides(&profile)
    }

    /// Apply `FAIRTICK_*` env overrides on top of `self`.
    pub fn with_env_overrides(mut self, profile: &str) -> Result<Self, ConfigError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        if let Some(v) = profiled_env_parse(p, "FAIRTICK_QUANTUM_MS")? {
            self.quantum_ms = v;
        }
        if let Some(v) = profiled_env_parse(p, "FAIRTICK_MIN_CHARGE_US")? {
            self.min_charge_us = v;
        }
        if let Some(v) = profiled_env_parse(p, "FAIRTICK_DURATION_SMOOTHING")? {
            self.duration_smoothing = v;
        }
        if let Some(v) = profiled_env_parse(p, "FAIRTICK_DEFAULT_WEIGHT")? {
            self.default_weight = v;
        }
        if let Some(v) = profiled_env_parse(p, "FAIRTICK_KEEP_HISTORY")? {
            self.keep_history = v;
        }
        if let Some(v) = profiled_env_parse(p, "FAIRTICK_TICK_INTERVAL_MS")? {
            self.tick_interval_ms = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.quantum_ms.is_finite() && self.quantum_ms > 0.0) {
            return Err(ConfigError::Invalid {
                key: "quantum_ms",
                reason: format!("must be a positive number, got {}", self.quantum_ms),
            });
        }
        if !(self.duration_smoothing > 0.0 && self.duration_smoothing <= 1.0) {
            return Err(ConfigError::Invalid {
                key: "duration_smoothing",
                reason: format!("must be in (0, 1], got {}", self.duration_smoothing),
            });
        }
        if !(self.default_weight.is_finite() && self.default_weight > 0.0) {
            return Err(ConfigError::Invalid {
                key: "default_weight",
                reason: format!("must be a positive number, got {}", self.default_weight),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "tick_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Replenishment quantum in weight-normalised seconds.
    pub fn quantum_secs(&self) -> f64 {
        self.quantum_ms / 1000.0
    }

    pub fn min_charge(&self) -> Duration {
        Duration::from_micros(self.min_charge_us)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
