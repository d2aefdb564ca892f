use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use sf_registry::RegistryConfig;
use sf_stores::DEFAULT_LOG_CAPACITY;
use sf_telemetry::SimulatedConfig;

/// Knobs for one dashboard process. Every field has a default, so a partial
/// JSON file is enough.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub telemetry_period_ms: u64,
    pub countdown_refresh_ms: u64,
    pub part_timer_refresh_ms: u64,
    pub log_capacity: usize,
    /// Persisted activity log. In-memory when unset.
    pub log_path: Option<PathBuf>,
    pub default_parts_goal: u64,
    pub heartbeat_loss_probability: f64,
    /// Seed for the simulated feed; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            telemetry_period_ms: 2_000,
            countdown_refresh_ms: 1_000,
            part_timer_refresh_ms: 100,
            log_capacity: DEFAULT_LOG_CAPACITY,
            log_path: None,
            default_parts_goal: 5_000,
            heartbeat_loss_probability: 0.05,
            seed: None,
        }
    }
}

impl DashboardConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: DashboardConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.telemetry_period_ms > 0, "telemetry_period_ms must be positive");
        ensure!(self.countdown_refresh_ms > 0, "countdown_refresh_ms must be positive");
        ensure!(self.part_timer_refresh_ms > 0, "part_timer_refresh_ms must be positive");
        ensure!(self.log_capacity > 0, "log_capacity must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.heartbeat_loss_probability),
            "heartbeat_loss_probability must be within [0, 1], got {}",
            self.heartbeat_loss_probability
        );
        Ok(())
    }

    pub fn telemetry_period(&self) -> Duration {
        Duration::from_millis(self.telemetry_period_ms)
    }

    pub fn countdown_refresh(&self) -> Duration {
        Duration::from_millis(self.countdown_refresh_ms)
    }

    pub fn part_timer_refresh(&self) -> Duration {
        Duration::from_millis(self.part_timer_refresh_ms)
    }

    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig { default_parts_goal: self.default_parts_goal }
    }

    pub fn simulated(&self) -> SimulatedConfig {
        SimulatedConfig {
            heartbeat_loss_probability: self.heartbeat_loss_probability,
            ..SimulatedConfig::default()
        }
    }
}
