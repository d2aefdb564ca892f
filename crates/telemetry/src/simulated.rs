use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use sf_core::{MachineId, MachineRecord};

use crate::{OeeFactors, TelemetrySample, TelemetrySource};

const AVAILABILITY: (f64, f64) = (95.0, 100.0);
const PERFORMANCE: (f64, f64) = (90.0, 100.0);
const QUALITY: (f64, f64) = (98.0, 100.0);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Chance that a machine misses its heartbeat on a given tick.
    pub heartbeat_loss_probability: f64,
    /// Largest step any OEE factor moves in one tick.
    pub walk_step: f64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self { heartbeat_loss_probability: 0.05, walk_step: 1.0 }
    }
}

/// Stand-in for a PLC feed: random heartbeat loss, one part per tick while
/// running, and OEE factors that each wander inside a fixed band.
pub struct SimulatedTelemetry {
    cfg: SimulatedConfig,
    rng: StdRng,
    walks: HashMap<MachineId, OeeFactors>,
}

impl SimulatedTelemetry {
    pub fn new(cfg: SimulatedConfig) -> Self {
        Self { cfg, rng: StdRng::from_entropy(), walks: HashMap::new() }
    }

    pub fn seeded(cfg: SimulatedConfig, seed: u64) -> Self {
        Self { cfg, rng: StdRng::seed_from_u64(seed), walks: HashMap::new() }
    }

    fn step(&mut self, value: f64, (lo, hi): (f64, f64)) -> f64 {
        let step = self.cfg.walk_step.abs();
        let delta = if step > 0.0 { self.rng.gen_range(-step..=step) } else { 0.0 };
        (value + delta).clamp(lo, hi)
    }

    fn start(&mut self, (lo, hi): (f64, f64)) -> f64 {
        self.rng.gen_range(lo..=hi)
    }

    fn walk(&mut self, id: &str) -> OeeFactors {
        let next = match self.walks.get(id).copied() {
            Some(prev) => OeeFactors {
                availability: self.step(prev.availability, AVAILABILITY),
                performance: self.step(prev.performance, PERFORMANCE),
                quality: self.step(prev.quality, QUALITY),
            },
            None => OeeFactors {
                availability: self.start(AVAILABILITY),
                performance: self.start(PERFORMANCE),
                quality: self.start(QUALITY),
            },
        };
        self.walks.insert(id.to_string(), next);
        next
    }
}

impl TelemetrySource for SimulatedTelemetry {
    fn name(&self) -> &str {
        "simulated"
    }

    fn sample(&mut self, machine: &MachineRecord) -> TelemetrySample {
        let p = self.cfg.heartbeat_loss_probability.clamp(0.0, 1.0);
        let connected = !self.rng.gen_bool(p);
        if !machine.is_running() {
            return TelemetrySample::idle(connected);
        }
        let factors = self.walk(&machine.id);
        TelemetrySample { connected, parts_completed: 1, oee: Some(factors) }
    }

    fn forget(&mut self, machine_id: &str) {
        self.walks.remove(machine_id);
    }
}
