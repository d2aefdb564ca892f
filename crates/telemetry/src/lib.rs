//! Telemetry sources feeding the machine registry.
//!
//! The registry only sees [`TelemetrySource`]; whether samples come from the
//! simulator or a PLC link is decided where the registry is built.

use serde::{Deserialize, Serialize};
use sf_core::MachineRecord;

pub mod simulated;

pub use simulated::{SimulatedConfig, SimulatedTelemetry};

/// Availability, performance and quality, each a percentage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OeeFactors {
    pub availability: f64,
    pub performance: f64,
    pub quality: f64,
}

impl OeeFactors {
    /// Overall equipment effectiveness as a percentage.
    pub fn oee(&self) -> f64 {
        self.availability * self.performance * self.quality / 10_000.0
    }
}

/// One reading for one machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub connected: bool,
    /// Parts finished since the previous sample. Only applied while running.
    pub parts_completed: u64,
    pub oee: Option<OeeFactors>,
}

impl TelemetrySample {
    pub fn idle(connected: bool) -> Self {
        Self { connected, parts_completed: 0, oee: None }
    }
}

/// A source of machine readings, polled once per registry tick.
pub trait TelemetrySource: Send {
    fn name(&self) -> &str;

    fn sample(&mut self, machine: &MachineRecord) -> TelemetrySample;

    /// Drop any per-machine state once a machine is deleted.
    fn forget(&mut self, _machine_id: &str) {}
}

/// Deterministic source: always connected, one part per tick, fixed factors.
pub struct SteadyTelemetry {
    factors: OeeFactors,
}

impl SteadyTelemetry {
    pub fn new(factors: OeeFactors) -> Self {
        Self { factors }
    }
}

impl Default for SteadyTelemetry {
    fn default() -> Self {
        Self::new(OeeFactors { availability: 98.0, performance: 95.0, quality: 99.0 })
    }
}

impl TelemetrySource for SteadyTelemetry {
    fn name(&self) -> &str {
        "steady"
    }

    fn sample(&mut self, machine: &MachineRecord) -> TelemetrySample {
        if !machine.is_running() {
            return TelemetrySample::idle(true);
        }
        TelemetrySample { connected: true, parts_completed: 1, oee: Some(self.factors) }
    }
}
