//! Dashboard KPIs across the whole fleet.

use std::collections::BTreeMap;

use serde::Serialize;
use sf_core::{MachineRecord, MachineStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    pub machines: usize,
    pub by_status: BTreeMap<MachineStatus, usize>,
    pub online: usize,
    pub total_parts: u64,
    /// Mean OEE of running machines; `None` when nothing is running.
    pub average_oee: Option<f64>,
}

impl FleetSummary {
    pub fn from_machines(machines: &[MachineRecord]) -> Self {
        let mut summary = FleetSummary { machines: machines.len(), ..Default::default() };
        let mut oee_sum = 0.0;
        let mut running = 0usize;
        for machine in machines {
            *summary.by_status.entry(machine.status).or_default() += 1;
            if machine.connection_status.is_online() {
                summary.online += 1;
            }
            summary.total_parts += machine.parts_count;
            if machine.is_running() {
                oee_sum += machine.oee;
                running += 1;
            }
        }
        if running > 0 {
            summary.average_oee = Some(oee_sum / running as f64);
        }
        summary
    }

    pub fn count(&self, status: MachineStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}
