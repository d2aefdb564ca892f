//! Everything a machine card shows, computed from one record and one instant.

use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;

use sf_core::timing::{self, PartTimer};
use sf_core::{MachineId, MachineModel, MachineRecord, MachineStatus};

/// Stock below this percentage raises the bar-change prompt.
pub const BAR_CHANGE_THRESHOLD: f64 = 15.0;
/// Stock below this percentage paints the bar gauge red.
pub const STOCK_CRITICAL_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDisplay {
    pub machine_id: MachineId,
    pub title: String,
    pub model: MachineModel,
    pub status: MachineStatus,
    pub online: bool,
    pub operator: String,
    pub material: String,
    pub parts_count: u64,
    pub parts_goal: u64,
    pub progress: f64,
    pub oee: u32,
    /// `HH:MM:SS` until the goal is reached.
    pub time_left: String,
    pub completion: String,
    pub completed: bool,
    pub part_timer: String,
    pub stock: String,
    /// Bar length still in the spindle, cut-off included. `None` without lengths.
    pub bar_remaining_mm: Option<u64>,
    pub bar_change_due: bool,
    pub stock_critical: bool,
    pub start_date: String,
    pub cycle_variance: Option<f64>,
}

/// Renders cards in a fixed display time zone.
#[derive(Debug, Clone)]
pub struct MachineCard<Tz: TimeZone = Local> {
    tz: Tz,
}

impl MachineCard<Local> {
    pub fn local() -> Self {
        Self { tz: Local }
    }
}

impl Default for MachineCard<Local> {
    fn default() -> Self {
        Self::local()
    }
}

impl<Tz> MachineCard<Tz>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn display(&self, machine: &MachineRecord, now: DateTime<Utc>) -> CardDisplay {
        let now = now.with_timezone(&self.tz);
        let cycle = machine.cycle_seconds();
        let (goal, count) = (machine.parts_goal, machine.parts_count);
        let remaining = timing::remaining_seconds(goal, count, cycle);
        let completion = timing::completion_estimate(goal, count, cycle, now.clone());
        let timer = timing::part_timer(machine.status, cycle, machine.last_part_at, &now);
        let stock = timing::stock_estimate(
            machine.status,
            cycle,
            machine.parts_per_bar(),
            machine.stock_level,
        );

        CardDisplay {
            machine_id: machine.id.clone(),
            title: machine.title().to_string(),
            model: machine.model,
            status: machine.status,
            online: machine.connection_status.is_online(),
            operator: or_placeholder(&machine.operator, "---"),
            material: or_placeholder(&machine.material, "NOT ASSIGNED"),
            parts_count: machine.parts_count,
            parts_goal: machine.parts_goal,
            progress: timing::progress_percent(machine.parts_count, machine.parts_goal),
            oee: machine.oee.max(0.0).round() as u32,
            time_left: timing::format_hms(remaining),
            completed: completion.is_completed(),
            completion: completion.to_string(),
            part_timer: timer.to_string(),
            stock: stock.to_string(),
            bar_remaining_mm: bar_remaining_mm(machine),
            bar_change_due: machine.stock_level < BAR_CHANGE_THRESHOLD,
            stock_critical: machine.stock_level < STOCK_CRITICAL_THRESHOLD,
            start_date: timing::format_start_time(&machine.start_time, &self.tz),
            cycle_variance: timing::cycle_variance(&machine.cycle_time, &machine.actual_cycle_time),
        }
    }

    /// Just the spindle timer, for the fast refresh cadence.
    pub fn part_timer(&self, machine: &MachineRecord, now: DateTime<Utc>) -> PartTimer {
        timing::part_timer(machine.status, machine.cycle_seconds(), machine.last_part_at, &now)
    }
}

fn bar_remaining_mm(machine: &MachineRecord) -> Option<u64> {
    let workpiece = machine.workpiece_length?;
    machine.part_length?;
    let cutoff = machine.cutoff_length.unwrap_or(0.0);
    let left = cutoff + machine.stock_level.clamp(0.0, 100.0) / 100.0 * (workpiece - cutoff);
    Some(left.max(0.0).round() as u64)
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}
