use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timing;
use crate::{CoreError, MachineId};

/// Longest station tag the add/edit form accepts.
pub const MC_NUMBER_MAX_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Idle,
    Running,
    Alarm,
    Setup,
    Offline,
    Paused,
}

impl MachineStatus {
    pub const ALL: [MachineStatus; 6] = [
        MachineStatus::Idle,
        MachineStatus::Running,
        MachineStatus::Alarm,
        MachineStatus::Setup,
        MachineStatus::Offline,
        MachineStatus::Paused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Idle => "idle",
            MachineStatus::Running => "running",
            MachineStatus::Alarm => "alarm",
            MachineStatus::Setup => "setup",
            MachineStatus::Offline => "offline",
            MachineStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MachineStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "machine status",
                value: s.to_string(),
            })
    }
}

/// Link state reported by the telemetry feed. Independent of [`MachineStatus`]:
/// a running machine that is offline is showing stale data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Online,
    Offline,
}

impl ConnectionStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectionStatus::Online)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum MachineModel {
    #[default]
    #[serde(rename = "Star 206")]
    Star206,
    #[serde(rename = "Tsugami 206")]
    Tsugami206,
    #[serde(rename = "Tsugami S 206")]
    TsugamiS206,
    #[serde(rename = "CITIZEN")]
    Citizen,
}

impl MachineModel {
    pub const ALL: [MachineModel; 4] = [
        MachineModel::Star206,
        MachineModel::Tsugami206,
        MachineModel::TsugamiS206,
        MachineModel::Citizen,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MachineModel::Star206 => "Star 206",
            MachineModel::Tsugami206 => "Tsugami 206",
            MachineModel::TsugamiS206 => "Tsugami S 206",
            MachineModel::Citizen => "CITIZEN",
        }
    }
}

impl fmt::Display for MachineModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MachineModel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MachineModel::ALL
            .into_iter()
            .find(|model| model.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "machine model",
                value: s.to_string(),
            })
    }
}

/// One tracked CNC machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineRecord {
    pub id: MachineId,
    pub name: String,
    pub model: MachineModel,
    pub mc_number: String,
    pub status: MachineStatus,
    pub connection_status: ConnectionStatus,
    pub last_heartbeat: String,
    pub last_update: String,
    pub parts_count: u64,
    pub parts_goal: u64,
    pub oee: f64,
    pub cycle_time: String,
    /// Measured cycle time. Informational; only [`timing::cycle_variance`] reads it.
    pub actual_cycle_time: String,
    pub material: String,
    pub material_diameter: String,
    pub workpiece_length: Option<f64>,
    pub cutoff_length: Option<f64>,
    pub part_length: Option<f64>,
    pub stock_level: f64,
    pub operator: String,
    pub start_time: String,
    pub current_program: String,
    pub part_name: String,
    /// When telemetry last counted a part. The part timer saw-tooth is anchored here.
    #[serde(default)]
    pub last_part_at: Option<DateTime<Utc>>,
}

impl MachineRecord {
    pub fn new(id: impl Into<MachineId>, name: impl Into<String>, model: MachineModel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model,
            mc_number: String::new(),
            status: MachineStatus::Idle,
            connection_status: ConnectionStatus::Online,
            last_heartbeat: String::new(),
            last_update: String::new(),
            parts_count: 0,
            parts_goal: 0,
            oee: 0.0,
            cycle_time: String::new(),
            actual_cycle_time: String::new(),
            material: String::new(),
            material_diameter: String::new(),
            workpiece_length: None,
            cutoff_length: None,
            part_length: None,
            stock_level: 100.0,
            operator: String::new(),
            start_time: String::new(),
            current_program: String::new(),
            part_name: String::new(),
            last_part_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == MachineStatus::Running
    }

    pub fn cycle_seconds(&self) -> f64 {
        timing::parse_cycle_time(&self.cycle_time)
    }

    pub fn parts_per_bar(&self) -> u32 {
        timing::parts_per_bar(self.workpiece_length, self.cutoff_length, self.part_length)
    }

    pub fn parts_remaining(&self) -> u64 {
        self.parts_goal.saturating_sub(self.parts_count)
    }

    /// Part name when set, machine name otherwise; the card title.
    pub fn title(&self) -> &str {
        if self.part_name.trim().is_empty() {
            &self.name
        } else {
            &self.part_name
        }
    }
}

/// Input of the "add machine" form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineDraft {
    pub name: String,
    pub model: MachineModel,
    pub part_name: String,
    pub mc_number: String,
    pub parts_goal: u64,
    pub parts_count: u64,
    pub cycle_time: String,
    pub actual_cycle_time: String,
    pub material: String,
    pub material_diameter: String,
    pub workpiece_length: Option<f64>,
    pub cutoff_length: Option<f64>,
    pub part_length: Option<f64>,
    pub stock_level: Option<f64>,
}

impl Default for MachineDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            model: MachineModel::default(),
            part_name: String::new(),
            mc_number: String::new(),
            parts_goal: 0,
            parts_count: 0,
            cycle_time: String::new(),
            actual_cycle_time: String::new(),
            material: String::new(),
            material_diameter: String::new(),
            workpiece_length: Some(3000.0),
            cutoff_length: Some(300.0),
            part_length: None,
            stock_level: None,
        }
    }
}

impl MachineDraft {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.part_name.trim().is_empty() {
            return Err(CoreError::invalid("partName", "must not be empty"));
        }
        validate_mc_number(&self.mc_number)?;
        validate_lengths(self.workpiece_length, self.cutoff_length, self.part_length)?;
        if let Some(stock) = self.stock_level {
            validate_stock(stock)?;
        }
        Ok(())
    }
}

/// Field-level edit. `None` leaves the field untouched; identity fields are not editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MachinePatch {
    pub model: Option<MachineModel>,
    pub part_name: Option<String>,
    pub mc_number: Option<String>,
    pub parts_goal: Option<u64>,
    pub parts_count: Option<u64>,
    pub cycle_time: Option<String>,
    pub actual_cycle_time: Option<String>,
    pub material: Option<String>,
    pub material_diameter: Option<String>,
    pub workpiece_length: Option<f64>,
    pub cutoff_length: Option<f64>,
    pub part_length: Option<f64>,
    pub stock_level: Option<f64>,
    pub operator: Option<String>,
}

impl MachinePatch {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(part_name) = &self.part_name {
            if part_name.trim().is_empty() {
                return Err(CoreError::invalid("partName", "must not be empty"));
            }
        }
        if let Some(mc_number) = &self.mc_number {
            validate_mc_number(mc_number)?;
        }
        validate_lengths(self.workpiece_length, self.cutoff_length, self.part_length)?;
        if let Some(stock) = self.stock_level {
            validate_stock(stock)?;
        }
        Ok(())
    }

    /// Merge into `machine`. The part name doubles as the current program, as on the edit form.
    pub fn apply(&self, machine: &mut MachineRecord) {
        if let Some(model) = self.model {
            machine.model = model;
        }
        if let Some(part_name) = &self.part_name {
            machine.part_name = part_name.clone();
            machine.current_program = part_name.clone();
        }
        if let Some(mc_number) = &self.mc_number {
            machine.mc_number = mc_number.clone();
        }
        if let Some(goal) = self.parts_goal {
            machine.parts_goal = goal;
        }
        if let Some(count) = self.parts_count {
            machine.parts_count = count;
        }
        if let Some(cycle_time) = &self.cycle_time {
            machine.cycle_time = cycle_time.clone();
        }
        if let Some(actual) = &self.actual_cycle_time {
            machine.actual_cycle_time = actual.clone();
        }
        if let Some(material) = &self.material {
            machine.material = material.clone();
        }
        if let Some(diameter) = &self.material_diameter {
            machine.material_diameter = diameter.clone();
        }
        if self.workpiece_length.is_some() {
            machine.workpiece_length = self.workpiece_length;
        }
        if self.cutoff_length.is_some() {
            machine.cutoff_length = self.cutoff_length;
        }
        if self.part_length.is_some() {
            machine.part_length = self.part_length;
        }
        if let Some(stock) = self.stock_level {
            machine.stock_level = stock;
        }
        if let Some(operator) = &self.operator {
            machine.operator = operator.clone();
        }
    }
}

fn validate_mc_number(mc_number: &str) -> Result<(), CoreError> {
    if mc_number.chars().count() > MC_NUMBER_MAX_LEN {
        return Err(CoreError::invalid(
            "mcNumber",
            format!("at most {MC_NUMBER_MAX_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_lengths(
    workpiece: Option<f64>,
    cutoff: Option<f64>,
    part: Option<f64>,
) -> Result<(), CoreError> {
    for (field, value) in [
        ("workpieceLength", workpiece),
        ("cutoffLength", cutoff),
        ("partLength", part),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(CoreError::invalid(field, "must be a non-negative length in mm"));
            }
        }
    }
    Ok(())
}

fn validate_stock(stock: f64) -> Result<(), CoreError> {
    if !(0.0..=100.0).contains(&stock) {
        return Err(CoreError::invalid("stockLevel", "must be between 0 and 100"));
    }
    Ok(())
}
