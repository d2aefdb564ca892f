//! In-memory machine registry: operator actions and the telemetry tick.
//!
//! Every operator decision (create, edit, delete, pause, resume, bar change)
//! leaves an activity entry. The telemetry tick stays quiet except for the
//! moment a bar runs out.

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sf_core::activity::SYSTEM_USER;
use sf_core::{
    ConnectionStatus, CoreError, MachineDraft, MachineId, MachineModel, MachinePatch,
    MachineRecord, MachineStatus, Severity,
};
use sf_stores::{short_id, LogStore};
use sf_telemetry::TelemetrySource;

pub mod query;

pub use query::{MachineQuery, SortKey, SortOrder};

/// Stock below this is treated as an empty bar; absorbs float residue from
/// repeated `100 / parts_per_bar` steps.
const STOCK_EPSILON: f64 = 1e-6;

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("no machine with id `{0}`")]
    UnknownMachine(MachineId),
    #[error(transparent)]
    Invalid(#[from] CoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Goal assigned when the add form leaves it at zero.
    pub default_parts_goal: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { default_parts_goal: 5000 }
    }
}

/// What one telemetry tick changed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub machines: usize,
    pub parts_produced: u64,
    pub disconnected: usize,
    /// Machines whose bar ran out on this tick.
    pub depleted: Vec<MachineId>,
}

pub struct MachineRegistry {
    cfg: RegistryConfig,
    telemetry: Box<dyn TelemetrySource>,
    log: LogStore,
    machines: Vec<MachineRecord>,
}

impl MachineRegistry {
    pub fn new(cfg: RegistryConfig, telemetry: Box<dyn TelemetrySource>, log: LogStore) -> Self {
        Self { cfg, telemetry, log, machines: Vec::new() }
    }

    pub fn telemetry_name(&self) -> &str {
        self.telemetry.name()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn list(&self) -> Vec<MachineRecord> {
        self.machines.clone()
    }

    pub fn get(&self, id: &str) -> Option<&MachineRecord> {
        self.machines.iter().find(|m| m.id == id)
    }

    pub fn query(&self, query: &MachineQuery) -> Vec<MachineRecord> {
        query.apply(&self.machines)
    }

    /// Distinct models present, in first-seen order.
    pub fn models(&self) -> Vec<MachineModel> {
        let mut models = Vec::new();
        for machine in &self.machines {
            if !models.contains(&machine.model) {
                models.push(machine.model);
            }
        }
        models
    }

    /// Distinct operators present, in first-seen order.
    pub fn operators(&self) -> Vec<String> {
        let mut operators: Vec<String> = Vec::new();
        for machine in &self.machines {
            if !operators.contains(&machine.operator) {
                operators.push(machine.operator.clone());
            }
        }
        operators
    }

    pub fn add(
        &mut self,
        actor: &str,
        draft: MachineDraft,
    ) -> Result<MachineRecord, RegistryError> {
        draft.validate()?;
        let id = short_id();
        let now = Utc::now();
        let name = if draft.name.trim().is_empty() {
            format!("Machine-{}", &id[..4])
        } else {
            draft.name.clone()
        };
        let parts_goal =
            if draft.parts_goal == 0 { self.cfg.default_parts_goal } else { draft.parts_goal };

        let machine = MachineRecord {
            id: id.clone(),
            name,
            model: draft.model,
            mc_number: draft.mc_number,
            status: MachineStatus::Running,
            connection_status: ConnectionStatus::Online,
            last_heartbeat: clock_stamp(&now),
            last_update: "Just started".to_string(),
            parts_count: draft.parts_count,
            parts_goal,
            oee: rand::thread_rng().gen_range(85.0..95.0),
            cycle_time: draft.cycle_time,
            actual_cycle_time: draft.actual_cycle_time,
            material: draft.material,
            material_diameter: draft.material_diameter,
            workpiece_length: draft.workpiece_length,
            cutoff_length: draft.cutoff_length,
            part_length: draft.part_length,
            stock_level: draft.stock_level.unwrap_or(100.0),
            operator: actor.to_string(),
            start_time: now.to_rfc3339(),
            current_program: draft.part_name.clone(),
            part_name: draft.part_name,
            last_part_at: Some(now),
        };

        let mut next = self.machines.clone();
        next.push(machine.clone());
        self.machines = next;

        info!(
            machine_id = %machine.id,
            name = %machine.name,
            model = %machine.model,
            "machine added"
        );
        self.log.append(
            actor,
            "Machine Created",
            &format!("Added machine: {}", machine.part_name),
            Severity::Success,
        );
        Ok(machine)
    }

    pub fn edit(
        &mut self,
        actor: &str,
        id: &str,
        patch: MachinePatch,
    ) -> Result<MachineRecord, RegistryError> {
        patch.validate()?;
        let ((), machine) = self.update(id, |m| patch.apply(m))?;
        self.log.append(
            actor,
            "Machine Updated",
            &format!("Updated machine: {}", machine.part_name),
            Severity::Info,
        );
        Ok(machine)
    }

    pub fn delete(&mut self, actor: &str, id: &str) -> Result<MachineRecord, RegistryError> {
        let idx = self.position(id)?;
        let mut next = self.machines.clone();
        let removed = next.remove(idx);
        self.machines = next;
        self.telemetry.forget(id);

        info!(machine_id = %id, "machine deleted");
        self.log.append(
            actor,
            "Machine Deleted",
            &format!("Deleted machine ID: {id}"),
            Severity::Warning,
        );
        Ok(removed)
    }

    /// Flip running ↔ paused. Any other status is left alone and nothing is logged.
    pub fn toggle_pause(&mut self, actor: &str, id: &str) -> Result<MachineStatus, RegistryError> {
        let now = Utc::now();
        let (status, machine) = self.update(id, |m| {
            match m.status {
                MachineStatus::Running => m.status = MachineStatus::Paused,
                MachineStatus::Paused => {
                    m.status = MachineStatus::Running;
                    m.last_part_at = Some(now);
                }
                _ => {}
            }
            m.status
        })?;

        match status {
            MachineStatus::Paused => {
                let details = format!("Paused machine: {}", machine.name);
                self.log.append(actor, "Machine Paused", &details, Severity::Warning);
            }
            MachineStatus::Running => {
                let details = format!("Resumed machine: {}", machine.name);
                self.log.append(actor, "Machine Resumed", &details, Severity::Success);
            }
            other => debug!(machine_id = %id, status = %other, "pause toggle ignored"),
        }
        Ok(status)
    }

    /// Load a fresh bar. Always logged, even if the bar was already full.
    pub fn reset_bar(&mut self, actor: &str, id: &str) -> Result<MachineRecord, RegistryError> {
        let ((), machine) = self.update(id, |m| m.stock_level = 100.0)?;
        self.log.append(
            actor,
            "Bar Changed",
            &format!("Changed bar for machine: {}", machine.name),
            Severity::Success,
        );
        Ok(machine)
    }

    /// Operator-declared status such as alarm or setup. Setting the current status
    /// is a no-op.
    pub fn set_status(
        &mut self,
        actor: &str,
        id: &str,
        status: MachineStatus,
    ) -> Result<MachineRecord, RegistryError> {
        let now = Utc::now();
        let (previous, machine) = self.update(id, |m| {
            let previous = m.status;
            if previous != status {
                m.status = status;
                if status == MachineStatus::Running {
                    m.last_part_at = Some(now);
                }
            }
            previous
        })?;
        if previous != status {
            self.log.append(
                actor,
                "Status Changed",
                &format!("{}: {} -> {}", machine.name, previous, status),
                Severity::Info,
            );
        }
        Ok(machine)
    }

    /// Apply one telemetry sample to every machine and swap in the new list.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let heartbeat = clock_stamp(&now);
        let update_stamp = now.with_timezone(&Local).format("%H:%M").to_string();
        let mut report = TickReport { machines: self.machines.len(), ..Default::default() };
        let mut depleted_names = Vec::new();

        let mut next = Vec::with_capacity(self.machines.len());
        for current in &self.machines {
            let sample = self.telemetry.sample(current);
            let mut machine = current.clone();

            if sample.connected {
                machine.connection_status = ConnectionStatus::Online;
                machine.last_heartbeat = heartbeat.clone();
            } else {
                machine.connection_status = ConnectionStatus::Offline;
                report.disconnected += 1;
            }

            if machine.is_running() {
                let produced = sample.parts_completed;
                if produced > 0 {
                    machine.parts_count = machine.parts_count.saturating_add(produced);
                    let per_bar = machine.parts_per_bar();
                    if per_bar > 0 {
                        let used = produced as f64 * 100.0 / f64::from(per_bar);
                        let left = machine.stock_level - used;
                        machine.stock_level = if left < STOCK_EPSILON { 0.0 } else { left };
                    }
                    machine.last_part_at = Some(now);
                    report.parts_produced += produced;
                }
                if let Some(factors) = sample.oee {
                    machine.oee = factors.oee();
                }
                machine.last_update = update_stamp.clone();

                if current.stock_level > 0.0 && machine.stock_level <= 0.0 {
                    report.depleted.push(machine.id.clone());
                    depleted_names.push(machine.name.clone());
                }
            }
            next.push(machine);
        }
        self.machines = next;

        for name in depleted_names {
            warn!(machine = %name, "bar depleted");
            self.log.append(
                SYSTEM_USER,
                "Material Finished",
                &format!("Machine {name} requires bar change"),
                Severity::Error,
            );
        }
        debug!(
            machines = report.machines,
            parts = report.parts_produced,
            disconnected = report.disconnected,
            source = self.telemetry.name(),
            "telemetry tick"
        );
        report
    }

    fn position(&self, id: &str) -> Result<usize, RegistryError> {
        self.machines
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| RegistryError::UnknownMachine(id.to_string()))
    }

    /// Clone, mutate one record, swap the whole list in.
    fn update<T>(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut MachineRecord) -> T,
    ) -> Result<(T, MachineRecord), RegistryError> {
        let idx = self.position(id)?;
        let mut next = self.machines.clone();
        let out = f(&mut next[idx]);
        let machine = next[idx].clone();
        self.machines = next;
        Ok((out, machine))
    }
}

fn clock_stamp(now: &DateTime<Utc>) -> String {
    now.with_timezone(&Local).format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use sf_core::MachineModel;
    use sf_telemetry::{SteadyTelemetry, TelemetrySample};

    fn registry() -> (MachineRegistry, LogStore) {
        let log = LogStore::in_memory();
        let registry = MachineRegistry::new(
            RegistryConfig::default(),
            Box::new(SteadyTelemetry::default()),
            log.clone(),
        );
        (registry, log)
    }

    fn draft(part: &str) -> MachineDraft {
        MachineDraft {
            name: "Lathe 1".into(),
            model: MachineModel::Star206,
            part_name: part.into(),
            cycle_time: "2m 30s".into(),
            part_length: Some(27.0),
            ..Default::default()
        }
    }

    fn actions(log: &LogStore) -> Vec<String> {
        log.read_all().into_iter().map(|e| e.action).collect()
    }

    struct Disconnected;

    impl TelemetrySource for Disconnected {
        fn name(&self) -> &str {
            "disconnected"
        }

        fn sample(&mut self, _machine: &MachineRecord) -> TelemetrySample {
            TelemetrySample::idle(false)
        }
    }

    #[test]
    fn add_defaults_goal_name_and_running_state() {
        let (mut registry, log) = registry();
        let machine = registry
            .add("John Operator", MachineDraft { name: String::new(), ..draft("Shaft") })
            .unwrap();
        assert_eq!(machine.status, MachineStatus::Running);
        assert_eq!(machine.connection_status, ConnectionStatus::Online);
        assert_eq!(machine.parts_goal, 5000);
        assert_eq!(machine.stock_level, 100.0);
        assert_eq!(machine.operator, "John Operator");
        assert_eq!(machine.current_program, "Shaft");
        assert!(machine.name.starts_with("Machine-"));
        assert!((85.0..95.0).contains(&machine.oee));
        assert_eq!(actions(&log)[0], "Machine Created");
    }

    #[test]
    fn add_rejects_missing_part_name() {
        let (mut registry, log) = registry();
        let err = registry.add("op", draft(" ")).unwrap_err();
        assert!(matches!(err, RegistryError::Invalid(_)));
        assert!(registry.is_empty());
        assert_eq!(log.read_all().len(), 1);
    }

    #[test]
    fn edit_merges_and_keeps_identity() {
        let (mut registry, log) = registry();
        let machine = registry.add("op", draft("Shaft")).unwrap();
        let edited = registry
            .edit("op", &machine.id, MachinePatch { parts_goal: Some(10), ..Default::default() })
            .unwrap();
        assert_eq!(edited.id, machine.id);
        assert_eq!(edited.name, machine.name);
        assert_eq!(edited.parts_goal, 10);
        assert_eq!(edited.cycle_time, "2m 30s");
        assert_eq!(actions(&log)[0], "Machine Updated");
    }

    #[test]
    fn delete_removes_and_logs_warning() {
        let (mut registry, log) = registry();
        let machine = registry.add("op", draft("Shaft")).unwrap();
        registry.delete("op", &machine.id).unwrap();
        assert!(registry.get(&machine.id).is_none());
        let entry = &log.read_all()[0];
        assert_eq!(entry.action, "Machine Deleted");
        assert_eq!(entry.severity, Severity::Warning);
        assert!(matches!(
            registry.delete("op", &machine.id),
            Err(RegistryError::UnknownMachine(_))
        ));
    }

    #[test]
    fn pause_toggles_only_between_running_and_paused() {
        let (mut registry, log) = registry();
        let id = registry.add("op", draft("Shaft")).unwrap().id;
        assert_eq!(registry.toggle_pause("op", &id).unwrap(), MachineStatus::Paused);
        assert_eq!(registry.toggle_pause("op", &id).unwrap(), MachineStatus::Running);
        assert_eq!(
            &actions(&log)[..2],
            &["Machine Resumed".to_string(), "Machine Paused".to_string()]
        );

        registry.set_status("op", &id, MachineStatus::Alarm).unwrap();
        let before = log.read_all().len();
        assert_eq!(registry.toggle_pause("op", &id).unwrap(), MachineStatus::Alarm);
        assert_eq!(log.read_all().len(), before);
    }

    #[test]
    fn reset_bar_refills_and_always_logs() {
        let (mut registry, log) = registry();
        let id = registry.add("op", draft("Shaft")).unwrap().id;
        registry.reset_bar("op", &id).unwrap();
        registry
            .edit("op", &id, MachinePatch { stock_level: Some(3.0), ..Default::default() })
            .unwrap();
        let machine = registry.reset_bar("op", &id).unwrap();
        assert_eq!(machine.stock_level, 100.0);
        let bar_changes = log.read_all().iter().filter(|e| e.action == "Bar Changed").count();
        assert_eq!(bar_changes, 2);
    }

    #[test]
    fn tick_counts_parts_and_consumes_stock() {
        let (mut registry, log) = registry();
        let id = registry.add("op", draft("Shaft")).unwrap().id;
        let logged = log.read_all().len();
        let now = Utc::now();

        let report = registry.tick(now);
        assert_eq!(report.parts_produced, 1);
        let machine = registry.get(&id).unwrap();
        assert_eq!(machine.parts_count, 1);
        // 3000 - 300 = 2700 mm at 27 mm per part is 100 parts, 1% each.
        assert!((machine.stock_level - 99.0).abs() < 1e-9);
        assert_eq!(machine.last_part_at, Some(now));
        assert!((machine.oee - 98.0 * 95.0 * 99.0 / 10_000.0).abs() < 1e-9);
        assert_eq!(log.read_all().len(), logged);
    }

    #[test]
    fn paused_machines_do_not_produce() {
        let (mut registry, _log) = registry();
        let id = registry.add("op", draft("Shaft")).unwrap().id;
        registry.toggle_pause("op", &id).unwrap();
        registry.tick(Utc::now());
        assert_eq!(registry.get(&id).unwrap().parts_count, 0);
    }

    #[test]
    fn depletion_is_logged_once_on_the_edge() {
        let (mut registry, log) = registry();
        let id = registry.add("op", draft("Shaft")).unwrap().id;
        registry
            .edit("op", &id, MachinePatch { stock_level: Some(2.0), ..Default::default() })
            .unwrap();

        let start = Utc::now();
        let mut depleted_reports = 0;
        for i in 0..6 {
            let report = registry.tick(start + Duration::seconds(2 * i));
            depleted_reports += report.depleted.len();
        }
        assert_eq!(registry.get(&id).unwrap().stock_level, 0.0);
        assert_eq!(depleted_reports, 1);
        let finished: Vec<_> =
            log.read_all().into_iter().filter(|e| e.action == "Material Finished").collect();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].severity, Severity::Error);
        assert_eq!(finished[0].user, "System");
        assert_eq!(finished[0].details, "Machine Lathe 1 requires bar change");
    }

    #[test]
    fn float_residue_still_reaches_empty() {
        let (mut registry, log) = registry();
        let machine = registry
            .add("op", MachineDraft { part_length: Some(900.0), ..draft("Block") })
            .unwrap();
        // 2700 mm / 900 mm = 3 parts per bar.
        for _ in 0..3 {
            registry.tick(Utc::now());
        }
        assert_eq!(registry.get(&machine.id).unwrap().stock_level, 0.0);
        assert_eq!(log.read_all().iter().filter(|e| e.action == "Material Finished").count(), 1);
    }

    #[test]
    fn missing_lengths_leave_stock_alone() {
        let (mut registry, _log) = registry();
        let id = registry
            .add("op", MachineDraft { part_length: None, ..draft("Shaft") })
            .unwrap()
            .id;
        registry.tick(Utc::now());
        let machine = registry.get(&id).unwrap();
        assert_eq!(machine.stock_level, 100.0);
        assert_eq!(machine.parts_count, 1);
    }

    #[test]
    fn lost_heartbeat_keeps_last_stamp() {
        let log = LogStore::in_memory();
        let mut registry =
            MachineRegistry::new(RegistryConfig::default(), Box::new(Disconnected), log);
        let machine = registry.add("op", draft("Shaft")).unwrap();
        let report = registry.tick(Utc::now() + Duration::seconds(5));
        assert_eq!(report.disconnected, 1);
        let after = registry.get(&machine.id).unwrap();
        assert_eq!(after.connection_status, ConnectionStatus::Offline);
        assert_eq!(after.last_heartbeat, machine.last_heartbeat);
    }

    #[test]
    fn distinct_models_and_operators() {
        let (mut registry, _log) = registry();
        registry.add("Ann", draft("A")).unwrap();
        registry.add("Bob", MachineDraft { model: MachineModel::Citizen, ..draft("B") }).unwrap();
        registry.add("Ann", draft("C")).unwrap();
        assert_eq!(registry.models(), vec![MachineModel::Star206, MachineModel::Citizen]);
        assert_eq!(registry.operators(), vec!["Ann".to_string(), "Bob".to_string()]);
    }
}
