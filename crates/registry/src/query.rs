//! Filtering and sorting for the machines page.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sf_core::{MachineModel, MachineRecord, MachineStatus};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Name,
    Status,
    PartsCount,
    Oee,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Every filter is optional; an empty query returns the list sorted by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineQuery {
    pub status: Option<MachineStatus>,
    pub model: Option<MachineModel>,
    pub operator: Option<String>,
    /// Case-insensitive substring of name, part name or station tag.
    pub search: Option<String>,
    pub sort_by: SortKey,
    pub order: SortOrder,
}

impl MachineQuery {
    pub fn matches(&self, machine: &MachineRecord) -> bool {
        if self.status.is_some_and(|s| s != machine.status) {
            return false;
        }
        if self.model.is_some_and(|m| m != machine.model) {
            return false;
        }
        if let Some(operator) = &self.operator {
            if &machine.operator != operator {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                [&machine.name, &machine.part_name, &machine.mc_number]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }

    pub fn apply(&self, machines: &[MachineRecord]) -> Vec<MachineRecord> {
        let mut out: Vec<MachineRecord> =
            machines.iter().filter(|m| self.matches(m)).cloned().collect();
        out.sort_by(|a, b| {
            let ord = compare(self.sort_by, a, b);
            match self.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        out
    }
}

fn compare(key: SortKey, a: &MachineRecord, b: &MachineRecord) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
        SortKey::PartsCount => a.parts_count.cmp(&b.parts_count),
        SortKey::Oee => a.oee.total_cmp(&b.oee),
    }
}
