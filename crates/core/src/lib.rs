//! Core types for the shop-floor monitor: machines, activity entries, users,
//! and the production timing arithmetic shared by every display.

pub type MachineId = String;
pub type UserId = String;
pub type EntryId = String;

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("unknown {kind} `{value}`")]
    UnknownVariant { kind: &'static str, value: String },
}

impl CoreError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::Invalid { field, reason: reason.into() }
    }
}

pub mod activity;
pub mod machine;
pub mod shift;
pub mod timing;
pub mod user;

pub use activity::{ActivityLogEntry, Severity};
pub use machine::{
    ConnectionStatus, MachineDraft, MachineModel, MachinePatch, MachineRecord, MachineStatus,
};
pub use user::{NewUser, Role, UserAccount, UserProfile};
