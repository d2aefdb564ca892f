//! Read models behind the dashboard: route guarding, machine cards, the
//! notification bell and fleet-level KPIs.

pub mod access;
pub mod card;
pub mod fleet;
pub mod notifications;

pub use access::{navigation, resolve, AccessDecision, View};
pub use card::{CardDisplay, MachineCard};
pub use fleet::FleetSummary;
pub use notifications::{NotificationFeed, NOTIFICATION_PAGE};
