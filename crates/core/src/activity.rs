use std::fmt;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::EntryId;

pub const UNKNOWN_USER: &str = "Unknown User";
pub const SYSTEM_USER: &str = "System";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Success,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Success => "success",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit/notification record. Stored verbatim as JSON; `unread` tolerates
/// being absent so older stored lists still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityLogEntry {
    pub id: EntryId,
    pub user: String,
    pub action: String,
    pub details: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub severity: Severity,
    #[serde(default)]
    pub unread: bool,
}

impl ActivityLogEntry {
    /// A fresh, unread entry. A blank user is recorded as [`UNKNOWN_USER`].
    pub fn new<Tz>(
        id: impl Into<EntryId>,
        user: &str,
        action: impl Into<String>,
        details: impl Into<String>,
        severity: Severity,
        at: &DateTime<Tz>,
    ) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let user = if user.trim().is_empty() { UNKNOWN_USER } else { user };
        Self {
            id: id.into(),
            user: user.to_string(),
            action: action.into(),
            details: details.into(),
            timestamp: format_timestamp(at),
            severity,
            unread: true,
        }
    }

    /// Seed entry written when no stored log exists yet.
    pub fn system_init<Tz>(at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self {
            unread: false,
            ..Self::new(
                "1",
                SYSTEM_USER,
                "System Init",
                "Application initialized",
                Severity::Info,
                at,
            )
        }
    }
}

pub fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    at.format("%d/%m/%Y, %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn blank_user_is_recorded_as_unknown() {
        let at = Utc.with_ymd_and_hms(2024, 1, 25, 8, 30, 5).unwrap();
        let entry = ActivityLogEntry::new("7", "  ", "Bar Changed", "M1", Severity::Success, &at);
        assert_eq!(entry.user, UNKNOWN_USER);
        assert_eq!(entry.timestamp, "25/01/2024, 08:30:05");
        assert!(entry.unread);
    }

    #[test]
    fn stored_entries_without_unread_flag_still_load() {
        let raw = r#"[{
            "id": "1",
            "user": "System",
            "action": "System Init",
            "details": "Application initialized",
            "timestamp": "01/01/2024, 00:00:00",
            "type": "info"
        }]"#;
        let entries: Vec<ActivityLogEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].unread);
        assert_eq!(entries[0].severity, Severity::Info);
    }

    #[test]
    fn severity_serializes_under_type_key() {
        let at = Utc.with_ymd_and_hms(2024, 1, 25, 8, 30, 5).unwrap();
        let entry = ActivityLogEntry::system_init(&at);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "info");
        assert_eq!(json["unread"], false);
    }
}
