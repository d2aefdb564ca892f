//! Which view a session may render.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sf_core::{CoreError, Role};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Login,
    Dashboard,
    Machines,
    Gcode,
    Analytics,
    Reports,
    Settings,
    Admin,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Login => "login",
            View::Dashboard => "dashboard",
            View::Machines => "machines",
            View::Gcode => "gcode",
            View::Analytics => "analytics",
            View::Reports => "reports",
            View::Settings => "settings",
            View::Admin => "admin",
        }
    }

    /// Lenient lookup: anything unrecognised lands on the dashboard.
    pub fn from_name(name: &str) -> View {
        name.parse().unwrap_or(View::Dashboard)
    }

    pub fn permits(&self, role: Role) -> bool {
        match self {
            View::Reports => matches!(role, Role::Admin | Role::Manager),
            View::Admin => role == Role::Admin,
            _ => true,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let view = match s.trim().to_ascii_lowercase().as_str() {
            "login" => View::Login,
            "dashboard" => View::Dashboard,
            "machines" => View::Machines,
            "gcode" => View::Gcode,
            "analytics" => View::Analytics,
            "reports" => View::Reports,
            "settings" => View::Settings,
            "admin" => View::Admin,
            _ => return Err(CoreError::UnknownVariant { kind: "view", value: s.to_string() }),
        };
        Ok(view)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Render(View),
    /// Render the fixed access-denied placeholder instead of `view`.
    Denied { view: View, role: Role },
    Login,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Render(_))
    }
}

pub fn resolve(requested: View, role: Option<Role>) -> AccessDecision {
    let Some(role) = role else {
        return AccessDecision::Login;
    };
    if requested == View::Login || requested.permits(role) {
        AccessDecision::Render(requested)
    } else {
        AccessDecision::Denied { view: requested, role }
    }
}

/// Sidebar entries for `role`, in menu order.
pub fn navigation(role: Role) -> Vec<View> {
    [
        View::Machines,
        View::Dashboard,
        View::Gcode,
        View::Reports,
        View::Analytics,
        View::Admin,
        View::Settings,
    ]
    .into_iter()
    .filter(|view| view.permits(role))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn anonymous_sessions_always_go_to_login() {
        for name in ["dashboard", "reports", "admin", "nowhere"] {
            assert_eq!(resolve(View::from_name(name), None), AccessDecision::Login);
        }
    }

    #[test]
    fn reports_are_for_admins_and_managers() {
        assert!(resolve(View::Reports, Some(Role::Admin)).is_allowed());
        assert!(resolve(View::Reports, Some(Role::Manager)).is_allowed());
        assert_eq!(
            resolve(View::Reports, Some(Role::Operator)),
            AccessDecision::Denied { view: View::Reports, role: Role::Operator }
        );
        assert!(!resolve(View::Reports, Some(Role::Qa)).is_allowed());
    }

    #[test]
    fn admin_view_is_admin_only() {
        assert!(resolve(View::Admin, Some(Role::Admin)).is_allowed());
        for role in [Role::Manager, Role::Operator, Role::Qa] {
            assert!(!resolve(View::Admin, Some(role)).is_allowed());
        }
    }

    #[test]
    fn everything_else_is_open_to_any_role() {
        let open = [View::Dashboard, View::Machines, View::Gcode, View::Analytics, View::Settings];
        for role in Role::ALL {
            for view in open {
                assert_eq!(resolve(view, Some(role)), AccessDecision::Render(view));
            }
        }
    }

    #[test]
    fn unknown_names_fall_back_to_dashboard() {
        assert_eq!(View::from_name("Reports"), View::Reports);
        assert_eq!(View::from_name("calendar"), View::Dashboard);
    }

    #[test]
    fn menu_hides_what_the_role_cannot_open() {
        assert_eq!(navigation(Role::Operator), vec![
            View::Machines,
            View::Dashboard,
            View::Gcode,
            View::Analytics,
            View::Settings,
        ]);
        assert_eq!(navigation(Role::Admin).len(), 7);
        assert!(navigation(Role::Manager).contains(&View::Reports));
        assert!(!navigation(Role::Manager).contains(&View::Admin));
    }
}
