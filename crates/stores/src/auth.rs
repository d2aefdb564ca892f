//! Mock user directory and the single current session.

use std::sync::Arc;

use parking_lot::Mutex;
use sf_core::{CoreError, NewUser, Role, UserAccount, UserId, UserProfile};
use tracing::info;

use crate::short_id;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("no user with id `{0}`")]
    UnknownUser(UserId),
    #[error("username `{0}` is already taken")]
    DuplicateUsername(String),
    #[error("admin account `{0}` cannot be deleted")]
    ProtectedAccount(String),
    #[error(transparent)]
    Invalid(#[from] CoreError),
}

/// Opaque credential check: a profile for a valid pair, `None` otherwise.
pub trait CredentialStore: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> Option<UserProfile>;
}

#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<Mutex<AuthState>>,
}

struct AuthState {
    users: Vec<UserAccount>,
    session: Option<UserProfile>,
}

impl AuthStore {
    pub fn new(users: Vec<UserAccount>) -> Self {
        Self { inner: Arc::new(Mutex::new(AuthState { users, session: None })) }
    }

    /// The four accounts every fresh installation starts with.
    pub fn seeded() -> Self {
        let seed = |id: &str, username: &str, name: &str, role: Role, login: &str, ip: &str| {
            UserAccount {
                id: id.to_string(),
                username: username.to_string(),
                name: name.to_string(),
                role,
                password: "1234".to_string(),
                last_login: login.to_string(),
                ip_address: ip.to_string(),
            }
        };
        Self::new(vec![
            seed("1", "admin", "System Admin", Role::Admin, "Today at 08:30", "192.168.1.10"),
            seed(
                "2",
                "manager",
                "Production Manager",
                Role::Manager,
                "Yesterday at 17:45",
                "192.168.1.15",
            ),
            seed("3", "op1", "John Operator", Role::Operator, "Today at 07:00", "10.0.0.42"),
            seed("4", "qa1", "Sarah QA", Role::Qa, "Today at 09:15", "10.0.0.55"),
        ])
    }

    /// Check credentials; on success stamp `last_login` and open the session.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<UserProfile> {
        let mut state = self.inner.lock();
        let account = state
            .users
            .iter_mut()
            .find(|u| u.username == username && u.password == password)?;
        account.last_login = "Just now".to_string();
        let profile = UserProfile::from(&*account);
        state.session = Some(profile.clone());
        info!(username = %profile.username, role = %profile.role, "session opened");
        Some(profile)
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.lock().session.clone()
    }

    pub fn logout(&self) -> Option<UserProfile> {
        self.inner.lock().session.take()
    }

    pub fn users(&self) -> Vec<UserProfile> {
        self.inner.lock().users.iter().map(UserProfile::from).collect()
    }

    pub fn add_user(&self, new_user: NewUser) -> Result<UserProfile, AuthError> {
        new_user.validate()?;
        let mut state = self.inner.lock();
        if state.users.iter().any(|u| u.username == new_user.username) {
            return Err(AuthError::DuplicateUsername(new_user.username));
        }
        let account = UserAccount {
            id: short_id(),
            username: new_user.username,
            name: new_user.name,
            role: new_user.role,
            password: new_user.password,
            last_login: "Never".to_string(),
            ip_address: "Pending...".to_string(),
        };
        let profile = UserProfile::from(&account);
        let mut users = state.users.clone();
        users.push(account);
        state.users = users;
        Ok(profile)
    }

    /// Admin accounts are protected, which keeps at least one admin around.
    pub fn delete_user(&self, id: &str) -> Result<UserProfile, AuthError> {
        let mut state = self.inner.lock();
        let account = state
            .users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| AuthError::UnknownUser(id.to_string()))?;
        if account.role == Role::Admin {
            return Err(AuthError::ProtectedAccount(account.username.clone()));
        }
        let removed = UserProfile::from(account);
        let users = state.users.iter().filter(|u| u.id != id).cloned().collect();
        state.users = users;
        Ok(removed)
    }
}

impl CredentialStore for AuthStore {
    fn authenticate(&self, username: &str, password: &str) -> Option<UserProfile> {
        AuthStore::authenticate(self, username, password)
    }
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_credentials_open_a_session() {
        let auth = AuthStore::seeded();
        assert!(auth.current_user().is_none());
        let user = auth.authenticate("manager", "1234").unwrap();
        assert_eq!(user.role, Role::Manager);
        assert_eq!(user.last_login, "Just now");
        assert_eq!(auth.current_user().unwrap().username, "manager");
        assert_eq!(auth.logout().unwrap().username, "manager");
        assert!(auth.current_user().is_none());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let auth = AuthStore::seeded();
        assert!(auth.authenticate("admin", "nope").is_none());
        assert!(auth.authenticate("ghost", "1234").is_none());
        assert!(auth.current_user().is_none());
    }

    #[test]
    fn added_users_can_log_in() {
        let auth = AuthStore::seeded();
        let created = auth
            .add_user(NewUser {
                username: "op2".into(),
                name: "Second Operator".into(),
                role: Role::Operator,
                password: "pw".into(),
            })
            .unwrap();
        assert_eq!(created.last_login, "Never");
        assert_eq!(created.ip_address, "Pending...");
        assert_eq!(auth.users().len(), 5);
        assert!(auth.authenticate("op2", "pw").is_some());
    }

    #[test]
    fn usernames_are_unique() {
        let auth = AuthStore::seeded();
        let err = auth
            .add_user(NewUser {
                username: "op1".into(),
                name: "Clone".into(),
                role: Role::Operator,
                password: "pw".into(),
            })
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername(name) if name == "op1"));
    }

    #[test]
    fn usable_as_an_opaque_credential_store() {
        let store: Box<dyn CredentialStore> = Box::new(AuthStore::seeded());
        assert_eq!(store.authenticate("qa1", "1234").unwrap().role, Role::Qa);
        assert!(store.authenticate("qa1", "4321").is_none());
    }

    #[test]
    fn admins_cannot_be_deleted() {
        let auth = AuthStore::seeded();
        assert!(matches!(auth.delete_user("1"), Err(AuthError::ProtectedAccount(_))));
        assert!(matches!(auth.delete_user("99"), Err(AuthError::UnknownUser(_))));
        assert_eq!(auth.delete_user("3").unwrap().username, "op1");
        assert_eq!(auth.users().len(), 3);
    }
}
