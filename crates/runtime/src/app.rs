//! Shared application state: one explicitly built value owning the stores,
//! the machine registry and the current view.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use tracing::{info, warn};

use sf_core::timing::PartTimer;
use sf_core::{MachineRecord, NewUser, Role, Severity, UserProfile};
use sf_registry::{MachineRegistry, RegistryError, TickReport};
use sf_stores::{AuthError, AuthStore, JsonFileStorage, LogStore, MemoryStorage};
use sf_telemetry::{SimulatedTelemetry, TelemetrySource};
use sf_views::{
    resolve, AccessDecision, CardDisplay, FleetSummary, MachineCard, NotificationFeed, View,
};

use crate::config::DashboardConfig;
use crate::metrics::{MetricsRegistry, TickTimer};

/// Name recorded for actions taken without a session.
pub const FALLBACK_ACTOR: &str = "Operator";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("role `{0}` may not manage users")]
    Forbidden(Role),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub struct AppState {
    cfg: DashboardConfig,
    auth: AuthStore,
    log: LogStore,
    registry: Arc<Mutex<MachineRegistry>>,
    metrics: MetricsRegistry,
    card: MachineCard,
    view: Mutex<View>,
}

impl AppState {
    /// Build from config with the simulated feed.
    pub fn new(cfg: DashboardConfig) -> Result<Self> {
        let telemetry = match cfg.seed {
            Some(seed) => SimulatedTelemetry::seeded(cfg.simulated(), seed),
            None => SimulatedTelemetry::new(cfg.simulated()),
        };
        Self::with_telemetry(cfg, Box::new(telemetry))
    }

    pub fn with_telemetry(
        cfg: DashboardConfig,
        telemetry: Box<dyn TelemetrySource>,
    ) -> Result<Self> {
        cfg.validate()?;
        let log = match &cfg.log_path {
            Some(path) => LogStore::open(JsonFileStorage::new(path), cfg.log_capacity),
            None => LogStore::open(MemoryStorage::new(), cfg.log_capacity),
        };
        Ok(Self::with_parts(cfg, AuthStore::seeded(), log, telemetry))
    }

    pub fn with_parts(
        cfg: DashboardConfig,
        auth: AuthStore,
        log: LogStore,
        telemetry: Box<dyn TelemetrySource>,
    ) -> Self {
        info!(source = telemetry.name(), log_capacity = log.capacity(), "building app state");
        let registry = MachineRegistry::new(cfg.registry(), telemetry, log.clone());
        Self {
            cfg,
            auth,
            log,
            registry: Arc::new(Mutex::new(registry)),
            metrics: MetricsRegistry::default(),
            card: MachineCard::local(),
            view: Mutex::new(View::Login),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.cfg
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn log(&self) -> &LogStore {
        &self.log
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Guard on the registry. Never hold it across an `.await`.
    pub fn registry(&self) -> MutexGuard<'_, MachineRegistry> {
        self.registry.lock()
    }

    pub fn machines(&self) -> Vec<MachineRecord> {
        self.registry.lock().list()
    }

    pub fn login(&self, username: &str, password: &str) -> Option<UserProfile> {
        let Some(user) = self.auth.authenticate(username, password) else {
            warn!(%username, "login rejected");
            return None;
        };
        self.log.append(&user.name, "User Login", "Successful login", Severity::Info);
        *self.view.lock() = View::Machines;
        Some(user)
    }

    pub fn logout(&self) -> Option<UserProfile> {
        let user = self.auth.logout();
        *self.view.lock() = View::Login;
        if let Some(user) = &user {
            info!(username = %user.username, "session closed");
        }
        user
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.auth.current_user()
    }

    /// Display name stamped on activity entries.
    pub fn actor(&self) -> String {
        self.auth
            .current_user()
            .map(|u| u.name)
            .unwrap_or_else(|| FALLBACK_ACTOR.to_string())
    }

    pub fn current_view(&self) -> View {
        *self.view.lock()
    }

    /// Route to `view`. The current view only changes when the route renders.
    pub fn navigate(&self, view: View) -> AccessDecision {
        let role = self.auth.current_user().map(|u| u.role);
        let decision = resolve(view, role);
        match decision {
            AccessDecision::Render(view) => *self.view.lock() = view,
            AccessDecision::Denied { view, role } => warn!(%view, %role, "access denied"),
            AccessDecision::Login => *self.view.lock() = View::Login,
        }
        decision
    }

    pub fn create_user(&self, new_user: NewUser) -> Result<UserProfile, AppError> {
        let admin = self.require_admin()?;
        let created = self.auth.add_user(new_user)?;
        self.log.append(
            &admin.name,
            "Create User",
            &format!("Created user: {}", created.username),
            Severity::Success,
        );
        Ok(created)
    }

    pub fn delete_user(&self, id: &str) -> Result<UserProfile, AppError> {
        let admin = self.require_admin()?;
        let removed = self.auth.delete_user(id)?;
        self.log.append(
            &admin.name,
            "Delete User",
            &format!("Deleted user ID: {id}"),
            Severity::Warning,
        );
        Ok(removed)
    }

    /// One telemetry tick, metered.
    pub fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let timer = TickTimer::start();
        let report = self.registry.lock().tick(now);
        let elapsed = timer.elapsed();

        self.metrics.inc_telemetry_ticks(1);
        self.metrics.inc_parts_produced(report.parts_produced);
        self.metrics.inc_depletions(report.depleted.len() as u64);
        self.metrics.inc_heartbeat_losses(report.disconnected as u64);
        self.metrics.record_tick_duration(elapsed);
        report
    }

    pub fn card(&self, machine_id: &str, now: DateTime<Utc>) -> Option<CardDisplay> {
        let registry = self.registry.lock();
        registry.get(machine_id).map(|machine| self.card.display(machine, now))
    }

    pub fn part_timer(&self, machine_id: &str, now: DateTime<Utc>) -> Option<PartTimer> {
        let registry = self.registry.lock();
        registry.get(machine_id).map(|machine| self.card.part_timer(machine, now))
    }

    pub fn fleet_summary(&self) -> FleetSummary {
        FleetSummary::from_machines(&self.registry.lock().list())
    }

    pub fn notifications(&self) -> NotificationFeed {
        NotificationFeed::new(self.log.clone())
    }

    fn require_admin(&self) -> Result<UserProfile, AppError> {
        let user = self.auth.current_user().ok_or(AppError::NotSignedIn)?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden(user.role));
        }
        Ok(user)
    }
}
