//! Runtime bootstrap: tracing, configuration, shared application state and
//! the timers that drive it.

use tracing::Level;

pub mod app;
pub mod config;
pub mod metrics;
pub mod scheduler;

pub use app::{AppError, AppState};
pub use config::DashboardConfig;
pub use scheduler::{spawn_telemetry, watch_card, CardWatch, TickerHandle};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .try_init();
}
