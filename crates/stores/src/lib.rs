//! Process-local stores: the bounded activity log and the mock user directory.

pub mod auth;
pub mod log;
pub mod storage;

pub use auth::{AuthError, AuthStore, CredentialStore};
pub use log::{LogEvent, LogStore, DEFAULT_LOG_CAPACITY};
pub use storage::{JsonFileStorage, LogStorage, MemoryStorage, StorageError};

/// Short opaque id in the style the dashboard shows.
pub fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(9);
    id
}
