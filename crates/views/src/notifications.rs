//! The notification bell: a snapshot of the activity log that follows the
//! store's change events.

use sf_core::ActivityLogEntry;
use sf_stores::{LogEvent, LogStore};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::debug;

/// Entries revealed per "show more" step.
pub const NOTIFICATION_PAGE: usize = 5;

pub struct NotificationFeed {
    store: LogStore,
    events: broadcast::Receiver<LogEvent>,
    entries: Vec<ActivityLogEntry>,
}

impl NotificationFeed {
    pub fn new(store: LogStore) -> Self {
        let events = store.subscribe();
        let entries = store.read_all();
        Self { store, events, entries }
    }

    pub fn entries(&self) -> &[ActivityLogEntry] {
        &self.entries
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|e| e.unread).count()
    }

    pub fn has_unread(&self) -> bool {
        self.entries.iter().any(|e| e.unread)
    }

    /// The first `pages` pages of entries, newest first.
    pub fn visible(&self, pages: usize) -> &[ActivityLogEntry] {
        let shown = pages.max(1).saturating_mul(NOTIFICATION_PAGE);
        &self.entries[..shown.min(self.entries.len())]
    }

    /// Opening the bell marks everything read, but only if something was unread.
    pub fn open(&mut self) {
        if self.has_unread() {
            self.store.mark_all_read();
        }
        self.refresh();
    }

    /// Drain pending change events without waiting. Returns whether the
    /// snapshot was refreshed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => changed = true,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        if changed {
            self.refresh();
        }
        changed
    }

    /// Wait for the next change and refresh.
    pub async fn changed(&mut self) -> LogEvent {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    self.refresh();
                    return event;
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "notification feed lagged, resyncing");
                    self.refresh();
                }
                // `self.store` owns the sender, so the channel outlives the feed.
                Err(RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    }

    fn refresh(&mut self) {
        self.entries = self.store.read_all();
    }
}
