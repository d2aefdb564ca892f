//! Bounded activity log: newest first, persisted on every change, with a
//! broadcast channel for listeners such as the notification bell.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Local, Utc};
use parking_lot::Mutex;
use sf_core::{ActivityLogEntry, EntryId, Severity};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::storage::{LogStorage, MemoryStorage};

pub const DEFAULT_LOG_CAPACITY: usize = 50;
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Appended(EntryId),
    MarkedRead,
}

/// Cheap to clone; clones share the same list, storage and channel.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<LogInner>,
}

struct LogInner {
    storage: Box<dyn LogStorage>,
    capacity: usize,
    entries: Mutex<Vec<ActivityLogEntry>>,
    seq: AtomicU64,
    events: broadcast::Sender<LogEvent>,
}

impl LogStore {
    /// Load the stored list, seeding (and persisting) a `System Init` entry when
    /// nothing is stored. Unreadable storage falls back to the seed list.
    pub fn open<S: LogStorage + 'static>(storage: S, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let entries = match storage.load() {
            Ok(Some(mut entries)) => {
                entries.truncate(capacity);
                entries
            }
            Ok(None) => {
                let seed = seed_entries();
                if let Err(err) = storage.save(&seed) {
                    error!(%err, "failed to persist seed activity log");
                }
                seed
            }
            Err(err) => {
                warn!(%err, "activity log unreadable, starting from seed");
                seed_entries()
            }
        };
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(LogInner {
                storage: Box::new(storage),
                capacity,
                entries: Mutex::new(entries),
                seq: AtomicU64::new(0),
                events,
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::new(), DEFAULT_LOG_CAPACITY)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Insert at the head, evict past capacity, persist, then notify listeners.
    pub fn append(
        &self,
        user: &str,
        action: &str,
        details: &str,
        severity: Severity,
    ) -> ActivityLogEntry {
        let entry =
            ActivityLogEntry::new(self.next_id(), user, action, details, severity, &Local::now());
        {
            let mut entries = self.inner.entries.lock();
            let mut updated = Vec::with_capacity(self.inner.capacity);
            updated.push(entry.clone());
            updated.extend(entries.iter().take(self.inner.capacity - 1).cloned());
            *entries = updated;
            self.persist(&entries);
        }
        debug!(
            id = %entry.id,
            action = %entry.action,
            severity = %entry.severity,
            "activity appended"
        );
        self.notify(LogEvent::Appended(entry.id.clone()));
        entry
    }

    pub fn read_all(&self) -> Vec<ActivityLogEntry> {
        self.inner.entries.lock().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.entries.lock().iter().filter(|e| e.unread).count()
    }

    pub fn mark_all_read(&self) {
        {
            let mut entries = self.inner.entries.lock();
            let updated: Vec<ActivityLogEntry> = entries
                .iter()
                .cloned()
                .map(|entry| ActivityLogEntry { unread: false, ..entry })
                .collect();
            *entries = updated;
            self.persist(&entries);
        }
        self.notify(LogEvent::MarkedRead);
    }

    /// Events are sent after the store's lock is released, so a listener that
    /// reads the store on receipt never re-enters a half-finished update.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.inner.events.subscribe()
    }

    fn next_id(&self) -> EntryId {
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:06}", Utc::now().timestamp_millis(), seq)
    }

    fn persist(&self, entries: &[ActivityLogEntry]) {
        if let Err(err) = self.inner.storage.save(entries) {
            error!(%err, "failed to persist activity log");
        }
    }

    fn notify(&self, event: LogEvent) {
        // No receivers is fine: nobody is showing the log right now.
        let _ = self.inner.events.send(event);
    }
}

fn seed_entries() -> Vec<ActivityLogEntry> {
    vec![ActivityLogEntry::system_init(&Local::now())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use pretty_assertions::assert_eq;

    struct FailingStorage;

    impl LogStorage for FailingStorage {
        fn load(&self) -> Result<Option<Vec<ActivityLogEntry>>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }

        fn save(&self, _entries: &[ActivityLogEntry]) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
    }

    #[test]
    fn empty_storage_is_seeded_and_persisted() {
        let storage = MemoryStorage::new();
        let store = LogStore::open(storage.clone(), DEFAULT_LOG_CAPACITY);
        let entries = store.read_all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "System Init");
        assert!(!entries[0].unread);
        assert!(storage.raw().is_some());
    }

    #[test]
    fn appending_past_capacity_evicts_oldest() {
        let store = LogStore::in_memory();
        for i in 0..55 {
            store.append("op1", "Tick", &format!("entry {i}"), Severity::Info);
        }
        let entries = store.read_all();
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[0].details, "entry 54");
        assert_eq!(entries[49].details, "entry 5");
        assert!(entries.iter().all(|e| e.action == "Tick"));
        assert!(!entries.iter().any(|e| e.details == "entry 4"));
    }

    #[test]
    fn new_entries_are_unread_until_marked() {
        let store = LogStore::in_memory();
        store.append("op1", "Machine Paused", "M1", Severity::Warning);
        store.append("op1", "Machine Resumed", "M1", Severity::Success);
        assert_eq!(store.unread_count(), 2);
        store.mark_all_read();
        assert_eq!(store.unread_count(), 0);
        assert_eq!(store.read_all().len(), 3);
    }

    #[test]
    fn ids_are_unique_and_ordered() {
        let store = LogStore::in_memory();
        let a = store.append("op1", "A", "", Severity::Info);
        let b = store.append("op1", "B", "", Severity::Info);
        assert_ne!(a.id, b.id);
        let seq = |id: &str| id.rsplit('-').next().unwrap().parse::<u64>().unwrap();
        assert!(seq(&b.id) > seq(&a.id));
    }

    #[test]
    fn unreadable_storage_falls_back_to_seed() {
        let store = LogStore::open(MemoryStorage::with_raw("not json"), DEFAULT_LOG_CAPACITY);
        assert_eq!(store.read_all().len(), 1);
    }

    #[test]
    fn write_failures_do_not_reach_the_caller() {
        let store = LogStore::open(FailingStorage, DEFAULT_LOG_CAPACITY);
        let entry = store.append("op1", "Bar Changed", "M1", Severity::Success);
        assert_eq!(store.read_all()[0], entry);
        store.mark_all_read();
    }

    #[test]
    fn blank_user_is_unknown() {
        let store = LogStore::in_memory();
        let entry = store.append("", "Machine Created", "Pin", Severity::Success);
        assert_eq!(entry.user, "Unknown User");
    }

    #[tokio::test]
    async fn listeners_hear_appends_and_reads() {
        let store = LogStore::in_memory();
        let mut events = store.subscribe();
        let entry = store.append("op1", "Machine Paused", "M1", Severity::Warning);
        store.mark_all_read();
        assert_eq!(events.recv().await.unwrap(), LogEvent::Appended(entry.id));
        assert_eq!(events.recv().await.unwrap(), LogEvent::MarkedRead);
    }
}
