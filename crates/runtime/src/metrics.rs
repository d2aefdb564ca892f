use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    telemetry_ticks: AtomicU64,
    parts_produced: AtomicU64,
    depletions: AtomicU64,
    heartbeat_losses: AtomicU64,
    log_appends: AtomicU64,
    card_refreshes: AtomicU64,
    part_timer_refreshes: AtomicU64,
    slowest_tick_us: AtomicU64,
}

impl MetricsRegistry {
    pub fn inc_telemetry_ticks(&self, delta: u64) {
        self.inner.telemetry_ticks.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_parts_produced(&self, delta: u64) {
        self.inner.parts_produced.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_depletions(&self, delta: u64) {
        self.inner.depletions.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_heartbeat_losses(&self, delta: u64) {
        self.inner.heartbeat_losses.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_log_appends(&self, delta: u64) {
        self.inner.log_appends.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_card_refreshes(&self, delta: u64) {
        self.inner.card_refreshes.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_part_timer_refreshes(&self, delta: u64) {
        self.inner.part_timer_refreshes.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn record_tick_duration(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.inner.slowest_tick_us.fetch_max(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            telemetry_ticks: self.inner.telemetry_ticks.load(Ordering::Relaxed),
            parts_produced: self.inner.parts_produced.load(Ordering::Relaxed),
            depletions: self.inner.depletions.load(Ordering::Relaxed),
            heartbeat_losses: self.inner.heartbeat_losses.load(Ordering::Relaxed),
            log_appends: self.inner.log_appends.load(Ordering::Relaxed),
            card_refreshes: self.inner.card_refreshes.load(Ordering::Relaxed),
            part_timer_refreshes: self.inner.part_timer_refreshes.load(Ordering::Relaxed),
            slowest_tick_us: self.inner.slowest_tick_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub telemetry_ticks: u64,
    pub parts_produced: u64,
    pub depletions: u64,
    pub heartbeat_losses: u64,
    pub log_appends: u64,
    /// Full card renders on the countdown cadence.
    pub card_refreshes: u64,
    pub part_timer_refreshes: u64,
    pub slowest_tick_us: u64,
}

impl MetricsSnapshot {
    pub fn to_json_line(&self, label: &str, elapsed: Option<Duration>) -> String {
        #[derive(Serialize)]
        struct Line<'a> {
            label: &'a str,
            #[serde(flatten)]
            snapshot: &'a MetricsSnapshot,
            elapsed_ms: Option<u128>,
        }

        let payload = Line { label, snapshot: self, elapsed_ms: elapsed.map(|d| d.as_millis()) };
        serde_json::to_string(&payload).unwrap_or_else(|_| String::from("{}"))
    }
}

pub struct TickTimer {
    start: Instant,
}

impl TickTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
