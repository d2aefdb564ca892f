//! Recurring work: the telemetry tick and the per-card refresh timers.
//!
//! Each timer lives in its own task and is aborted when its handle drops, so
//! a card's timers stop exactly when the card is no longer shown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sf_core::MachineId;
use sf_stores::LogEvent;
use sf_views::CardDisplay;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::app::AppState;

/// Keeps the telemetry tick (and the activity meter) alive until dropped.
pub struct TickerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Tick every `telemetry_period_ms`, first tick one period from now.
pub fn spawn_telemetry(state: Arc<AppState>) -> TickerHandle {
    let period = state.config().telemetry_period();
    info!(period_ms = period.as_millis() as u64, "telemetry ticker started");

    let tick_state = state.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let report = tick_state.tick(Utc::now());
            if !report.depleted.is_empty() {
                debug!(depleted = report.depleted.len(), "tick emptied bars");
            }
        }
    });

    let mut events = state.log().subscribe();
    let metrics = state.metrics().clone();
    let meter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(LogEvent::Appended(_)) => metrics.inc_log_appends(1),
                Ok(LogEvent::MarkedRead) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "activity meter lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    TickerHandle { tasks: vec![ticker, meter] }
}

/// A visible machine card. Holds the latest rendering; `None` once the
/// machine is gone.
pub struct CardWatch {
    machine_id: MachineId,
    rx: watch::Receiver<Option<CardDisplay>>,
    tasks: Vec<JoinHandle<()>>,
}

impl CardWatch {
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn latest(&self) -> Option<CardDisplay> {
        self.rx.borrow().clone()
    }

    /// Wait for the next refresh from either cadence.
    pub async fn changed(&mut self) -> Option<CardDisplay> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

impl Drop for CardWatch {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        debug!(machine_id = %self.machine_id, "card timers cancelled");
    }
}

/// Start both refresh cadences for one card: the full rendering every
/// `countdown_refresh_ms` and the part timer every `part_timer_refresh_ms`.
/// Both stop once the machine is deleted.
pub fn watch_card(state: Arc<AppState>, machine_id: &str) -> CardWatch {
    let initial = state.card(machine_id, Utc::now());
    let (tx, rx) = watch::channel(initial);
    let tx = Arc::new(tx);

    let countdown = spawn_countdown(state.clone(), machine_id.to_string(), tx.clone());
    let part_timer = spawn_part_timer(state, machine_id.to_string(), tx);

    CardWatch { machine_id: machine_id.to_string(), rx, tasks: vec![countdown, part_timer] }
}

type CardSender = Arc<watch::Sender<Option<CardDisplay>>>;

fn refresh_interval(period: Duration) -> time::Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

fn spawn_countdown(state: Arc<AppState>, machine_id: MachineId, tx: CardSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = refresh_interval(state.config().countdown_refresh());
        loop {
            interval.tick().await;
            let Some(display) = state.card(&machine_id, Utc::now()) else {
                tx.send_replace(None);
                debug!(%machine_id, "machine gone, countdown stopped");
                break;
            };
            state.metrics().inc_card_refreshes(1);
            if tx.send(Some(display)).is_err() {
                break;
            }
        }
    })
}

fn spawn_part_timer(state: Arc<AppState>, machine_id: MachineId, tx: CardSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = refresh_interval(state.config().part_timer_refresh());
        loop {
            interval.tick().await;
            let Some(timer) = state.part_timer(&machine_id, Utc::now()) else {
                tx.send_replace(None);
                break;
            };
            state.metrics().inc_part_timer_refreshes(1);
            tx.send_modify(|card| {
                if let Some(card) = card {
                    card.part_timer = timer.to_string();
                }
            });
            if tx.is_closed() {
                break;
            }
        }
    })
}
