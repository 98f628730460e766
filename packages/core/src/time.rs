//! Clock Tick Source and App Visibility Flag
//!
//! Two tiny external-world signals the core consumes:
//!
//! - [`MinuteClock`] emits the current time at minute granularity. The
//!   recurrence engine is its only consumer. Tests drive it manually with
//!   [`MinuteClock::tick`]; production code spawns the real ticker.
//! - [`AppVisibility`] is a boolean flag the UI shell flips as the app
//!   gains and loses foreground; it gates whether a due recurrence may
//!   trigger a network refresh.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Wall-clock notification source at minute granularity.
#[derive(Clone)]
pub struct MinuteClock {
    tx: Arc<watch::Sender<DateTime<Utc>>>,
}

impl MinuteClock {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Utc::now());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<DateTime<Utc>> {
        self.tx.subscribe()
    }

    /// Manually emits a tick. Production code uses
    /// [`MinuteClock::spawn_ticker`]; tests drive time with this.
    pub fn tick(&self, now: DateTime<Utc>) {
        self.tx.send_replace(now);
    }

    /// Spawns the real once-a-minute ticker.
    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let tx = Arc::clone(&self.tx);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                tx.send_replace(Utc::now());
            }
        })
    }
}

impl Default for MinuteClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the app is currently visible/foregrounded.
#[derive(Clone)]
pub struct AppVisibility {
    tx: Arc<watch::Sender<bool>>,
}

impl AppVisibility {
    pub fn new(initially_visible: bool) -> Self {
        let (tx, _) = watch::channel(initially_visible);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn set(&self, visible: bool) {
        self.tx.send_replace(visible);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
