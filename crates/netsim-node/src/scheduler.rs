//! Scheduler — runs every node and link layer as its own task.
//!
//! Each scheduling unit performs one bounded, non-blocking quantum of work
//! per tick. The loop selects between the shutdown broadcast and the tick
//! timer, so a stop request is honoured within one quantum plus one tick.
//! Shared state lives only in the interface queues.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Lower bound on the tick period. `tokio::time::interval` rejects zero.
const MIN_TICK: Duration = Duration::from_micros(100);

/// A unit of work driven by the scheduler.
///
/// `quantum` must not block: it drains what is available right now and
/// returns.
pub trait Quantum: Send + Sync + 'static {
    fn name(&self) -> String;
    fn quantum(&self);
}

pub struct Scheduler {
    tick: Duration,
    shutdown: broadcast::Sender<()>,
    units: Vec<(String, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new(tick: Duration) -> Self {
        let (shutdown, _) = broadcast::channel::<()>(1);
        Self {
            tick: tick.max(MIN_TICK),
            shutdown,
            units: Vec::new(),
        }
    }

    /// Start running `unit` on its own task.
    pub fn spawn(&mut self, unit: Arc<dyn Quantum>) {
        let name = unit.name();
        let shutdown = self.shutdown.subscribe();
        tracing::debug!(unit = %name, "starting");
        let handle = tokio::spawn(run_unit(unit, self.tick, shutdown));
        self.units.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Signal every unit to stop after its current quantum. Idempotent.
    pub fn stop(&self) {
        // No receivers just means every unit already exited.
        let _ = self.shutdown.send(());
    }

    /// Wait for every unit to exit. Returns once all tasks have finished.
    pub async fn join(self) {
        for (name, handle) in self.units {
            if let Err(e) = handle.await {
                tracing::warn!(unit = %name, error = %e, "unit task failed");
            }
        }
    }

    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}

async fn run_unit(unit: Arc<dyn Quantum>, tick: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                tracing::debug!(unit = %unit.name(), "stopping");
                return;
            }

            _ = interval.tick() => {
                unit.quantum();
            }
        }
    }
}
