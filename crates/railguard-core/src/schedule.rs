//! Periodic background tasks with explicit stop handles.
//!
//! Each timer-driven process (train simulation, city state machine, unit
//! simulator, snapshot broadcaster) implements [`Periodic`] and is launched
//! with [`spawn_periodic`]. The returned [`TaskHandle`] stops the loop
//! cleanly; dropping the handle stops it as well.
//!
//! The first tick fires one full period after spawn. When a tick overruns,
//! the next one is delayed rather than fired in a burst.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// A unit of work run once per period.
pub trait Periodic: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run one tick. Must not fail; problems are logged and the loop goes on.
    fn tick(&mut self) -> impl Future<Output = ()> + Send;
}

/// Handle to a running periodic task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Name of the task.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the task loop has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signal the loop to exit and wait for it.
    ///
    /// A tick already in progress runs to completion first.
    pub async fn stop(self) {
        // An error only means the loop already exited.
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.join.await {
            warn!(task = self.name, error = %e, "periodic task ended abnormally");
        }
    }
}

/// Spawn `task` on the Tokio runtime, ticking every `period`.
pub fn spawn_periodic<P: Periodic>(mut task: P, period: Duration) -> TaskHandle {
    let name = task.name();
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            task = name,
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "periodic task started"
        );

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    // Err: every handle is gone, nobody can stop us later.
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => task.tick().await,
            }
        }

        debug!(task = name, "periodic task stopped");
    });

    TaskHandle {
        name,
        stop_tx,
        join,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct Counter(Arc<AtomicU32>);

    impl Periodic for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn tick(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let count = Arc::new(AtomicU32::new(0));
        let handle = spawn_periodic(Counter(Arc::clone(&count)), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(3_600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop() {
        let count = Arc::new(AtomicU32::new(0));
        let handle = spawn_periodic(Counter(Arc::clone(&count)), Duration::from_millis(100));
        assert_eq!(handle.name(), "counter");

        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.stop().await;
        let after_stop = count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_loop() {
        let count = Arc::new(AtomicU32::new(0));
        let handle = spawn_periodic(Counter(Arc::clone(&count)), Duration::from_millis(100));
        drop(handle);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
