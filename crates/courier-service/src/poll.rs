//! Poll loop.
//!
//! A single `POLLING` state that runs a full cycle on every tick until told
//! to stop. The ticker is injected so the loop can be driven without waiting
//! on wall-clock time. Shutdown is only observed between cycles; a cycle in
//! flight always runs to completion.

use async_trait::async_trait;
use courier_core::report::CycleReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::cycle::CycleRunner;

#[async_trait]
pub trait Ticker: Send {
    /// Waits for the next tick. `None` means the ticker is exhausted.
    async fn tick(&mut self) -> Option<()>;
}

/// Fixed wall-clock interval. The first tick fires immediately.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> Option<()> {
        self.interval.tick().await;
        Some(())
    }
}

/// Handle returned to the caller so it can stop the loop.
pub struct PollLoopHandle {
    /// Send `true` to stop after the current cycle.
    pub shutdown_tx: watch::Sender<bool>,
}

impl PollLoopHandle {
    pub fn shutdown(&self) {
        self.shutdown_tx.send(true).ok();
    }
}

/// Spawn the poll loop as a tokio task.
///
/// `on_report` is called after every cycle with its `CycleReport`.
pub fn spawn_poll_loop<R, T, F>(
    runner: Arc<R>,
    mut ticker: T,
    on_report: F,
) -> (tokio::task::JoinHandle<()>, PollLoopHandle)
where
    R: CycleRunner,
    T: Ticker + 'static,
    F: Fn(CycleReport) + Send + Sync + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!("poll loop started");
        loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("poll loop shutting down");
                        return;
                    }
                    continue;
                }
                tick = ticker.tick() => {
                    if tick.is_none() {
                        debug!("ticker exhausted");
                        return;
                    }
                }
            }

            let runner = runner.clone();
            match tokio::task::spawn_blocking(move || runner.run_cycle()).await {
                Ok(report) => on_report(report),
                Err(err) => error!(error = %err, "cycle task panicked"),
            }
            debug!("sleeping until next tick");
        }
    });

    (handle, PollLoopHandle { shutdown_tx })
}
