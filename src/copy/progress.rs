//! Copy progress counters and the periodic reporter
//!
//! Workers only increment; the reporter only reads. The reporter samples the
//! latest values on a fixed interval, so it can skip intermediate states
//! under a high completion rate.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Completion counters shared by every copy worker
#[derive(Debug, Default)]
pub struct ProgressTracker {
    current: AtomicUsize,
    failures: AtomicUsize,
    total: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record_success(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::AcqRel);
        self.current.fetch_add(1, Ordering::AcqRel);
    }

    pub fn snapshot(&self) -> Progress {
        Progress {
            current: self.current.load(Ordering::Acquire),
            failures: self.failures.load(Ordering::Acquire),
            total: self.total,
        }
    }
}

/// Point-in-time view of a [`ProgressTracker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Completed attempts, successful or not
    pub current: usize,
    pub failures: usize,
    pub total: usize,
}

impl Progress {
    /// Completion rate with two decimals, e.g. `33.33`
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.current as f64 * 10_000.0 / self.total as f64).round() / 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

/// Background task logging the tracker on an interval
pub struct ProgressReporter {
    tracker: Arc<ProgressTracker>,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Progress>>,
}

impl ProgressReporter {
    pub fn spawn(tracker: Arc<ProgressTracker>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let observed = tracker.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => report(&observed.snapshot()),
                    _ = &mut stop_rx => break,
                }
            }
            let last = observed.snapshot();
            report(&last);
            last
        });

        Self {
            tracker,
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Stop the task and wait until it has logged its final observation,
    /// which is returned
    pub async fn stop(mut self) -> Progress {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(last) => last,
                Err(e) => {
                    tracing::warn!(error = %e, "Progress reporter ended abnormally");
                    self.tracker.snapshot()
                }
            },
            None => self.tracker.snapshot(),
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

fn report(progress: &Progress) {
    tracing::info!(
        current = progress.current,
        failures = progress.failures,
        total = progress.total,
        "{}%",
        progress.percentage()
    );
}
