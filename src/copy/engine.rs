use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::progress::{ProgressReporter, ProgressTracker};
use super::{CopyCommand, CopySettings};
use crate::humanize::format_elapsed;
use crate::invoice::Invoice;
use crate::storage::{BucketError, ObjectStoreClient};

/// Terminal outcome of one copy batch
pub type BatchResult = Result<CopySummary, BucketError>;

/// A document that reached its destination key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReceipt {
    pub source_key: String,
    pub destination_key: String,
}

#[derive(Debug, Clone)]
pub struct CopySummary {
    pub destination_bucket: String,
    /// In completion order
    pub receipts: Vec<CopyReceipt>,
    pub elapsed: Duration,
}

type Outcome = Result<CopyReceipt, BucketError>;

/// Copies invoice documents with a hard ceiling on in-flight store calls
pub struct CopyEngine {
    store: Arc<dyn ObjectStoreClient>,
    settings: CopySettings,
}

impl CopyEngine {
    pub fn new(store: Arc<dyn ObjectStoreClient>, settings: CopySettings) -> Self {
        let settings = CopySettings {
            concurrency: settings.concurrency.max(1),
            ..settings
        };
        Self { store, settings }
    }

    /// Create the destination bucket and copy every invoice document into it.
    ///
    /// A bucket creation failure is returned as-is before any copy starts.
    /// Copy failures never stop the batch; they are returned together as
    /// [`BucketError::Aggregate`] once every command has completed.
    pub async fn copy_all(
        &self,
        source_bucket: &str,
        destination_bucket: &str,
        invoices: &[Invoice],
    ) -> BatchResult {
        let tracker = Arc::new(ProgressTracker::new(invoices.len()));
        self.copy_all_tracked(source_bucket, destination_bucket, invoices, tracker)
            .await
    }

    /// Same as [`copy_all`](Self::copy_all) with a caller-owned tracker
    pub async fn copy_all_tracked(
        &self,
        source_bucket: &str,
        destination_bucket: &str,
        invoices: &[Invoice],
        tracker: Arc<ProgressTracker>,
    ) -> BatchResult {
        self.store.create_bucket(destination_bucket).await?;

        let commands: Vec<CopyCommand> = invoices
            .iter()
            .map(|invoice| CopyCommand::for_invoice(source_bucket, destination_bucket, invoice))
            .collect();

        info!(
            source_bucket,
            destination_bucket,
            commands = commands.len(),
            concurrency = self.settings.concurrency,
            "Starting copy"
        );

        let reporter = ProgressReporter::spawn(tracker.clone(), self.settings.progress_interval);
        let started = Instant::now();

        let outcomes = self.dispatch(destination_bucket, commands, &tracker).await;

        let elapsed = started.elapsed();
        let last = reporter.stop().await;
        if !last.is_complete() {
            warn!(
                current = last.current,
                total = last.total,
                "Copy finished before the tracker reached its total"
            );
        }
        info!(elapsed = %format_elapsed(elapsed), "Copy duration");

        fold_outcomes(destination_bucket, outcomes, elapsed)
    }

    /// Run every command, at most `concurrency` at a time, and collect the
    /// outcomes in completion order
    async fn dispatch(
        &self,
        destination_bucket: &str,
        commands: Vec<CopyCommand>,
        tracker: &Arc<ProgressTracker>,
    ) -> Vec<Outcome> {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let mut workers = JoinSet::new();
        let mut keys = HashMap::with_capacity(commands.len());
        let mut outcomes = Vec::with_capacity(commands.len());

        for command in commands {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                tracker.record_failure();
                outcomes.push(Err(BucketError::copy_failure(
                    destination_bucket,
                    command.destination_key,
                    "copy pool closed",
                )));
                continue;
            };

            let destination_key = command.destination_key.clone();
            let store = self.store.clone();
            let tracker = tracker.clone();

            let handle = workers.spawn(async move {
                let _permit = permit;
                run_command(store.as_ref(), command, &tracker).await
            });
            keys.insert(handle.id(), destination_key);
        }

        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((_, outcome)) => outcomes.push(outcome),
                Err(e) => {
                    // The worker died before it could record its own outcome
                    tracker.record_failure();
                    let key = keys.remove(&e.id()).unwrap_or_default();
                    warn!(destination_key = %key, error = %e, "Copy task aborted");
                    outcomes.push(Err(BucketError::copy_failure(
                        destination_bucket,
                        key,
                        format!("copy task aborted: {}", e),
                    )));
                }
            }
        }

        outcomes
    }
}

async fn run_command(
    store: &dyn ObjectStoreClient,
    command: CopyCommand,
    tracker: &ProgressTracker,
) -> Outcome {
    let result = store
        .copy_object(
            &command.source_bucket,
            &command.source_key,
            &command.destination_bucket,
            &command.destination_key,
        )
        .await;

    match result {
        Ok(()) => {
            tracker.record_success();
            debug!(
                source_key = %command.source_key,
                destination_key = %command.destination_key,
                "Copied"
            );
            Ok(CopyReceipt {
                source_key: command.source_key,
                destination_key: command.destination_key,
            })
        }
        Err(e) => {
            tracker.record_failure();
            warn!(destination_key = %command.destination_key, error = %e, "Copy failed");
            Err(e)
        }
    }
}

fn fold_outcomes(destination_bucket: &str, outcomes: Vec<Outcome>, elapsed: Duration) -> BatchResult {
    let (receipts, failures) = outcomes.into_iter().fold(
        (Vec::new(), Vec::new()),
        |(mut receipts, mut failures), outcome| {
            match outcome {
                Ok(receipt) => receipts.push(receipt),
                Err(e) => failures.push(e),
            }
            (receipts, failures)
        },
    );

    if failures.is_empty() {
        Ok(CopySummary {
            destination_bucket: destination_bucket.to_string(),
            receipts,
            elapsed,
        })
    } else {
        Err(BucketError::Aggregate {
            bucket: destination_bucket.to_string(),
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Result as StoreResult;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Store fake counting calls and in-flight copies
    #[derive(Default)]
    struct RecordingStore {
        create_error: Option<BucketError>,
        failing_sources: HashSet<String>,
        panicking_sources: HashSet<String>,
        copy_delay: Duration,
        created: Mutex<Vec<String>>,
        copies: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStoreClient for RecordingStore {
        async fn bucket_exists(&self, _bucket: &str) -> StoreResult<()> {
            Ok(())
        }

        async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
            if let Some(e) = &self.create_error {
                return Err(e.clone());
            }
            self.created.lock().unwrap().push(bucket.to_string());
            Ok(())
        }

        async fn copy_object(
            &self,
            _source_bucket: &str,
            source_key: &str,
            destination_bucket: &str,
            destination_key: &str,
        ) -> StoreResult<()> {
            self.copies.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.copy_delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panicking_sources.contains(source_key) {
                panic!("store exploded");
            }
            if self.failing_sources.contains(source_key) {
                return Err(BucketError::copy_failure(destination_bucket, destination_key, "injected"));
            }
            Ok(())
        }

        async fn empty_and_delete_bucket(&self, _bucket: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    fn invoices(count: usize) -> Vec<Invoice> {
        (0..count)
            .map(|i| {
                Invoice::builder()
                    .client_name("bistrot")
                    .restaurant_name("zinc")
                    .supplier_name("metro")
                    .reference(format!("R{}", i))
                    .document_id(Uuid::new_v4())
                    .total_price_incl(i as f64 + 0.5)
                    .original_file_name("invoice.pdf")
                    .build()
            })
            .collect()
    }

    fn engine(store: Arc<RecordingStore>, concurrency: usize) -> CopyEngine {
        CopyEngine::new(
            store,
            CopySettings {
                concurrency,
                progress_interval: Duration::from_millis(5),
            },
        )
    }

    #[tokio::test]
    async fn test_every_invoice_is_copied_once() {
        for count in [0, 1, 37] {
            let store = Arc::new(RecordingStore::default());
            let tracker = Arc::new(ProgressTracker::new(count));

            let summary = engine(store.clone(), 8)
                .copy_all_tracked("documents", "client", &invoices(count), tracker.clone())
                .await
                .unwrap();

            assert_eq!(store.copies.load(Ordering::SeqCst), count);
            assert_eq!(summary.receipts.len(), count);
            assert_eq!(tracker.snapshot().current, count);
            assert_eq!(tracker.snapshot().failures, 0);
        }
    }

    #[tokio::test]
    async fn test_empty_batch_still_creates_bucket() {
        let store = Arc::new(RecordingStore::default());

        let summary = engine(store.clone(), 4)
            .copy_all("documents", "client", &[])
            .await
            .unwrap();

        assert!(summary.receipts.is_empty());
        assert_eq!(*store.created.lock().unwrap(), vec!["client".to_string()]);
    }

    #[tokio::test]
    async fn test_failures_accumulate_without_stopping_batch() {
        let batch = invoices(20);
        let failing: HashSet<String> = batch.iter().step_by(3).map(Invoice::source_key).collect();
        let store = Arc::new(RecordingStore {
            failing_sources: failing.clone(),
            ..Default::default()
        });
        let tracker = Arc::new(ProgressTracker::new(batch.len()));

        let result = engine(store.clone(), 3)
            .copy_all_tracked("documents", "client", &batch, tracker.clone())
            .await;

        let Err(BucketError::Aggregate { bucket, failures }) = result else {
            panic!("expected aggregate failure");
        };
        assert_eq!(bucket, "client");
        assert_eq!(failures.len(), failing.len());
        assert!(failures.iter().all(|f| matches!(f, BucketError::CopyFailure { .. })));
        assert_eq!(store.copies.load(Ordering::SeqCst), 20);
        assert_eq!(tracker.snapshot().current, 20);
        assert_eq!(tracker.snapshot().failures, failing.len());
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_respected() {
        let store = Arc::new(RecordingStore {
            copy_delay: Duration::from_millis(5),
            ..Default::default()
        });

        engine(store.clone(), 4)
            .copy_all("documents", "client", &invoices(50))
            .await
            .unwrap();

        let max = store.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 4, "max in flight was {}", max);
        assert!(max >= 2, "copies never overlapped");
    }

    #[tokio::test]
    async fn test_bucket_creation_failure_aborts_before_dispatch() {
        let store = Arc::new(RecordingStore {
            create_error: Some(BucketError::access_forbidden("client")),
            ..Default::default()
        });
        let tracker = Arc::new(ProgressTracker::new(5));

        let result = engine(store.clone(), 4)
            .copy_all_tracked("documents", "client", &invoices(5), tracker.clone())
            .await;

        assert_eq!(result.unwrap_err(), BucketError::access_forbidden("client"));
        assert_eq!(store.copies.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.snapshot().current, 0);
    }

    #[tokio::test]
    async fn test_panicking_copy_is_reported_as_failure() {
        let batch = invoices(4);
        let store = Arc::new(RecordingStore {
            panicking_sources: [batch[1].source_key()].into_iter().collect(),
            ..Default::default()
        });
        let tracker = Arc::new(ProgressTracker::new(batch.len()));

        let result = engine(store.clone(), 2)
            .copy_all_tracked("documents", "client", &batch, tracker.clone())
            .await;

        let Err(BucketError::Aggregate { failures, .. }) = result else {
            panic!("expected aggregate failure");
        };
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            &failures[0],
            BucketError::CopyFailure { key, .. } if *key == crate::invoice::destination_key(&batch[1])
        ));
        assert_eq!(tracker.snapshot().current, 4);
        assert_eq!(tracker.snapshot().failures, 1);
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped() {
        let store = Arc::new(RecordingStore {
            copy_delay: Duration::from_millis(2),
            ..Default::default()
        });

        let summary = engine(store.clone(), 0)
            .copy_all("documents", "client", &invoices(6))
            .await
            .unwrap();

        assert_eq!(summary.receipts.len(), 6);
        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
