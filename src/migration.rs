//! Migration of one client's invoice documents into its own bucket
//!
//! A run confirms the shared documents bucket, loads the client's invoices,
//! names the destination bucket after the first invoice and hands the batch
//! to the copy engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info};

use crate::copy::{CopyEngine, CopySettings};
use crate::humanize::format_elapsed;
use crate::invoice::destination_bucket;
use crate::repository::{InvoiceQuery, InvoiceSource, RepositoryError};
use crate::storage::{BucketError, ObjectStoreClient};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Bucket(#[from] BucketError),

    #[error("No invoice found")]
    NoData,

    #[error("Failed to load invoices: {0}")]
    Repository(#[from] RepositoryError),
}

impl MigrationError {
    /// Process exit status for a failed run
    ///
    /// An empty selection is not an error for the caller, a batch with copy
    /// failures exits with 2, everything else with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoData => 0,
            Self::Bucket(BucketError::Aggregate { .. }) => 2,
            _ => 1,
        }
    }
}

/// What a run works on
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub documents_bucket: String,
    pub bucket_prefix: String,
    pub environment: String,
    pub query: InvoiceQuery,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSummary {
    pub destination_bucket: String,
    pub invoices: usize,
    pub copied: usize,
    pub elapsed: Duration,
}

pub struct Migrator {
    store: Arc<dyn ObjectStoreClient>,
    source: Arc<dyn InvoiceSource>,
    engine: CopyEngine,
}

impl Migrator {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        source: Arc<dyn InvoiceSource>,
        settings: CopySettings,
    ) -> Self {
        let engine = CopyEngine::new(store.clone(), settings);
        Self {
            store,
            source,
            engine,
        }
    }

    pub async fn run(&self, plan: &MigrationPlan) -> Result<MigrationSummary, MigrationError> {
        let started = Instant::now();

        self.store.bucket_exists(&plan.documents_bucket).await?;

        let invoices = self.source.invoices(&plan.query).await?;
        info!(
            client_id = %plan.query.client_id,
            start = %plan.query.start,
            end = %plan.query.end,
            count = invoices.len(),
            "Loaded invoices"
        );

        let first = invoices.first().ok_or(MigrationError::NoData)?;
        let destination = destination_bucket(first, &plan.bucket_prefix, &plan.environment);

        let summary = self
            .engine
            .copy_all(&plan.documents_bucket, &destination, &invoices)
            .await?;

        let elapsed = started.elapsed();
        info!(
            bucket = %destination,
            copied = summary.receipts.len(),
            "Total duration: {}",
            format_elapsed(elapsed)
        );

        Ok(MigrationSummary {
            destination_bucket: destination,
            invoices: invoices.len(),
            copied: summary.receipts.len(),
            elapsed,
        })
    }
}

/// Empty a client bucket and delete it
pub async fn cleanup(store: &dyn ObjectStoreClient, bucket: &str) -> Result<(), MigrationError> {
    store.empty_and_delete_bucket(bucket).await?;
    info!(bucket, "Bucket emptied and deleted");
    Ok(())
}

/// Log a failed run, one line per individual copy failure
pub fn log_failure(err: &MigrationError) {
    match err {
        MigrationError::NoData => info!("No invoice found, nothing to migrate"),
        MigrationError::Bucket(bucket_err @ BucketError::Aggregate { .. }) => {
            error!(bucket = bucket_err.bucket(), "{}", bucket_err);
            for leaf in bucket_err.leaves() {
                error!("{}", leaf);
            }
        }
        other => error!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::Invoice;
    use crate::storage::LocalStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    const DOCUMENTS: &str = "agapio-documents";

    struct FixedSource(Vec<Invoice>);

    #[async_trait]
    impl InvoiceSource for FixedSource {
        async fn invoices(&self, _query: &InvoiceQuery) -> Result<Vec<Invoice>, RepositoryError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl InvoiceSource for BrokenSource {
        async fn invoices(&self, _query: &InvoiceQuery) -> Result<Vec<Invoice>, RepositoryError> {
            Err(RepositoryError::Connection("refused".to_string()))
        }
    }

    /// Destination creation is forbidden; counts copy attempts
    #[derive(Default)]
    struct ForbiddenStore {
        copies: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStoreClient for ForbiddenStore {
        async fn bucket_exists(&self, _bucket: &str) -> crate::storage::Result<()> {
            Ok(())
        }

        async fn create_bucket(&self, bucket: &str) -> crate::storage::Result<()> {
            Err(BucketError::access_forbidden(bucket))
        }

        async fn copy_object(
            &self,
            _source_bucket: &str,
            _source_key: &str,
            _destination_bucket: &str,
            _destination_key: &str,
        ) -> crate::storage::Result<()> {
            self.copies.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn empty_and_delete_bucket(&self, _bucket: &str) -> crate::storage::Result<()> {
            Ok(())
        }
    }

    fn invoices(count: usize) -> Vec<Invoice> {
        (0..count)
            .map(|i| {
                Invoice::builder()
                    .client_name("bistrot")
                    .restaurant_name("zinc")
                    .date(NaiveDate::from_ymd_opt(2023, 1, 1 + i as u32).unwrap())
                    .supplier_name("metro")
                    .reference(format!("R{}", i))
                    .document_id(Uuid::new_v4())
                    .total_price_incl(10.0 + i as f64)
                    .original_file_name("invoice.pdf")
                    .build()
            })
            .collect()
    }

    fn plan() -> MigrationPlan {
        MigrationPlan {
            documents_bucket: DOCUMENTS.to_string(),
            bucket_prefix: "agapio-client".to_string(),
            environment: "dev".to_string(),
            query: InvoiceQuery::from_dates(
                Uuid::new_v4(),
                NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
            ),
        }
    }

    fn settings() -> CopySettings {
        CopySettings {
            concurrency: 4,
            progress_interval: Duration::from_secs(3600),
        }
    }

    async fn seeded_store(batch: &[Invoice]) -> Arc<LocalStore> {
        let store = Arc::new(LocalStore::in_memory());
        store.create_bucket(DOCUMENTS).await.unwrap();
        for invoice in batch {
            store
                .put(DOCUMENTS, &invoice.source_key(), invoice.reference.clone())
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_no_invoices_is_no_data() {
        let store = seeded_store(&[]).await;
        let migrator = Migrator::new(store.clone(), Arc::new(FixedSource(vec![])), settings());

        let err = migrator.run(&plan()).await.unwrap_err();

        assert!(matches!(err, MigrationError::NoData));
        assert_eq!(err.exit_code(), 0);
        assert!(matches!(
            store.bucket_exists("agapio-client-bistrot-dev").await,
            Err(BucketError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_all_invoices_copied() {
        let batch = invoices(3);
        let store = seeded_store(&batch).await;
        let migrator = Migrator::new(store.clone(), Arc::new(FixedSource(batch)), settings());

        let summary = migrator.run(&plan()).await.unwrap();

        assert_eq!(summary.destination_bucket, "agapio-client-bistrot-dev");
        assert_eq!(summary.invoices, 3);
        assert_eq!(summary.copied, 3);
        let keys = store.list("agapio-client-bistrot-dev").await.unwrap();
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn test_partial_failure_is_aggregated() {
        let batch = invoices(5);
        // Only three of the five documents exist in the source bucket
        let store = seeded_store(&batch[..3]).await;
        let migrator = Migrator::new(store.clone(), Arc::new(FixedSource(batch)), settings());

        let err = migrator.run(&plan()).await.unwrap_err();

        let MigrationError::Bucket(BucketError::Aggregate { bucket, failures }) = &err else {
            panic!("expected aggregate failure");
        };
        assert_eq!(bucket, "agapio-client-bistrot-dev");
        assert_eq!(failures.len(), 2);
        assert!(
            failures
                .iter()
                .all(|f| matches!(f, BucketError::CopyFailure { .. }))
        );
        assert_eq!(err.exit_code(), 2);
        assert_eq!(store.list("agapio-client-bistrot-dev").await.unwrap().len(), 3);
        log_failure(&err);
    }

    #[tokio::test]
    async fn test_forbidden_destination_dispatches_nothing() {
        let store = Arc::new(ForbiddenStore::default());
        let migrator = Migrator::new(store.clone(), Arc::new(FixedSource(invoices(4))), settings());

        let err = migrator.run(&plan()).await.unwrap_err();

        assert!(matches!(
            err,
            MigrationError::Bucket(BucketError::AccessForbidden { .. })
        ));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(store.copies.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_documents_bucket_is_fatal() {
        let store = Arc::new(LocalStore::in_memory());
        let migrator = Migrator::new(store, Arc::new(FixedSource(invoices(2))), settings());

        let err = migrator.run(&plan()).await.unwrap_err();

        assert!(matches!(
            err,
            MigrationError::Bucket(BucketError::NotFound { ref bucket }) if bucket == DOCUMENTS
        ));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_repository_failure() {
        let store = seeded_store(&[]).await;
        let migrator = Migrator::new(store, Arc::new(BrokenSource), settings());

        let err = migrator.run(&plan()).await.unwrap_err();

        assert!(matches!(err, MigrationError::Repository(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_bucket() {
        let store = LocalStore::in_memory();
        store.create_bucket("agapio-client-bistrot-dev").await.unwrap();
        store
            .put("agapio-client-bistrot-dev", "zinc/a.pdf", "pdf")
            .await
            .unwrap();

        cleanup(&store, "agapio-client-bistrot-dev").await.unwrap();

        assert!(matches!(
            store.bucket_exists("agapio-client-bistrot-dev").await,
            Err(BucketError::NotFound { .. })
        ));
    }
}
