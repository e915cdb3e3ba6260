//! Object storage abstraction for bucket-level operations
//!
//! The copy engine only talks to [`ObjectStoreClient`]. Three backends exist:
//! AWS S3, local buckets on top of the `object_store` crate, and a dry-run
//! store that performs no I/O at all.

mod dry_run;
mod error;
mod local;
mod s3;

pub use dry_run::DryRunStore;
pub use error::{BucketError, Result};
pub use local::LocalStore;
pub use s3::S3Store;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StorageConfig, StorageProvider};

/// Bucket and object operations consumed by the migration
///
/// Every call is a single attempt; failures come back as [`BucketError`].
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Succeeds when the bucket exists and is reachable
    async fn bucket_exists(&self, bucket: &str) -> Result<()>;

    /// Create a bucket that does not exist yet.
    ///
    /// Fails with [`BucketError::AlreadyExists`] without touching the store
    /// when the bucket is already there.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Copy one object between buckets
    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<()>;

    /// Delete every object of a bucket, then the bucket itself
    async fn empty_and_delete_bucket(&self, bucket: &str) -> Result<()>;
}

/// Existence check shared by every `create_bucket` implementation.
///
/// `Ok(())` means the bucket is missing and may be created.
pub(crate) async fn ensure_absent<S>(store: &S, bucket: &str) -> Result<()>
where
    S: ObjectStoreClient + ?Sized,
{
    match store.bucket_exists(bucket).await {
        Ok(()) => Err(BucketError::already_exists(bucket)),
        Err(BucketError::NotFound { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Build the store selected by configuration
pub async fn connect(config: &StorageConfig) -> Arc<dyn ObjectStoreClient> {
    if config.dry_run {
        tracing::warn!(
            delay = %config.dry_run_delay,
            "Dry run enabled, no storage call will be made"
        );
        return Arc::new(DryRunStore::new(config.dry_run_delay.as_duration()));
    }

    match config.provider {
        StorageProvider::S3 => Arc::new(S3Store::from_config(config).await),
        StorageProvider::Local => match &config.local_root {
            Some(root) => Arc::new(LocalStore::on_disk(root.clone())),
            None => Arc::new(LocalStore::in_memory()),
        },
    }
}

/// S3 bucket naming rules: 3-63 chars of lowercase letters, digits, `-` and
/// `.`, starting and ending with a letter or digit
pub fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if !(3..=63).contains(&bytes.len()) {
        return false;
    }

    let edge_ok = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let first_last_ok = bytes.first().is_some_and(edge_ok) && bytes.last().is_some_and(edge_ok);

    first_last_ok
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-' || *b == b'.')
        && !name.contains("..")
}
