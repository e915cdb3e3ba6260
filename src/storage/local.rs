//! Buckets on top of Apache Arrow `object_store`
//!
//! Without a root directory every bucket is an `InMemory` store; with one,
//! every bucket is a subdirectory served by `LocalFileSystem`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, path::Path as StoragePath};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{BucketError, ObjectStoreClient, Result, is_valid_bucket_name};

enum Backing {
    Memory(RwLock<HashMap<String, Arc<dyn ObjectStore>>>),
    Disk(PathBuf),
}

/// Local bucket store for development runs and tests
pub struct LocalStore {
    backing: Backing,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory(RwLock::new(HashMap::new())),
        }
    }

    pub fn on_disk(root: PathBuf) -> Self {
        Self {
            backing: Backing::Disk(root),
        }
    }

    /// Write an object directly, bypassing the copy path
    pub async fn put(&self, bucket: &str, key: &str, data: impl Into<Bytes>) -> Result<()> {
        let store = self.open(bucket).await?;
        let data: Bytes = data.into();
        store
            .put(&StoragePath::from(key), data.into())
            .await
            .map_err(|e| map_error(bucket, e))?;
        Ok(())
    }

    /// Read an object back
    pub async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let store = self.open(bucket).await?;
        let result = store
            .get(&StoragePath::from(key))
            .await
            .map_err(|e| map_error(bucket, e))?;
        result.bytes().await.map_err(|e| map_error(bucket, e))
    }

    /// Keys of every object in a bucket
    pub async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        let store = self.open(bucket).await?;
        let metas: Vec<_> = store
            .list(None)
            .try_collect()
            .await
            .map_err(|e| map_error(bucket, e))?;
        Ok(metas.into_iter().map(|m| m.location.to_string()).collect())
    }

    async fn open(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        // Names become directories under the root; `..` or `/` must never resolve
        if !is_valid_bucket_name(bucket) {
            return Err(BucketError::invalid_name(bucket));
        }

        match &self.backing {
            Backing::Memory(buckets) => buckets
                .read()
                .await
                .get(bucket)
                .cloned()
                .ok_or_else(|| BucketError::not_found(bucket)),
            Backing::Disk(root) => {
                let dir = root.join(bucket);
                if !dir.is_dir() {
                    return Err(BucketError::not_found(bucket));
                }
                let store = LocalFileSystem::new_with_prefix(&dir)
                    .map_err(|e| map_error(bucket, e))?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[async_trait]
impl ObjectStoreClient for LocalStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<()> {
        self.open(bucket).await.map(|_| ())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        if !is_valid_bucket_name(bucket) {
            return Err(BucketError::invalid_name(bucket));
        }

        match &self.backing {
            Backing::Memory(buckets) => match buckets.write().await.entry(bucket.to_string()) {
                Entry::Occupied(_) => return Err(BucketError::already_exists(bucket)),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(InMemory::new()));
                }
            },
            Backing::Disk(root) => {
                tokio::fs::create_dir_all(root)
                    .await
                    .map_err(|e| BucketError::other(bucket, e.to_string()))?;
                tokio::fs::create_dir(root.join(bucket))
                    .await
                    .map_err(|e| match e.kind() {
                        std::io::ErrorKind::AlreadyExists => BucketError::already_exists(bucket),
                        std::io::ErrorKind::PermissionDenied => BucketError::access_forbidden(bucket),
                        _ => BucketError::other(bucket, e.to_string()),
                    })?;
            }
        }

        tracing::info!(bucket, "Bucket created");
        Ok(())
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<()> {
        let source = self.open(source_bucket).await?;
        let destination = self.open(destination_bucket).await?;

        let copy_failure = |e: object_store::Error| match e {
            object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. } => {
                BucketError::access_forbidden(destination_bucket)
            }
            other => BucketError::copy_failure(destination_bucket, destination_key, other.to_string()),
        };

        let data = source
            .get(&StoragePath::from(source_key))
            .await
            .map_err(copy_failure)?
            .bytes()
            .await
            .map_err(copy_failure)?;

        destination
            .put(&StoragePath::from(destination_key), data.into())
            .await
            .map_err(copy_failure)?;

        tracing::debug!(source_bucket, source_key, destination_bucket, destination_key, "Object copied");
        Ok(())
    }

    async fn empty_and_delete_bucket(&self, bucket: &str) -> Result<()> {
        let store = self.open(bucket).await?;

        let locations = store.list(None).map_ok(|meta| meta.location).boxed();
        let deleted: Vec<_> = store
            .delete_stream(locations)
            .try_collect()
            .await
            .map_err(|e| map_error(bucket, e))?;

        match &self.backing {
            Backing::Memory(buckets) => {
                buckets.write().await.remove(bucket);
            }
            Backing::Disk(root) => {
                tokio::fs::remove_dir_all(root.join(bucket))
                    .await
                    .map_err(|e| BucketError::other(bucket, e.to_string()))?;
            }
        }

        tracing::info!(bucket, objects = deleted.len(), "Bucket emptied and deleted");
        Ok(())
    }
}

fn map_error(bucket: &str, error: object_store::Error) -> BucketError {
    match error {
        object_store::Error::NotFound { .. } => BucketError::not_found(bucket),
        object_store::Error::PermissionDenied { .. } | object_store::Error::Unauthenticated { .. } => {
            BucketError::access_forbidden(bucket)
        }
        other => BucketError::other(bucket, other.to_string()),
    }
}
