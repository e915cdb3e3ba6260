use async_trait::async_trait;
use std::time::Duration;

use super::{ObjectStoreClient, Result};

/// Store that replaces every call with a fixed delay and reports success.
///
/// Used to measure copy throughput without mutating real storage.
#[derive(Debug, Clone)]
pub struct DryRunStore {
    delay: Duration,
}

impl DryRunStore {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    async fn pause(&self, operation: &str, bucket: &str) -> Result<()> {
        tracing::trace!(operation, bucket, "Dry run");
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

impl Default for DryRunStore {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

#[async_trait]
impl ObjectStoreClient for DryRunStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<()> {
        self.pause("bucket_exists", bucket).await
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.pause("create_bucket", bucket).await
    }

    async fn copy_object(
        &self,
        _source_bucket: &str,
        _source_key: &str,
        destination_bucket: &str,
        _destination_key: &str,
    ) -> Result<()> {
        self.pause("copy_object", destination_bucket).await
    }

    async fn empty_and_delete_bucket(&self, bucket: &str) -> Result<()> {
        self.pause("empty_and_delete_bucket", bucket).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_every_call_succeeds_after_delay() {
        let store = DryRunStore::new(Duration::from_millis(20));
        let started = Instant::now();

        store.bucket_exists("missing").await.unwrap();
        store.create_bucket("missing").await.unwrap();
        store.copy_object("a", "k", "b", "k").await.unwrap();
        store.empty_and_delete_bucket("b").await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
