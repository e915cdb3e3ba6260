//! AWS S3 backend
//!
//! Each call is a single SDK request. SDK errors are classified from the
//! HTTP status and the S3 error code into the [`BucketError`] taxonomy.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};

use super::{BucketError, ObjectStoreClient, Result, ensure_absent};
use crate::config::StorageConfig;

/// Region that rejects an explicit location constraint
const DEFAULT_S3_REGION: &str = "us-east-1";

/// S3 client wrapper
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    region: String,
}

impl S3Store {
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Build the SDK client from storage configuration.
    ///
    /// Explicit credentials win over the default provider chain; a custom
    /// endpoint switches to path-style addressing (MinIO, LocalStack).
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "invoice-migrator-config",
            ));
        }

        if let Some(endpoint) = &config.endpoint {
            tracing::info!(endpoint, "Using custom S3 endpoint");
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        tracing::debug!(region = %config.region, "S3 client initialized");
        Self::new(Client::from_conf(s3_config), config.region.clone())
    }

    fn bucket_configuration(&self) -> Option<CreateBucketConfiguration> {
        if self.region == DEFAULT_S3_REGION {
            return None;
        }

        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build(),
        )
    }

    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|e| bucket_error(bucket, &e))?;

            keys.extend(output.contents().iter().filter_map(|o| o.key().map(String::from)));

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(String::from);
            } else {
                break;
            }
        }

        Ok(keys)
    }

    async fn delete_keys(&self, bucket: &str, keys: &[String]) -> Result<()> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BucketError::other(bucket, e.to_string()))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| BucketError::other(bucket, e.to_string()))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| bucket_error(bucket, &e))?;

        if let Some(failed) = output.errors().first() {
            return Err(BucketError::other(
                bucket,
                format!(
                    "{} objects could not be deleted, first: {} ({})",
                    output.errors().len(),
                    failed.key().unwrap_or_default(),
                    failed.message().unwrap_or_default()
                ),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl ObjectStoreClient for S3Store {
    async fn bucket_exists(&self, bucket: &str) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| bucket_error(bucket, &e))?;
        Ok(())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        ensure_absent(self, bucket).await?;

        self.client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(self.bucket_configuration())
            .acl(BucketCannedAcl::Private)
            .send()
            .await
            .map_err(|e| bucket_error(bucket, &e))?;

        tracing::info!(bucket, region = %self.region, "Bucket created");
        Ok(())
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(format!("{}/{}", source_bucket, source_key))
            .bucket(destination_bucket)
            .key(destination_key)
            .send()
            .await
            .map_err(|e| match classify(&e) {
                ErrorClass::NotFound if e.code() != Some("NoSuchKey") => {
                    BucketError::not_found(destination_bucket)
                }
                ErrorClass::Forbidden => BucketError::access_forbidden(destination_bucket),
                _ => BucketError::copy_failure(
                    destination_bucket,
                    destination_key,
                    DisplayErrorContext(&e).to_string(),
                ),
            })?;

        Ok(())
    }

    async fn empty_and_delete_bucket(&self, bucket: &str) -> Result<()> {
        let keys = self.list_keys(bucket).await?;

        // DeleteObjects accepts at most 1000 keys per request
        for chunk in keys.chunks(1000) {
            self.delete_keys(bucket, chunk).await?;
        }

        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| bucket_error(bucket, &e))?;

        tracing::info!(bucket, objects = keys.len(), "Bucket emptied and deleted");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorClass {
    NotFound,
    Forbidden,
    AlreadyExists,
    InvalidName,
    Unclassified,
}

fn classify<E>(error: &SdkError<E, HttpResponse>) -> ErrorClass
where
    E: ProvideErrorMetadata,
{
    let status = error.raw_response().map(|r| r.status().as_u16());
    classify_parts(status, error.code(), error.message())
}

/// HEAD responses carry no body, so the status code is the only signal there
fn classify_parts(status: Option<u16>, code: Option<&str>, message: Option<&str>) -> ErrorClass {
    match code {
        Some("NoSuchBucket" | "NoSuchKey" | "NotFound") => return ErrorClass::NotFound,
        Some("AccessDenied" | "Forbidden" | "AllAccessDisabled" | "InvalidAccessKeyId") => {
            return ErrorClass::Forbidden;
        }
        Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou") => return ErrorClass::AlreadyExists,
        Some("InvalidBucketName") => return ErrorClass::InvalidName,
        _ => {}
    }

    if message.is_some_and(|m| m.contains("is not valid")) {
        return ErrorClass::InvalidName;
    }

    match status {
        Some(404) => ErrorClass::NotFound,
        Some(401 | 403) => ErrorClass::Forbidden,
        Some(409) => ErrorClass::AlreadyExists,
        _ => ErrorClass::Unclassified,
    }
}

fn bucket_error<E>(bucket: &str, error: &SdkError<E, HttpResponse>) -> BucketError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match classify(error) {
        ErrorClass::NotFound => BucketError::not_found(bucket),
        ErrorClass::Forbidden => BucketError::access_forbidden(bucket),
        ErrorClass::AlreadyExists => BucketError::already_exists(bucket),
        ErrorClass::InvalidName => BucketError::invalid_name(bucket),
        ErrorClass::Unclassified => BucketError::other(bucket, DisplayErrorContext(error).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_bucket_status_codes() {
        assert_eq!(classify_parts(Some(404), None, None), ErrorClass::NotFound);
        assert_eq!(classify_parts(Some(403), None, None), ErrorClass::Forbidden);
        assert_eq!(classify_parts(Some(500), None, None), ErrorClass::Unclassified);
        assert_eq!(classify_parts(None, None, None), ErrorClass::Unclassified);
    }

    #[test]
    fn test_error_codes_take_precedence() {
        assert_eq!(
            classify_parts(Some(409), Some("BucketAlreadyOwnedByYou"), None),
            ErrorClass::AlreadyExists
        );
        assert_eq!(
            classify_parts(Some(400), Some("InvalidBucketName"), None),
            ErrorClass::InvalidName
        );
        assert_eq!(
            classify_parts(Some(403), Some("AccessDenied"), Some("Access Denied")),
            ErrorClass::Forbidden
        );
    }

    #[test]
    fn test_invalid_name_from_message() {
        assert_eq!(
            classify_parts(Some(400), Some("InvalidArgument"), Some("The bucket name is not valid")),
            ErrorClass::InvalidName
        );
    }

    #[tokio::test]
    async fn test_location_constraint_skipped_for_us_east_1() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        let store = S3Store::new(Client::from_conf(config), "us-east-1");
        assert!(store.bucket_configuration().is_none());

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .build();
        let store = S3Store::new(Client::from_conf(config), "eu-west-1");
        let constraint = store.bucket_configuration().unwrap();
        assert_eq!(
            constraint.location_constraint(),
            Some(&BucketLocationConstraint::EuWest1)
        );
    }
}
