use thiserror::Error;

/// Outcome of a failed bucket or object operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BucketError {
    #[error("Bucket {bucket} not found")]
    NotFound { bucket: String },

    #[error("Bucket {bucket} already exists")]
    AlreadyExists { bucket: String },

    #[error("Not authorized to access bucket {bucket}")]
    AccessForbidden { bucket: String },

    #[error("Bucket {bucket} name is not valid")]
    InvalidName { bucket: String },

    #[error("Failed to copy {key} into {bucket} because {message}")]
    CopyFailure {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Failed to copy {} files into {bucket}", .failures.len())]
    Aggregate {
        bucket: String,
        failures: Vec<BucketError>,
    },

    #[error("Exception {reason} about bucket {bucket}")]
    Other { bucket: String, reason: String },
}

impl BucketError {
    pub fn not_found(bucket: impl Into<String>) -> Self {
        Self::NotFound { bucket: bucket.into() }
    }

    pub fn already_exists(bucket: impl Into<String>) -> Self {
        Self::AlreadyExists { bucket: bucket.into() }
    }

    pub fn access_forbidden(bucket: impl Into<String>) -> Self {
        Self::AccessForbidden { bucket: bucket.into() }
    }

    pub fn invalid_name(bucket: impl Into<String>) -> Self {
        Self::InvalidName { bucket: bucket.into() }
    }

    pub fn copy_failure(
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CopyFailure {
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn other(bucket: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Other {
            bucket: bucket.into(),
            reason: reason.into(),
        }
    }

    /// Bucket the error is about
    pub fn bucket(&self) -> &str {
        match self {
            Self::NotFound { bucket }
            | Self::AlreadyExists { bucket }
            | Self::AccessForbidden { bucket }
            | Self::InvalidName { bucket }
            | Self::CopyFailure { bucket, .. }
            | Self::Aggregate { bucket, .. }
            | Self::Other { bucket, .. } => bucket,
        }
    }

    /// Individual failures: the members of an aggregate, or the error itself
    pub fn leaves(&self) -> Vec<&BucketError> {
        match self {
            Self::Aggregate { failures, .. } => failures.iter().flat_map(|f| f.leaves()).collect(),
            other => vec![other],
        }
    }
}

pub type Result<T> = std::result::Result<T, BucketError>;
