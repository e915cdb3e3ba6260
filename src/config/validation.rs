use super::models::{Config, RunParams, StorageProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Copy concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("Progress interval must be positive")]
    InvalidProgressInterval,

    #[error("Missing required setting: {field}")]
    MissingField { field: String },

    #[error("S3 credentials need both access_key and secret_key, or neither for the default provider chain")]
    PartialS3Credentials,

    #[error("Deposit start date {start} must be before end date {end}")]
    InvalidDateRange { start: String, end: String },
}

/// Validate the settings every command depends on
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_copy(config)?;
    validate_storage(config)?;
    require_non_empty("environment", &config.environment)?;
    Ok(())
}

/// Validate the parameters of a migration run
pub fn validate_run(config: &Config) -> Result<RunParams, ValidationError> {
    let params = &config.params;

    let client_id = params.client_id.ok_or_else(|| missing("params.client_id"))?;
    let start = params
        .deposit_start_date_incl
        .ok_or_else(|| missing("params.deposit_start_date_incl"))?;
    let end = params
        .deposit_end_date_excl
        .ok_or_else(|| missing("params.deposit_end_date_excl"))?;

    if start >= end {
        return Err(ValidationError::InvalidDateRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    let database_url = config
        .database
        .url
        .clone()
        .filter(|url| !url.is_empty())
        .ok_or_else(|| missing("DATABASE_URL"))?;

    Ok(RunParams {
        client_id,
        start,
        end,
        database_url,
    })
}

fn validate_copy(config: &Config) -> Result<(), ValidationError> {
    if config.copy.concurrency == 0 {
        return Err(ValidationError::InvalidConcurrency);
    }

    if config.copy.progress_interval.is_zero() {
        return Err(ValidationError::InvalidProgressInterval);
    }

    Ok(())
}

/// Validate storage credentials when provider is S3
///
/// Without explicit keys the SDK resolves credentials from its default
/// provider chain (profile, web identity, instance metadata).
fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    require_non_empty("storage.documents_bucket", &config.storage.documents_bucket)?;

    // A dry run never talks to S3
    if config.storage.provider == StorageProvider::S3
        && !config.storage.dry_run
        && config.storage.access_key.is_some() != config.storage.secret_key.is_some()
    {
        return Err(ValidationError::PartialS3Credentials);
    }

    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(missing(field));
    }
    Ok(())
}

fn missing(field: &str) -> ValidationError {
    ValidationError::MissingField {
        field: field.to_string(),
    }
}
