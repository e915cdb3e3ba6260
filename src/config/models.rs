use crate::humanize::HumanDuration;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Suffix of every destination bucket name (`dev`, `staging`, `prod`)
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub copy: CopyConfig,
    #[serde(default)]
    pub params: MigrationParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            copy: CopyConfig::default(),
            params: MigrationParams::default(),
        }
    }
}

fn default_environment() -> String {
    "dev".to_string()
}

/// Invoice database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL (loaded from environment, not from config file)
    #[serde(skip)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> usize {
    4
}

/// Storage provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    S3,
    Local,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_region")]
    pub region: String,
    pub endpoint: Option<String>,
    /// Shared bucket holding every invoice document
    #[serde(default)]
    pub documents_bucket: String,
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_dry_run_delay")]
    pub dry_run_delay: HumanDuration,
    /// Root directory of the local provider; in-memory buckets when absent
    pub local_root: Option<PathBuf>,
    /// S3 access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// S3 secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            region: default_region(),
            endpoint: None,
            documents_bucket: String::new(),
            bucket_prefix: default_bucket_prefix(),
            dry_run: false,
            dry_run_delay: default_dry_run_delay(),
            local_root: None,
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_region() -> String {
    "eu-west-1".to_string()
}

fn default_bucket_prefix() -> String {
    "agapio-client".to_string()
}

fn default_dry_run_delay() -> HumanDuration {
    HumanDuration::from_millis(100)
}

/// Copy engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CopyConfig {
    /// Maximum number of copy requests in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_progress_interval")]
    pub progress_interval: HumanDuration,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_concurrency() -> usize {
    100
}

fn default_progress_interval() -> HumanDuration {
    HumanDuration::from_millis(10_000)
}

/// Which invoices to migrate
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MigrationParams {
    pub client_id: Option<Uuid>,
    /// First deposit day, inclusive
    pub deposit_start_date_incl: Option<NaiveDate>,
    /// Last deposit day, exclusive
    pub deposit_end_date_excl: Option<NaiveDate>,
}

/// Checked parameters of a migration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    pub client_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub database_url: String,
}
