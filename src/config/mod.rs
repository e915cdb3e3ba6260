//! Configuration management for the invoice migrator
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use invoice_migrator::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load configuration");
//! println!("Copying from: {}", config.storage.documents_bucket);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `INVOICE_MIGRATOR__<section>__<key>`
//!
//! Examples:
//! - `INVOICE_MIGRATOR__ENVIRONMENT=prod`
//! - `INVOICE_MIGRATOR__COPY__CONCURRENCY=250`
//! - `INVOICE_MIGRATOR__STORAGE__DRY_RUN=true`
//!
//! Secrets are read from `DATABASE_URL`, `AWS_ACCESS_KEY_ID` and
//! `AWS_SECRET_ACCESS_KEY` only.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/invoice_migrator.toml`.
//! This can be overridden using the `INVOICE_MIGRATOR_CONFIG` environment
//! variable or the `--config` flag.

mod models;
mod sources;
mod validation;

// Re-export public types
pub use crate::humanize::HumanDuration;
pub use models::{
    Config, CopyConfig, DatabaseConfig, MigrationParams, RunParams, StorageConfig,
    StorageProvider,
};
pub use validation::ValidationError;

use crate::copy::CopySettings;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`INVOICE_MIGRATOR__*`, secrets)
    /// 2. TOML file (`path`, else `INVOICE_MIGRATOR_CONFIG`, else
    ///    `config/invoice_migrator.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (zero concurrency, half-set S3 credentials, etc.)
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(path, |_| {})
    }

    /// Load configuration, apply command-line overrides, then validate
    pub fn load_with(
        path: Option<PathBuf>,
        overrides: impl FnOnce(&mut Config),
    ) -> Result<Self, ConfigError> {
        let mut config = sources::load(path)?;
        overrides(&mut config);
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, without secrets
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Check the settings only a migration run needs
    pub fn run_params(&self) -> Result<RunParams, ConfigError> {
        Ok(validation::validate_run(self)?)
    }

    pub fn copy_settings(&self) -> CopySettings {
        CopySettings::from(&self.copy)
    }
}

impl From<&CopyConfig> for CopySettings {
    fn from(config: &CopyConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            progress_interval: config.progress_interval.as_duration(),
        }
    }
}
