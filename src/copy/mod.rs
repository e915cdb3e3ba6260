//! Bounded-concurrency copy of invoice documents
//!
//! The engine turns every invoice into a [`CopyCommand`], runs the commands
//! on a semaphore-bounded set of tokio tasks and folds their outcomes into a
//! single batch result once all of them have completed.

mod engine;
mod progress;

pub use engine::{BatchResult, CopyEngine, CopyReceipt, CopySummary};
pub use progress::{Progress, ProgressReporter, ProgressTracker};

use std::time::Duration;

use crate::invoice::{Invoice, destination_key};

/// Copy engine settings
#[derive(Debug, Clone)]
pub struct CopySettings {
    /// Maximum number of copy calls in flight
    pub concurrency: usize,
    pub progress_interval: Duration,
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            concurrency: 100,
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// One object to copy from the documents bucket into a client bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyCommand {
    pub source_bucket: String,
    pub source_key: String,
    pub destination_bucket: String,
    pub destination_key: String,
}

impl CopyCommand {
    pub fn for_invoice(source_bucket: &str, destination_bucket: &str, invoice: &Invoice) -> Self {
        Self {
            source_bucket: source_bucket.to_string(),
            source_key: invoice.source_key(),
            destination_bucket: destination_bucket.to_string(),
            destination_key: destination_key(invoice),
        }
    }
}
