//! Invoice metadata source
//!
//! The migration only needs one query: every completed invoice of a client
//! whose deposit was created inside a half-open time range.

mod postgres;

pub use postgres::PostgresInvoiceSource;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::invoice::Invoice;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),
}

impl From<tokio_postgres::Error> for RepositoryError {
    fn from(e: tokio_postgres::Error) -> Self {
        RepositoryError::Query(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for RepositoryError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        RepositoryError::Connection(e.to_string())
    }
}

/// Invoices of one client deposited in `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceQuery {
    pub client_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl InvoiceQuery {
    /// Build a query from calendar days, each taken at start of day UTC
    pub fn from_dates(client_id: Uuid, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            client_id,
            start: start_of_day(start),
            end: start_of_day(end),
        }
    }
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Where invoice metadata comes from
///
/// Names in the returned invoices are already normalized (see
/// [`crate::invoice::normalize_name`]). Results are ordered by client,
/// restaurant, supplier, date, reference and internal id.
#[async_trait]
pub trait InvoiceSource: Send + Sync {
    async fn invoices(&self, query: &InvoiceQuery) -> Result<Vec<Invoice>, RepositoryError>;
}
