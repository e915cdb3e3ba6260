//! PostgreSQL invoice source using tokio-postgres behind a deadpool pool

use async_trait::async_trait;
use chrono::NaiveDate;
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime};
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::{InvoiceQuery, InvoiceSource, RepositoryError};
use crate::invoice::{Invoice, normalize_name};

const SELECT_INVOICES: &str = "
    SELECT c.name, r.name, i.date, s.name, i.reference, i.document_id,
           i.total_inc::float8, i.original_filename
    FROM invoice i
    JOIN deposit d ON d.id = i.deposit_id
    JOIN restaurant r ON r.id = d.restaurant_id
    JOIN client c ON c.id = r.client_id
    LEFT JOIN supplier s ON s.id = i.supplier_id
    WHERE i.status = 'complete'
      AND c.id = $1
      AND d.created_at >= $2
      AND d.created_at < $3
    ORDER BY c.name, r.name, s.name, i.date, i.reference, i.id";

pub struct PostgresInvoiceSource {
    pool: Pool,
}

impl PostgresInvoiceSource {
    /// Create a connection pool from a connection URL and check it answers
    pub async fn connect(
        database_url: &str,
        max_connections: usize,
    ) -> Result<Self, RepositoryError> {
        let pg_config: tokio_postgres::Config = database_url
            .parse()
            .map_err(|e| RepositoryError::Connection(format!("Invalid database URL: {}", e)))?;

        let mut cfg = Config::new();
        if let Some(host) = pg_config.get_hosts().first() {
            match host {
                tokio_postgres::config::Host::Tcp(host) => {
                    cfg.host = Some(host.clone());
                }
                tokio_postgres::config::Host::Unix(path) => {
                    cfg.host = Some(path.to_string_lossy().to_string());
                }
            }
        }
        if let Some(port) = pg_config.get_ports().first() {
            cfg.port = Some(*port);
        }
        if let Some(user) = pg_config.get_user() {
            cfg.user = Some(user.to_string());
        }
        if let Some(password) = pg_config.get_password() {
            cfg.password = Some(String::from_utf8_lossy(password).to_string());
        }
        if let Some(dbname) = pg_config.get_dbname() {
            cfg.dbname = Some(dbname.to_string());
        }
        cfg.pool = Some(PoolConfig::new(max_connections.max(1)));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| RepositoryError::Connection(format!("Failed to create pool: {}", e)))?;

        let client = pool.get().await?;
        client.execute("SELECT 1", &[]).await.map_err(|e| {
            RepositoryError::Connection(format!("Failed to connect to database: {}", e))
        })?;

        info!(max_connections, "Connected to invoice database");
        Ok(Self { pool })
    }
}

#[async_trait]
impl InvoiceSource for PostgresInvoiceSource {
    async fn invoices(&self, query: &InvoiceQuery) -> Result<Vec<Invoice>, RepositoryError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(SELECT_INVOICES, &[&query.client_id, &query.start, &query.end])
            .await?;
        debug!(rows = rows.len(), client_id = %query.client_id, "Fetched invoice rows");

        rows.iter()
            .map(|row| InvoiceRow::try_from(row)?.into_invoice())
            .collect()
    }
}

/// Invoice columns as stored; names are nullable in the schema
#[derive(Debug, Clone)]
struct InvoiceRow {
    client_name: Option<String>,
    restaurant_name: Option<String>,
    date: Option<NaiveDate>,
    supplier_name: Option<String>,
    reference: Option<String>,
    document_id: Uuid,
    total_inc: f64,
    original_filename: Option<String>,
}

impl TryFrom<&Row> for InvoiceRow {
    type Error = RepositoryError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            client_name: row.try_get(0)?,
            restaurant_name: row.try_get(1)?,
            date: row.try_get(2)?,
            supplier_name: row.try_get(3)?,
            reference: row.try_get(4)?,
            document_id: row.try_get(5)?,
            total_inc: row.try_get(6)?,
            original_filename: row.try_get(7)?,
        })
    }
}

impl InvoiceRow {
    fn into_invoice(self) -> Result<Invoice, RepositoryError> {
        let id = self.document_id;
        let required = |value: Option<String>, column: &str| {
            value.ok_or_else(|| {
                RepositoryError::Query(format!("invoice for document {} has no {}", id, column))
            })
        };

        Ok(Invoice::builder()
            .client_name(normalize_name(&required(self.client_name, "client name")?))
            .restaurant_name(normalize_name(&required(self.restaurant_name, "restaurant name")?))
            .maybe_date(self.date)
            .supplier_name(normalize_name(&required(self.supplier_name, "supplier name")?))
            .reference(required(self.reference, "reference")?)
            .document_id(id)
            .total_price_incl(self.total_inc)
            .original_file_name(required(self.original_filename, "original filename")?)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> InvoiceRow {
        InvoiceRow {
            client_name: Some("Le Bistrot".to_string()),
            restaurant_name: Some("Zinc & Co".to_string()),
            date: NaiveDate::from_ymd_opt(2023, 3, 14),
            supplier_name: Some("METRO France".to_string()),
            reference: Some("F-2023-001".to_string()),
            document_id: Uuid::new_v4(),
            total_inc: 42.5,
            original_filename: Some("scan.PDF".to_string()),
        }
    }

    #[test]
    fn test_row_names_are_normalized() {
        let raw = row();
        let id = raw.document_id;
        let invoice = raw.into_invoice().unwrap();

        assert_eq!(invoice.client_name, "lebistrot");
        assert_eq!(invoice.restaurant_name, "zincco");
        assert_eq!(invoice.supplier_name, "metrofrance");
        // Reference and file name are kept verbatim
        assert_eq!(invoice.reference, "F-2023-001");
        assert_eq!(invoice.original_file_name, "scan.PDF");
        assert_eq!(invoice.document_id, id);
        assert_eq!(invoice.date, NaiveDate::from_ymd_opt(2023, 3, 14));
    }

    #[test]
    fn test_missing_date_is_allowed() {
        let invoice = InvoiceRow { date: None, ..row() }.into_invoice().unwrap();
        assert!(invoice.date.is_none());
    }

    #[test]
    fn test_missing_supplier_is_a_query_error() {
        let result = InvoiceRow {
            supplier_name: None,
            ..row()
        }
        .into_invoice();

        assert!(matches!(
            result,
            Err(RepositoryError::Query(message)) if message.contains("supplier name")
        ));
    }

    #[test]
    fn test_query_orders_and_filters() {
        assert!(SELECT_INVOICES.contains("i.status = 'complete'"));
        assert!(SELECT_INVOICES.contains("d.created_at >= $2"));
        assert!(SELECT_INVOICES.contains("d.created_at < $3"));
        assert!(SELECT_INVOICES.contains("ORDER BY c.name, r.name, s.name, i.date, i.reference, i.id"));
    }
}
