//! Invoice records and the naming rules derived from them
//!
//! Every invoice maps to exactly one destination object key inside the
//! client's bucket. Keys must stay stable across runs: a document copied by
//! an earlier migration must land on the same key when migrated again.

use bon::Builder;
use chrono::NaiveDate;
use uuid::Uuid;

const DATE_FOLDER_FORMAT: &str = "%Y-%m";
const DATE_FILE_FORMAT: &str = "%Y-%m-%d";
const EMPTY_DATE_FOLDER: &str = "empty";
const UNKNOWN_EXTENSION: &str = "unknown";
const CURRENCY: &str = "EUR";

/// Invoice metadata as loaded from the invoice source
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(on(String, into))]
pub struct Invoice {
    pub client_name: String,
    pub restaurant_name: String,
    pub date: Option<NaiveDate>,
    pub supplier_name: String,
    pub reference: String,
    /// Key of the source document inside the documents bucket
    pub document_id: Uuid,
    pub total_price_incl: f64,
    pub original_file_name: String,
}

impl Invoice {
    /// Object key of the invoice document in the source bucket
    pub fn source_key(&self) -> String {
        self.document_id.to_string()
    }
}

/// Destination key: `{restaurant}/{yyyy-MM}/{yyyy-MM-dd} - {supplier} - {hash} - EUR - {price}.{ext}`
///
/// A missing date yields the `empty` folder and an empty date fragment; a
/// file name without extension yields `unknown`.
pub fn destination_key(invoice: &Invoice) -> String {
    let (folder, day) = match invoice.date {
        Some(date) => (
            date.format(DATE_FOLDER_FORMAT).to_string(),
            date.format(DATE_FILE_FORMAT).to_string(),
        ),
        None => (EMPTY_DATE_FOLDER.to_string(), String::new()),
    };

    format!(
        "{}/{}/{} - {} - {} - {} - {}.{}",
        invoice.restaurant_name,
        folder,
        day,
        invoice.supplier_name,
        document_hash(&invoice.document_id),
        CURRENCY,
        price_fragment(invoice.total_price_incl),
        file_extension(&invoice.original_file_name),
    )
}

/// Destination bucket for a client: `{prefix}-{client}-{environment}`
pub fn destination_bucket(invoice: &Invoice, prefix: &str, environment: &str) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        invoice.client_name.to_lowercase(),
        environment
    )
}

/// Lowercase and keep ASCII alphanumerics only
pub fn normalize_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Short signed hash of a document id.
///
/// The two 64-bit halves are folded together, then the two 32-bit halves of
/// the result. Keys already written by previous migrations depend on this
/// exact value.
fn document_hash(id: &Uuid) -> i32 {
    let (high, low) = id.as_u64_pair();
    let folded = high ^ low;
    ((folded >> 32) as u32 ^ folded as u32) as i32
}

/// Price with at least one fractional digit and `_` as separator
fn price_fragment(price: f64) -> String {
    render_price(price).replace('.', "_")
}

/// Shortest round-trip decimal, plain in `[1e-3, 1e7)` and as
/// `{mantissa}E{exponent}` outside it, matching keys written before.
fn render_price(price: f64) -> String {
    if price.is_nan() {
        return "NaN".to_string();
    }
    if price.is_infinite() {
        return if price > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let magnitude = price.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        // Debug keeps the trailing ".0" on whole numbers
        return format!("{:?}", price);
    }

    let scientific = format!("{:e}", price);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    if mantissa.contains('.') {
        format!("{}E{}", mantissa, exponent)
    } else {
        format!("{}.0E{}", mantissa, exponent)
    }
}

fn file_extension(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or(UNKNOWN_EXTENSION)
}
