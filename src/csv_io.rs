//! CSV export and bulk import of products

use crate::database::Store;
use crate::models::{price_to_cents, NewProduct, Product};
use chrono::SecondsFormat;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use thiserror::Error;

/// Columns written by [`write_products`]
pub const EXPORT_HEADER: [&str; 9] = [
    "id",
    "name",
    "description",
    "price",
    "category",
    "in_stock",
    "quantity",
    "created_at",
    "updated_at",
];

/// Columns an import file must carry (any order, case-insensitive)
pub const IMPORT_COLUMNS: [&str; 6] = [
    "name",
    "description",
    "price",
    "category",
    "in_stock",
    "quantity",
];

/// Errors that reject an import file as a whole
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read CSV header: {0}")]
    Header(#[from] csv::Error),
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
}

/// Outcome of an import; rows that fail are skipped and described in `errors`
#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ImportSummary {
    fn skip(&mut self, line: u64, reason: impl std::fmt::Display) {
        self.skipped += 1;
        self.errors.push(format!("line {line}: {reason}"));
    }
}

/// Write products as CSV with a header row
pub fn write_products<W: io::Write>(writer: W, products: &[Product]) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(EXPORT_HEADER)?;

    for product in products {
        wtr.write_record([
            product.id.to_string(),
            product.name.clone(),
            product.description.clone(),
            format!("{:.2}", product.price()),
            product.category.clone(),
            product.in_stock.to_string(),
            product.quantity.to_string(),
            product.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            product.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Column positions resolved from the header row
struct ColumnMap(HashMap<&'static str, usize>);

impl ColumnMap {
    fn from_header(header: &csv::StringRecord) -> Result<Self, ImportError> {
        let positions: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_lowercase(), i))
            .collect();

        let mut columns = HashMap::new();
        for column in IMPORT_COLUMNS {
            let idx = positions
                .get(column)
                .copied()
                .ok_or(ImportError::MissingColumn(column))?;
            columns.insert(column, idx);
        }
        Ok(Self(columns))
    }

    fn field<'r>(&self, record: &'r csv::StringRecord, column: &str) -> &'r str {
        self.0
            .get(column)
            .and_then(|&idx| record.get(idx))
            .unwrap_or("")
            .trim()
    }
}

/// Parse one data row into a product write; the error is the skip reason
fn parse_row(columns: &ColumnMap, record: &csv::StringRecord) -> Result<NewProduct, String> {
    let name = columns.field(record, "name");
    if name.is_empty() {
        return Err("name is required".to_string());
    }

    let price_field = columns.field(record, "price");
    let price = price_field
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .ok_or_else(|| format!("invalid price {price_field:?}"))?;

    let quantity_field = columns.field(record, "quantity");
    let quantity: i64 = quantity_field
        .parse()
        .map_err(|_| format!("invalid quantity {quantity_field:?}"))?;

    // The stored flag always follows quantity
    if is_truthy(columns.field(record, "in_stock")) != (quantity > 0) {
        log::debug!("Ignoring in_stock column for {:?}, quantity is {}", name, quantity);
    }

    Ok(NewProduct {
        name: name.to_string(),
        description: columns.field(record, "description").to_string(),
        price_cents: price_to_cents(price),
        category: columns.field(record, "category").to_string(),
        quantity,
    })
}

/// Import products from CSV, creating one product per valid row.
///
/// The header is line 1. Only a missing or unreadable header fails the whole
/// import; every other problem skips the row.
pub fn import_products<R: io::Read>(store: &Store, reader: R) -> Result<ImportSummary, ImportError> {
    let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
    let columns = ColumnMap::from_header(rdr.headers()?)?;

    let mut summary = ImportSummary::default();
    let mut record = csv::StringRecord::new();
    let mut line = 1;

    loop {
        line += 1;
        match rdr.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {}
            Err(err) => {
                let at = err.position().map_or(line, |pos| pos.line());
                summary.skip(at, err);
                continue;
            }
        }
        let at = record.position().map_or(line, |pos| pos.line());

        let product = match parse_row(&columns, &record) {
            Ok(product) => product,
            Err(reason) => {
                summary.skip(at, reason);
                continue;
            }
        };
        match store.create_product(product) {
            Ok(_) => summary.imported += 1,
            Err(err) => summary.skip(at, err),
        }
    }

    log::info!(
        "CSV import finished: {} imported, {} skipped",
        summary.imported,
        summary.skipped
    );
    Ok(summary)
}

/// `in_stock` import values that count as true
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}
