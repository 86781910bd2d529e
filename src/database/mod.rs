//! SQLite-backed catalog store
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! One connection is shared behind a mutex; single-product reads go through
//! the injected [`ProductCache`].

mod audit;
mod products;
mod reviews;
mod stats;
mod variants;

use crate::cache::ProductCache;
use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Descriptions longer than this are truncated on write
pub const MAX_DESCRIPTION_CHARS: usize = 128;

/// Catalog store: owns the database connection and the product read cache
pub struct Store {
    db: Mutex<Connection>,
    cache: ProductCache,
}

impl Store {
    /// Open (or create) a database file and initialize the schema
    pub fn open(path: &Path, cache: ProductCache) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("SQLite journal mode: {}", mode);
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::new(conn, cache)
    }

    /// Create an in-memory store (tests, throwaway instances)
    pub fn open_in_memory(cache: ProductCache) -> Result<Self> {
        Self::new(Connection::open_in_memory()?, cache)
    }

    /// Wrap an already opened connection, creating tables if needed
    pub fn new(conn: Connection, cache: ProductCache) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            cache,
        })
    }

    /// Lock the shared connection. A panic in another request must not take
    /// the store down with it, so a poisoned lock is recovered.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cache(&self) -> &ProductCache {
        &self.cache
    }

    /// Check that the database answers queries
    pub fn ping(&self) -> Result<()> {
        self.conn().query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Insert the sample catalog when the products table is empty.
    ///
    /// Returns the number of products inserted (0 if data already existed).
    pub fn seed_sample_data(&self) -> Result<usize> {
        let mut conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(0);
        }

        log::info!("Seeding database with sample products...");
        let now = Utc::now();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO products
                 (name, description, price_cents, category, in_stock, quantity, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            )?;
            for (name, description, price_cents, category, quantity) in SEED_PRODUCTS {
                inserted += stmt.execute(params![
                    name,
                    description,
                    price_cents,
                    category,
                    *quantity > 0,
                    quantity,
                    now
                ])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO variants
                 (product_id, sku, name, price_cents, quantity, in_stock, attributes, sort_order, created_at, updated_at)
                 SELECT id, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9 FROM products WHERE name = ?1",
            )?;
            for (product, sku, name, price_cents, quantity, attributes, sort_order) in SEED_VARIANTS
            {
                stmt.execute(params![
                    product,
                    sku,
                    name,
                    price_cents,
                    quantity,
                    *quantity > 0,
                    attributes,
                    sort_order,
                    now
                ])?;
            }
        }
        tx.commit()?;

        log::info!("Seeded {} sample products", inserted);
        Ok(inserted)
    }
}

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `products`: catalog entries, soft-deleted via `deleted_at`
/// - `variants`: per-product SKUs with independent stock
/// - `reviews`: customer reviews, rating constrained to 1..=5
/// - `audit_log`: append-only action trail
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            category TEXT NOT NULL DEFAULT '',
            in_stock BOOLEAN NOT NULL DEFAULT 0,
            quantity INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT DEFAULT NULL,
            UNIQUE (name)
        );

        CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);

        CREATE TABLE IF NOT EXISTS variants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            sku TEXT NOT NULL,
            name TEXT NOT NULL,
            price_cents INTEGER NOT NULL DEFAULT 0 CHECK (price_cents >= 0),
            quantity INTEGER NOT NULL DEFAULT 0,
            in_stock BOOLEAN NOT NULL DEFAULT 0,
            attributes TEXT NOT NULL DEFAULT '{}',
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (sku),
            FOREIGN KEY (product_id) REFERENCES products(id)
        );

        CREATE INDEX IF NOT EXISTS idx_variants_product ON variants(product_id);

        CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            author TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating >= 1 AND rating <= 5),
            comment TEXT NOT NULL DEFAULT '',
            approved BOOLEAN NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products(id)
        );

        CREATE INDEX IF NOT EXISTS idx_reviews_product ON reviews(product_id);

        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            action TEXT NOT NULL,
            detail TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products(id)
        );

        CREATE INDEX IF NOT EXISTS idx_audit_log_product ON audit_log(product_id);
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

/// (name, description, price_cents, category, quantity)
const SEED_PRODUCTS: &[(&str, &str, i64, &str, i64)] = &[
    ("Wireless Mouse", "Ergonomic wireless mouse with USB receiver", 2499, "electronics", 25),
    ("Mechanical Keyboard", "Cherry MX Blue switches, full-size layout", 8999, "electronics", 12),
    ("USB-C Hub", "7-in-1 USB-C adapter with HDMI and ethernet", 3499, "electronics", 0),
    ("Standing Desk", "Electric sit-stand desk, 60 inch wide", 49999, "furniture", 8),
    ("Monitor Arm", "Single monitor mount, gas spring, VESA compatible", 4999, "furniture", 0),
    ("Notebook Pack", "200-page lined notebooks, pack of 3", 500, "office", 50),
    ("Desk Lamp", "LED desk lamp with adjustable brightness", 3299, "office", 15),
    ("Webcam HD", "1080p webcam with built-in microphone", 5999, "electronics", 3),
];

/// (product name, sku, name, price_cents, quantity, attributes, sort_order)
const SEED_VARIANTS: &[(&str, &str, &str, i64, i64, &str, i64)] = &[
    ("Wireless Mouse", "WM-BLK", "Wireless Mouse - Black", 2499, 10, r#"{"color":"black"}"#, 1),
    ("Wireless Mouse", "WM-WHT", "Wireless Mouse - White", 2499, 8, r#"{"color":"white"}"#, 2),
    ("Wireless Mouse", "WM-BLU", "Wireless Mouse - Blue", 2699, 7, r#"{"color":"blue"}"#, 3),
    ("Mechanical Keyboard", "KB-FULL", "Mechanical Keyboard - Full Size", 8999, 6, r#"{"size":"full"}"#, 1),
    ("Mechanical Keyboard", "KB-TKL", "Mechanical Keyboard - Tenkeyless", 7999, 4, r#"{"size":"tenkeyless"}"#, 2),
    ("Mechanical Keyboard", "KB-65", "Mechanical Keyboard - 65%", 8499, 2, r#"{"size":"65%"}"#, 3),
    ("Standing Desk", "SD-48", "Standing Desk - 48 inch", 39999, 3, r#"{"width":"48in"}"#, 1),
    ("Standing Desk", "SD-60", "Standing Desk - 60 inch", 49999, 5, r#"{"width":"60in"}"#, 2),
    ("Standing Desk", "SD-72", "Standing Desk - 72 inch", 59999, 0, r#"{"width":"72in"}"#, 3),
];

/// Create an in-memory store with an empty schema for tests
#[cfg(test)]
pub(crate) fn test_store() -> Store {
    Store::open_in_memory(ProductCache::default()).unwrap()
}

#[cfg(test)]
pub(crate) fn test_product(
    name: &str,
    price_cents: i64,
    category: &str,
    quantity: i64,
) -> crate::models::NewProduct {
    crate::models::NewProduct {
        name: name.to_string(),
        description: format!("{name} description"),
        price_cents,
        category: category.to_string(),
        quantity,
    }
}
