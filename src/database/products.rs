//! Product queries and mutations

use super::{Store, MAX_DESCRIPTION_CHARS};
use crate::error::{Result, StoreError};
use crate::models::{NewProduct, Product};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

pub(super) const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, category, in_stock, \
     quantity, created_at, updated_at, deleted_at";

pub(super) fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price_cents: row.get(3)?,
        category: row.get(4)?,
        in_stock: row.get(5)?,
        quantity: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deleted_at: row.get(9)?,
    })
}

/// Validate a product write and apply the description cap
fn checked(mut product: NewProduct) -> Result<NewProduct> {
    if product.name.trim().is_empty() {
        return Err(StoreError::validation("name is required"));
    }
    if product.price_cents < 0 {
        return Err(StoreError::validation("price must be non-negative"));
    }
    if product.quantity < 0 {
        return Err(StoreError::validation("quantity must be non-negative"));
    }
    if product.description.chars().count() > MAX_DESCRIPTION_CHARS {
        log::warn!(
            "Description for {:?} truncated from {} to {} characters",
            product.name,
            product.description.chars().count(),
            MAX_DESCRIPTION_CHARS
        );
        product.description = product
            .description
            .chars()
            .take(MAX_DESCRIPTION_CHARS)
            .collect();
    }
    Ok(product)
}

impl Store {
    /// Insert a new product, returning its id.
    ///
    /// `in_stock` is derived from the quantity. Fails with `Duplicate` if the
    /// name is already taken, including by a soft-deleted product.
    pub fn create_product(&self, product: NewProduct) -> Result<i64> {
        let product = checked(product)?;
        let now = Utc::now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO products
             (name, description, price_cents, category, in_stock, quantity, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                product.name,
                product.description,
                product.price_cents,
                product.category,
                product.quantity > 0,
                product.quantity,
                now
            ],
        )
        .map_err(|e| StoreError::from_write(e, "product name"))?;

        let id = conn.last_insert_rowid();
        log::debug!("Created product {} ({})", id, product.name);
        Ok(id)
    }

    /// Get an active product, serving from the cache while the entry is fresh
    pub fn get_product(&self, id: i64) -> Result<Product> {
        if let Some(product) = self.cache.get(id) {
            return Ok(product);
        }

        // Cache fills and write invalidations are ordered by the connection lock
        let conn = self.conn();
        let product = conn
            .query_row(
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND deleted_at IS NULL"
                ),
                params![id],
                product_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound("product"))?;

        self.cache.insert(product.clone());
        Ok(product)
    }

    /// List active products, optionally filtered by exact category
    pub fn list_products(&self, category: Option<&str>) -> Result<Vec<Product>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE deleted_at IS NULL AND (?1 IS NULL OR category = ?1)
             ORDER BY id"
        ))?;
        let products = stmt
            .query_map(params![category], product_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    /// Substring search over name and description, ordered by name.
    ///
    /// Matching follows SQLite `LIKE`, which is case-insensitive for ASCII.
    pub fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let pattern = format!("%{}%", query);
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE deleted_at IS NULL AND (name LIKE ?1 OR description LIKE ?1)
             ORDER BY name"
        ))?;
        let products = stmt
            .query_map(params![pattern], product_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    /// Distinct non-empty categories of active products
    pub fn list_categories(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT category FROM products
             WHERE deleted_at IS NULL AND category != ''
             ORDER BY category",
        )?;
        let categories = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(categories)
    }

    /// Overwrite all mutable fields of an active product
    pub fn update_product(&self, id: i64, product: NewProduct) -> Result<()> {
        let product = checked(product)?;
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE products
                 SET name = ?1, description = ?2, price_cents = ?3, category = ?4,
                     in_stock = ?5, quantity = ?6, updated_at = ?7
                 WHERE id = ?8 AND deleted_at IS NULL",
                params![
                    product.name,
                    product.description,
                    product.price_cents,
                    product.category,
                    product.quantity > 0,
                    product.quantity,
                    Utc::now(),
                    id
                ],
            )
            .map_err(|e| StoreError::from_write(e, "product name"))?;
        self.cache.invalidate(id);

        if changed == 0 {
            return Err(StoreError::NotFound("product"));
        }
        Ok(())
    }

    /// Soft-delete a product. Already deleted products are reported as missing.
    pub fn delete_product(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE products SET deleted_at = ?1, updated_at = ?1
             WHERE id = ?2 AND deleted_at IS NULL",
            params![now, id],
        )?;
        self.cache.invalidate(id);

        if changed == 0 {
            return Err(StoreError::NotFound("product"));
        }
        log::info!("Soft-deleted product {}", id);
        Ok(())
    }

    /// Take one unit of stock, returning the remaining quantity.
    ///
    /// The check and the write are a single conditional UPDATE, so concurrent
    /// purchases can neither lose updates nor drive the quantity below zero.
    pub fn decrement_quantity(&self, id: i64) -> Result<i64> {
        let conn = self.conn();
        let remaining: Option<i64> = conn
            .query_row(
                "UPDATE products
                 SET quantity = quantity - 1, in_stock = (quantity - 1) > 0, updated_at = ?1
                 WHERE id = ?2 AND deleted_at IS NULL AND quantity > 0
                 RETURNING quantity",
                params![Utc::now(), id],
                |row| row.get(0),
            )
            .optional()?;
        self.cache.invalidate(id);

        match remaining {
            Some(quantity) => Ok(quantity),
            None => {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM products WHERE id = ?1 AND deleted_at IS NULL",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                match exists {
                    Some(_) => Err(StoreError::OutOfStock),
                    None => Err(StoreError::NotFound("product")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ProductCache;
    use crate::database::{test_product as new_product, test_store};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn create_and_get_product() {
        let store = test_store();
        let id = store
            .create_product(new_product("Pen", 150, "office", 2))
            .unwrap();

        let product = store.get_product(id).unwrap();
        assert_eq!(product.name, "Pen");
        assert_eq!(product.price_cents, 150);
        assert_eq!(product.quantity, 2);
        assert!(product.in_stock);
        assert_eq!(product.created_at, product.updated_at);
        assert!(product.deleted_at.is_none());
    }

    #[test]
    fn create_derives_in_stock_from_quantity() {
        let store = test_store();
        let id = store
            .create_product(new_product("Empty Box", 100, "", 0))
            .unwrap();
        assert!(!store.get_product(id).unwrap().in_stock);
    }

    #[test]
    fn create_rejects_invalid_input() {
        let store = test_store();
        assert!(matches!(
            store.create_product(new_product("", 100, "", 1)),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_product(new_product("Pen", -1, "", 1)),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_product(new_product("Pen", 1, "", -1)),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn create_truncates_long_description() {
        let store = test_store();
        let mut product = new_product("Pen", 100, "", 1);
        product.description = "é".repeat(200);
        let id = store.create_product(product).unwrap();

        let stored = store.get_product(id).unwrap();
        assert_eq!(stored.description.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn duplicate_name_fails_even_after_soft_delete() {
        let store = test_store();
        let id = store.create_product(new_product("Pen", 100, "", 1)).unwrap();

        assert!(matches!(
            store.create_product(new_product("Pen", 200, "", 1)),
            Err(StoreError::Duplicate(_))
        ));

        store.delete_product(id).unwrap();
        assert!(matches!(
            store.create_product(new_product("Pen", 200, "", 1)),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn get_missing_product_is_not_found() {
        let store = test_store();
        assert!(matches!(
            store.get_product(42),
            Err(StoreError::NotFound("product"))
        ));
    }

    #[test]
    fn list_filters_by_exact_category() {
        let store = test_store();
        store.create_product(new_product("Pen", 100, "office", 1)).unwrap();
        store.create_product(new_product("Desk", 100, "furniture", 1)).unwrap();
        store.create_product(new_product("Stapler", 100, "office", 1)).unwrap();

        assert_eq!(store.list_products(None).unwrap().len(), 3);
        let office = store.list_products(Some("office")).unwrap();
        assert_eq!(office.len(), 2);
        assert!(office.iter().all(|p| p.category == "office"));
        assert!(store.list_products(Some("offic")).unwrap().is_empty());
    }

    #[test]
    fn category_filter_is_not_interpolated() {
        let store = test_store();
        store.create_product(new_product("Pen", 100, "office", 1)).unwrap();

        let products = store.list_products(Some("' OR '1'='1")).unwrap();
        assert!(products.is_empty());
    }

    #[test]
    fn search_matches_name_and_description_ordered_by_name() {
        let store = test_store();
        store.create_product(new_product("Zebra Pen", 100, "", 1)).unwrap();
        let mut lamp = new_product("Lamp", 100, "", 1);
        lamp.description = "Bright pen-sized light".to_string();
        store.create_product(lamp).unwrap();
        store.create_product(new_product("Desk", 100, "", 1)).unwrap();

        let names: Vec<String> = store
            .search_products("pen")
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Lamp", "Zebra Pen"]);
    }

    #[test]
    fn soft_deleted_products_are_hidden() {
        let store = test_store();
        let id = store.create_product(new_product("Pen", 100, "office", 3)).unwrap();
        store.delete_product(id).unwrap();

        assert!(matches!(store.get_product(id), Err(StoreError::NotFound(_))));
        assert!(store.list_products(None).unwrap().is_empty());
        assert!(store.list_products(Some("office")).unwrap().is_empty());
        assert!(store.search_products("Pen").unwrap().is_empty());
        assert!(store.list_categories().unwrap().is_empty());
        assert!(matches!(
            store.update_product(id, new_product("Pen", 100, "office", 3)),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.decrement_quantity(id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_product(id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn soft_delete_keeps_row() {
        let store = test_store();
        let id = store.create_product(new_product("Pen", 100, "", 1)).unwrap();
        store.delete_product(id).unwrap();

        let deleted_at: Option<String> = store
            .conn()
            .query_row(
                "SELECT deleted_at FROM products WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert!(deleted_at.is_some());
    }

    #[test]
    fn update_overwrites_fields_and_bumps_timestamp() {
        let store = test_store();
        let id = store.create_product(new_product("Pen", 100, "office", 1)).unwrap();
        let before = store.get_product(id).unwrap();

        std::thread::sleep(Duration::from_millis(5));
        store
            .update_product(id, new_product("Gel Pen", 250, "stationery", 0))
            .unwrap();

        let after = store.get_product(id).unwrap();
        assert_eq!(after.name, "Gel Pen");
        assert_eq!(after.price_cents, 250);
        assert_eq!(after.category, "stationery");
        assert_eq!(after.quantity, 0);
        assert!(!after.in_stock);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn update_to_taken_name_is_duplicate() {
        let store = test_store();
        store.create_product(new_product("Pen", 100, "", 1)).unwrap();
        let id = store.create_product(new_product("Ink", 100, "", 1)).unwrap();

        assert!(matches!(
            store.update_product(id, new_product("Pen", 100, "", 1)),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn decrement_reduces_stock_until_empty() {
        let store = test_store();
        let id = store.create_product(new_product("Pen", 150, "office", 2)).unwrap();

        assert_eq!(store.decrement_quantity(id).unwrap(), 1);
        assert!(store.get_product(id).unwrap().in_stock);

        assert_eq!(store.decrement_quantity(id).unwrap(), 0);
        let product = store.get_product(id).unwrap();
        assert_eq!(product.quantity, 0);
        assert!(!product.in_stock);

        assert!(matches!(store.decrement_quantity(id), Err(StoreError::OutOfStock)));
        assert_eq!(store.get_product(id).unwrap().quantity, 0);
    }

    #[test]
    fn decrement_missing_product_is_not_found() {
        let store = test_store();
        assert!(matches!(store.decrement_quantity(9), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn concurrent_decrements_do_not_lose_updates() {
        let store = Arc::new(test_store());
        let id = store.create_product(new_product("Pen", 150, "", 5)).unwrap();

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.decrement_quantity(id).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 5);
        let product = store.get_product(id).unwrap();
        assert_eq!(product.quantity, 0);
        assert!(!product.in_stock);
    }

    #[test]
    fn concurrent_readers_never_cache_a_pre_write_snapshot() {
        let cache = ProductCache::new(Duration::from_secs(60));
        let store = Arc::new(Store::open_in_memory(cache).unwrap());

        for round in 0..50 {
            let id = store
                .create_product(new_product(&format!("Pen {round}"), 150, "", 5))
                .unwrap();

            let readers: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    std::thread::spawn(move || {
                        for _ in 0..20 {
                            store.cache().invalidate(id);
                            store.get_product(id).unwrap();
                        }
                    })
                })
                .collect();

            assert_eq!(store.decrement_quantity(id).unwrap(), 4);
            for reader in readers {
                reader.join().unwrap();
            }
            assert_eq!(store.get_product(id).unwrap().quantity, 4, "round {round}");

            store
                .update_product(id, new_product(&format!("Pen {round}"), 150, "", 9))
                .unwrap();
            assert_eq!(store.get_product(id).unwrap().quantity, 9, "round {round}");
        }
    }

    #[test]
    fn cache_serves_stale_snapshot_after_out_of_band_write() {
        let store = Store::open_in_memory(ProductCache::new(Duration::from_millis(200))).unwrap();
        let id = store.create_product(new_product("Pen", 150, "", 2)).unwrap();
        assert_eq!(store.get_product(id).unwrap().quantity, 2);

        // Write that bypasses the store entirely
        store
            .conn()
            .execute("UPDATE products SET quantity = 7 WHERE id = ?1", params![id])
            .unwrap();

        assert_eq!(store.get_product(id).unwrap().quantity, 2);

        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(store.get_product(id).unwrap().quantity, 7);
    }

    #[test]
    fn store_writes_invalidate_cache() {
        let store = test_store();
        let id = store.create_product(new_product("Pen", 150, "", 2)).unwrap();
        store.get_product(id).unwrap();

        store.decrement_quantity(id).unwrap();
        assert_eq!(store.get_product(id).unwrap().quantity, 1);

        store.update_product(id, new_product("Pen", 175, "", 4)).unwrap();
        assert_eq!(store.get_product(id).unwrap().price_cents, 175);

        store.delete_product(id).unwrap();
        assert!(store.get_product(id).is_err());
    }
}
