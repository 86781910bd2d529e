//! Variant queries and mutations

use super::Store;
use crate::error::{Result, StoreError};
use crate::models::{Attributes, NewVariant, Variant, VariantInventory};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

const VARIANT_COLUMNS: &str = "id, product_id, sku, name, price_cents, quantity, in_stock, \
     attributes, sort_order, created_at, updated_at";

fn variant_from_row(row: &Row<'_>) -> rusqlite::Result<Variant> {
    let raw: String = row.get(7)?;
    let attributes: Attributes = if raw.is_empty() {
        Attributes::new()
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?
    };

    Ok(Variant {
        id: row.get(0)?,
        product_id: row.get(1)?,
        sku: row.get(2)?,
        name: row.get(3)?,
        price_cents: row.get(4)?,
        quantity: row.get(5)?,
        in_stock: row.get(6)?,
        attributes,
        sort_order: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn checked(variant: &NewVariant) -> Result<()> {
    if variant.sku.trim().is_empty() {
        return Err(StoreError::validation("sku is required"));
    }
    if variant.name.trim().is_empty() {
        return Err(StoreError::validation("name is required"));
    }
    if variant.price_cents < 0 {
        return Err(StoreError::validation("price must be non-negative"));
    }
    if variant.quantity < 0 {
        return Err(StoreError::validation("quantity must be non-negative"));
    }
    Ok(())
}

/// True if the product exists and is not soft-deleted
pub(super) fn product_is_active(conn: &Connection, product_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM products WHERE id = ?1 AND deleted_at IS NULL)",
        params![product_id],
        |row| row.get(0),
    )
}

impl Store {
    /// Insert a variant under an active product, returning its id
    pub fn create_variant(&self, product_id: i64, variant: NewVariant) -> Result<i64> {
        checked(&variant)?;
        let attributes = serde_json::to_string(&variant.attributes)?;
        let now = Utc::now();

        let conn = self.conn();
        if !product_is_active(&conn, product_id)? {
            return Err(StoreError::NotFound("product"));
        }
        conn.execute(
            "INSERT INTO variants
             (product_id, sku, name, price_cents, quantity, in_stock, attributes, sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                product_id,
                variant.sku,
                variant.name,
                variant.price_cents,
                variant.quantity,
                variant.quantity > 0,
                attributes,
                variant.sort_order,
                now
            ],
        )
        .map_err(|e| StoreError::from_write(e, "variant sku"))?;

        Ok(conn.last_insert_rowid())
    }

    /// Variants of a product in display order (sort_order, then id)
    pub fn list_variants(&self, product_id: i64) -> Result<Vec<Variant>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants
             WHERE product_id = ?1
             ORDER BY sort_order ASC, id ASC"
        ))?;
        let variants = stmt
            .query_map(params![product_id], variant_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(variants)
    }

    pub fn get_variant(&self, variant_id: i64) -> Result<Variant> {
        self.conn()
            .query_row(
                &format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE id = ?1"),
                params![variant_id],
                variant_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound("variant"))
    }

    /// Look up a variant by its SKU code
    pub fn get_variant_by_sku(&self, sku: &str) -> Result<Variant> {
        self.conn()
            .query_row(
                &format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE sku = ?1"),
                params![sku],
                variant_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound("variant"))
    }

    /// Overwrite all mutable fields of a variant
    pub fn update_variant(&self, variant_id: i64, variant: NewVariant) -> Result<()> {
        checked(&variant)?;
        let attributes = serde_json::to_string(&variant.attributes)?;

        let changed = self
            .conn()
            .execute(
                "UPDATE variants
                 SET sku = ?1, name = ?2, price_cents = ?3, quantity = ?4, in_stock = ?5,
                     attributes = ?6, sort_order = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    variant.sku,
                    variant.name,
                    variant.price_cents,
                    variant.quantity,
                    variant.quantity > 0,
                    attributes,
                    variant.sort_order,
                    Utc::now(),
                    variant_id
                ],
            )
            .map_err(|e| StoreError::from_write(e, "variant sku"))?;

        if changed == 0 {
            return Err(StoreError::NotFound("variant"));
        }
        Ok(())
    }

    pub fn delete_variant(&self, variant_id: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM variants WHERE id = ?1", params![variant_id])?;
        if changed == 0 {
            return Err(StoreError::NotFound("variant"));
        }
        Ok(())
    }

    /// Remove every variant of a product, returning how many were deleted
    pub fn delete_variants_by_product(&self, product_id: i64) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM variants WHERE product_id = ?1",
            params![product_id],
        )?;
        log::info!("Deleted {} variants of product {}", deleted, product_id);
        Ok(deleted)
    }

    /// Take one unit of variant stock, returning the remaining quantity.
    ///
    /// Same single-statement guard as [`Store::decrement_quantity`].
    pub fn decrement_variant_quantity(&self, variant_id: i64) -> Result<i64> {
        let conn = self.conn();
        let remaining: Option<i64> = conn
            .query_row(
                "UPDATE variants
                 SET quantity = quantity - 1, in_stock = (quantity - 1) > 0, updated_at = ?1
                 WHERE id = ?2 AND quantity > 0
                 RETURNING quantity",
                params![Utc::now(), variant_id],
                |row| row.get(0),
            )
            .optional()?;

        match remaining {
            Some(quantity) => Ok(quantity),
            None => {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS (SELECT 1 FROM variants WHERE id = ?1)",
                    params![variant_id],
                    |row| row.get(0),
                )?;
                if exists {
                    Err(StoreError::OutOfStock)
                } else {
                    Err(StoreError::NotFound("variant"))
                }
            }
        }
    }

    /// Stock summary across the variants of one product
    pub fn get_variant_inventory(&self, product_id: i64) -> Result<VariantInventory> {
        let (variant_count, total_stock, in_stock_count) = self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(quantity), 0),
                    COALESCE(SUM(CASE WHEN in_stock = 1 THEN 1 ELSE 0 END), 0)
             FROM variants WHERE product_id = ?1",
            params![product_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(VariantInventory {
            product_id,
            variant_count,
            total_stock,
            in_stock_count,
        })
    }

    /// Scale the price of every variant of a product, truncating to whole cents.
    ///
    /// Returns the number of variants updated.
    pub fn bulk_update_variant_prices(&self, product_id: i64, multiplier: f64) -> Result<usize> {
        if multiplier < 0.0 || !multiplier.is_finite() {
            return Err(StoreError::validation("multiplier must be non-negative"));
        }
        let changed = self.conn().execute(
            "UPDATE variants SET price_cents = CAST(price_cents * ?1 AS INTEGER), updated_at = ?2
             WHERE product_id = ?3",
            params![multiplier, Utc::now(), product_id],
        )?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{test_product, test_store};

    fn new_variant(sku: &str, quantity: i64, sort_order: i64) -> NewVariant {
        NewVariant {
            sku: sku.to_string(),
            name: format!("Variant {sku}"),
            price_cents: 2499,
            quantity,
            attributes: Attributes::from([("color".to_string(), sku.to_lowercase())]),
            sort_order,
        }
    }

    fn store_with_product() -> (Store, i64) {
        let store = test_store();
        let id = store
            .create_product(test_product("Wireless Mouse", 2499, "electronics", 5))
            .unwrap();
        (store, id)
    }

    #[test]
    fn create_and_get_variant() {
        let (store, product_id) = store_with_product();
        let id = store
            .create_variant(product_id, new_variant("BLK", 3, 1))
            .unwrap();

        let variant = store.get_variant(id).unwrap();
        assert_eq!(variant.product_id, product_id);
        assert_eq!(variant.sku, "BLK");
        assert_eq!(variant.attributes.get("color").map(String::as_str), Some("blk"));
        assert!(variant.in_stock);
    }

    #[test]
    fn create_requires_active_parent() {
        let (store, product_id) = store_with_product();
        assert!(matches!(
            store.create_variant(999, new_variant("X", 1, 0)),
            Err(StoreError::NotFound("product"))
        ));

        store.delete_product(product_id).unwrap();
        assert!(matches!(
            store.create_variant(product_id, new_variant("X", 1, 0)),
            Err(StoreError::NotFound("product"))
        ));
    }

    #[test]
    fn sku_is_globally_unique() {
        let (store, product_id) = store_with_product();
        let other = store
            .create_product(test_product("Keyboard", 8999, "electronics", 1))
            .unwrap();
        store.create_variant(product_id, new_variant("DUP", 1, 0)).unwrap();

        assert!(matches!(
            store.create_variant(other, new_variant("DUP", 1, 0)),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn create_validates_fields() {
        let (store, product_id) = store_with_product();
        let mut variant = new_variant("", 1, 0);
        assert!(matches!(
            store.create_variant(product_id, variant.clone()),
            Err(StoreError::Validation(_))
        ));

        variant.sku = "OK".to_string();
        variant.price_cents = -1;
        assert!(matches!(
            store.create_variant(product_id, variant.clone()),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn list_orders_by_sort_order_then_id() {
        let (store, product_id) = store_with_product();
        let c = store.create_variant(product_id, new_variant("C", 1, 2)).unwrap();
        let a = store.create_variant(product_id, new_variant("A", 1, 1)).unwrap();
        let b = store.create_variant(product_id, new_variant("B", 1, 1)).unwrap();

        let ids: Vec<i64> = store
            .list_variants(product_id)
            .unwrap()
            .iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn lookup_by_sku() {
        let (store, product_id) = store_with_product();
        let id = store.create_variant(product_id, new_variant("WM-BLK", 1, 0)).unwrap();

        assert_eq!(store.get_variant_by_sku("WM-BLK").unwrap().id, id);
        assert!(matches!(
            store.get_variant_by_sku("nope"),
            Err(StoreError::NotFound("variant"))
        ));
    }

    #[test]
    fn update_derives_stock_flag() {
        let (store, product_id) = store_with_product();
        let id = store.create_variant(product_id, new_variant("BLK", 3, 0)).unwrap();

        let mut update = new_variant("BLK-2", 0, 5);
        update.attributes.clear();
        store.update_variant(id, update.clone()).unwrap();

        let variant = store.get_variant(id).unwrap();
        assert_eq!(variant.sku, "BLK-2");
        assert_eq!(variant.sort_order, 5);
        assert!(!variant.in_stock);
        assert!(variant.attributes.is_empty());

        assert!(matches!(
            store.update_variant(999, update),
            Err(StoreError::NotFound("variant"))
        ));
    }

    #[test]
    fn delete_is_hard_delete() {
        let (store, product_id) = store_with_product();
        let id = store.create_variant(product_id, new_variant("BLK", 1, 0)).unwrap();

        store.delete_variant(id).unwrap();
        assert!(matches!(store.get_variant(id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_variant(id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_variants_by_product_removes_all() {
        let (store, product_id) = store_with_product();
        store.create_variant(product_id, new_variant("A", 1, 0)).unwrap();
        store.create_variant(product_id, new_variant("B", 1, 0)).unwrap();

        assert_eq!(store.delete_variants_by_product(product_id).unwrap(), 2);
        assert!(store.list_variants(product_id).unwrap().is_empty());
    }

    #[test]
    fn variant_stock_is_independent_of_product() {
        let (store, product_id) = store_with_product();
        let id = store.create_variant(product_id, new_variant("BLK", 1, 0)).unwrap();

        assert_eq!(store.decrement_variant_quantity(id).unwrap(), 0);
        assert!(!store.get_variant(id).unwrap().in_stock);
        assert!(matches!(
            store.decrement_variant_quantity(id),
            Err(StoreError::OutOfStock)
        ));
        assert_eq!(store.get_variant(id).unwrap().quantity, 0);

        // Parent product stock is untouched
        assert_eq!(store.get_product(product_id).unwrap().quantity, 5);
        assert!(matches!(
            store.decrement_variant_quantity(404),
            Err(StoreError::NotFound("variant"))
        ));
    }

    #[test]
    fn inventory_summarizes_variants() {
        let (store, product_id) = store_with_product();
        store.create_variant(product_id, new_variant("A", 4, 0)).unwrap();
        store.create_variant(product_id, new_variant("B", 0, 0)).unwrap();
        store.create_variant(product_id, new_variant("C", 2, 0)).unwrap();

        let inv = store.get_variant_inventory(product_id).unwrap();
        assert_eq!(inv.variant_count, 3);
        assert_eq!(inv.total_stock, 6);
        assert_eq!(inv.in_stock_count, 2);

        let empty = store.get_variant_inventory(999).unwrap();
        assert_eq!(empty.variant_count, 0);
        assert_eq!(empty.total_stock, 0);
        assert_eq!(empty.in_stock_count, 0);
    }

    #[test]
    fn bulk_price_update_scales_all_variants() {
        let (store, product_id) = store_with_product();
        let a = store.create_variant(product_id, new_variant("A", 1, 0)).unwrap();
        store.create_variant(product_id, new_variant("B", 1, 0)).unwrap();

        assert_eq!(store.bulk_update_variant_prices(product_id, 2.0).unwrap(), 2);
        assert_eq!(store.get_variant(a).unwrap().price_cents, 4998);
        assert!(matches!(
            store.bulk_update_variant_prices(product_id, -1.0),
            Err(StoreError::Validation(_))
        ));
    }
}
