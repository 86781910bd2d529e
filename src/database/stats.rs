//! Catalog aggregates over active products

use super::Store;
use crate::error::Result;
use crate::models::{CategoryStat, DashboardStats};

impl Store {
    /// (total, in stock, out of stock) over active products
    pub fn product_counts(&self) -> Result<(i64, i64, i64)> {
        let counts = self.conn().query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN in_stock = 1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN in_stock = 0 THEN 1 ELSE 0 END), 0)
             FROM products WHERE deleted_at IS NULL",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(counts)
    }

    /// Mean product price in cents; 0 for an empty catalog
    pub fn average_product_price_cents(&self) -> Result<f64> {
        let average = self.conn().query_row(
            "SELECT COALESCE(AVG(price_cents), 0.0) FROM products WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(average)
    }

    /// Sum of product quantities
    pub fn total_inventory(&self) -> Result<i64> {
        let total = self.conn().query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM products WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Per-category aggregates, largest categories first
    pub fn category_stats(&self) -> Result<Vec<CategoryStat>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(
            "SELECT category, COUNT(*), AVG(price_cents), SUM(quantity),
                    SUM(CASE WHEN in_stock = 1 THEN 1 ELSE 0 END)
             FROM products
             WHERE deleted_at IS NULL
             GROUP BY category
             ORDER BY COUNT(*) DESC, category ASC",
        )?;
        let stats = stmt
            .query_map([], |row| {
                Ok(CategoryStat {
                    category: row.get(0)?,
                    product_count: row.get(1)?,
                    average_price: row.get(2)?,
                    total_inventory: row.get(3)?,
                    in_stock_count: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let (total_products, total_in_stock, total_out_of_stock) = self.product_counts()?;
        Ok(DashboardStats {
            total_products,
            total_in_stock,
            total_out_of_stock,
            average_price: self.average_product_price_cents()?,
            total_inventory: self.total_inventory()?,
            total_reviews: self.total_review_count()?,
            categories: self.category_stats()?,
        })
    }
}
