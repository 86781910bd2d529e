//! Review storage and rating aggregates

use super::variants::product_is_active;
use super::Store;
use crate::error::{Result, StoreError};
use crate::models::{NewReview, Review};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;

const REVIEW_COLUMNS: &str = "id, product_id, author, rating, comment, approved, created_at";

/// Default number of rows returned by [`Store::recent_reviews`]
const DEFAULT_RECENT_REVIEWS: i64 = 10;

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        product_id: row.get(1)?,
        author: row.get(2)?,
        rating: row.get(3)?,
        comment: row.get(4)?,
        approved: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Store {
    /// Add an unapproved review to an active product, returning its id
    pub fn create_review(&self, product_id: i64, review: NewReview) -> Result<i64> {
        if review.author.trim().is_empty() {
            return Err(StoreError::validation("author is required"));
        }
        if !(1..=5).contains(&review.rating) {
            return Err(StoreError::validation("rating must be between 1 and 5"));
        }

        let conn = self.conn();
        if !product_is_active(&conn, product_id)? {
            return Err(StoreError::NotFound("product"));
        }
        conn.execute(
            "INSERT INTO reviews (product_id, author, rating, comment, approved, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                product_id,
                review.author,
                review.rating,
                review.comment,
                Utc::now()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All reviews of a product, newest first
    pub fn list_reviews(&self, product_id: i64) -> Result<Vec<Review>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE product_id = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let reviews = stmt
            .query_map(params![product_id], review_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reviews)
    }

    pub fn get_review(&self, review_id: i64) -> Result<Review> {
        self.conn()
            .query_row(
                &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?1"),
                params![review_id],
                review_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound("review"))
    }

    pub fn delete_review(&self, review_id: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM reviews WHERE id = ?1", params![review_id])?;
        if changed == 0 {
            return Err(StoreError::NotFound("review"));
        }
        Ok(())
    }

    /// Mark a review as approved. Approving twice is not an error.
    pub fn approve_review(&self, review_id: i64) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE reviews SET approved = 1 WHERE id = ?1",
            params![review_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("review"));
        }
        Ok(())
    }

    /// Mean rating and review count for a product; `(0.0, 0)` without reviews.
    ///
    /// Unapproved reviews are counted.
    pub fn get_average_rating(&self, product_id: i64) -> Result<(f64, i64)> {
        let (average, count) = self.conn().query_row(
            "SELECT COALESCE(AVG(rating), 0.0), COUNT(*) FROM reviews WHERE product_id = ?1",
            params![product_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((average, count))
    }

    /// Latest reviews across all products; a non-positive limit means 10
    pub fn recent_reviews(&self, limit: i64) -> Result<Vec<Review>> {
        let limit = if limit <= 0 {
            DEFAULT_RECENT_REVIEWS
        } else {
            limit
        };
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))?;
        let reviews = stmt
            .query_map(params![limit], review_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reviews)
    }

    /// Number of reviews per product id (products without reviews are absent)
    pub fn review_counts_by_product(&self) -> Result<HashMap<i64, i64>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare_cached("SELECT product_id, COUNT(*) FROM reviews GROUP BY product_id")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(counts)
    }

    pub fn total_review_count(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{test_product, test_store};

    fn review(author: &str, rating: i64) -> NewReview {
        NewReview {
            author: author.to_string(),
            rating,
            comment: format!("{author} says {rating}"),
        }
    }

    fn store_with_product() -> (Store, i64) {
        let store = test_store();
        let id = store
            .create_product(test_product("Pen", 150, "office", 2))
            .unwrap();
        (store, id)
    }

    #[test]
    fn new_reviews_start_unapproved() {
        let (store, product_id) = store_with_product();
        let id = store.create_review(product_id, review("Ann", 4)).unwrap();

        let stored = store.get_review(id).unwrap();
        assert_eq!(stored.product_id, product_id);
        assert_eq!(stored.rating, 4);
        assert!(!stored.approved);
    }

    #[test]
    fn rating_out_of_range_is_rejected() {
        let (store, product_id) = store_with_product();
        for rating in [0, 6] {
            assert!(matches!(
                store.create_review(product_id, review("Ann", rating)),
                Err(StoreError::Validation(_))
            ));
        }
        assert_eq!(store.total_review_count().unwrap(), 0);
    }

    #[test]
    fn review_requires_active_product() {
        let (store, product_id) = store_with_product();
        assert!(matches!(
            store.create_review(42, review("Ann", 3)),
            Err(StoreError::NotFound("product"))
        ));

        store.delete_product(product_id).unwrap();
        assert!(matches!(
            store.create_review(product_id, review("Ann", 3)),
            Err(StoreError::NotFound("product"))
        ));
    }

    #[test]
    fn list_is_newest_first() {
        let (store, product_id) = store_with_product();
        let first = store.create_review(product_id, review("Ann", 4)).unwrap();
        let second = store.create_review(product_id, review("Bob", 2)).unwrap();

        let ids: Vec<i64> = store
            .list_reviews(product_id)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn approve_is_idempotent() {
        let (store, product_id) = store_with_product();
        let id = store.create_review(product_id, review("Ann", 4)).unwrap();

        store.approve_review(id).unwrap();
        store.approve_review(id).unwrap();
        assert!(store.get_review(id).unwrap().approved);

        assert!(matches!(
            store.approve_review(999),
            Err(StoreError::NotFound("review"))
        ));
    }

    #[test]
    fn delete_removes_review() {
        let (store, product_id) = store_with_product();
        let id = store.create_review(product_id, review("Ann", 4)).unwrap();

        store.delete_review(id).unwrap();
        assert!(matches!(store.get_review(id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_review(id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn average_rating_includes_unapproved() {
        let (store, product_id) = store_with_product();
        assert_eq!(store.get_average_rating(product_id).unwrap(), (0.0, 0));

        store.create_review(product_id, review("Ann", 4)).unwrap();
        let id = store.create_review(product_id, review("Bob", 5)).unwrap();
        store.approve_review(id).unwrap();

        let (average, count) = store.get_average_rating(product_id).unwrap();
        assert!((average - 4.5).abs() < f64::EPSILON);
        assert_eq!(count, 2);
    }

    #[test]
    fn recent_reviews_respects_limit() {
        let (store, product_id) = store_with_product();
        for i in 0..12 {
            store
                .create_review(product_id, review(&format!("user{i}"), 3))
                .unwrap();
        }

        assert_eq!(store.recent_reviews(3).unwrap().len(), 3);
        assert_eq!(store.recent_reviews(0).unwrap().len(), 10);
        assert_eq!(store.recent_reviews(-5).unwrap().len(), 10);
    }

    #[test]
    fn counts_grouped_by_product() {
        let (store, pen) = store_with_product();
        let ink = store
            .create_product(test_product("Ink", 300, "office", 1))
            .unwrap();
        store.create_review(pen, review("Ann", 4)).unwrap();
        store.create_review(pen, review("Bob", 3)).unwrap();
        store.create_review(ink, review("Cat", 5)).unwrap();

        let counts = store.review_counts_by_product().unwrap();
        assert_eq!(counts.get(&pen), Some(&2));
        assert_eq!(counts.get(&ink), Some(&1));
        assert_eq!(store.total_review_count().unwrap(), 3);
    }
}
