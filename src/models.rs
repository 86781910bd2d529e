//! Catalog data model
//!
//! Prices are stored as integer cents everywhere inside the crate and only
//! converted to currency units at the JSON/CSV boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Variant attributes (e.g. `{"color": "black"}`), kept sorted for stable output
pub type Attributes = BTreeMap<String, String>;

/// Convert a decimal currency amount to cents, rounding to the nearest cent
pub fn price_to_cents(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

/// Convert cents to a decimal currency amount
pub fn cents_to_price(cents: i64) -> f64 {
    cents as f64 / 100.0
}

fn cents_as_price<S: Serializer>(cents: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(cents_to_price(*cents))
}

fn avg_cents_as_price<S: Serializer>(cents: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(cents / 100.0)
}

// ── Stored entities ────────────────────────────────────────────────────────

/// A catalog product as stored in the `products` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(rename = "price", serialize_with = "cents_as_price")]
    pub price_cents: i64,
    pub category: String,
    pub in_stock: bool,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn price(&self) -> f64 {
        cents_to_price(self.price_cents)
    }
}

/// A purchasable variant of a product (size, color, ...)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variant {
    pub id: i64,
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    #[serde(rename = "price", serialize_with = "cents_as_price")]
    pub price_cents: i64,
    pub quantity: i64,
    pub in_stock: bool,
    pub attributes: Attributes,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A customer review; not published until approved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub id: i64,
    pub product_id: i64,
    pub author: String,
    pub rating: i64,
    pub comment: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub product_id: i64,
    pub action: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

// ── Store inputs ───────────────────────────────────────────────────────────

/// Mutable product fields for create and full-row update.
///
/// `in_stock` is not part of the input: the store derives it from `quantity`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub category: String,
    pub quantity: i64,
}

/// Mutable variant fields for create and full-row update
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewVariant {
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub quantity: i64,
    pub attributes: Attributes,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub author: String,
    pub rating: i64,
    pub comment: String,
}

// ── Read models ────────────────────────────────────────────────────────────

/// Stock summary across all variants of one product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantInventory {
    pub product_id: i64,
    pub variant_count: i64,
    pub total_stock: i64,
    pub in_stock_count: i64,
}

/// Per-category aggregates over active products
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStat {
    pub category: String,
    pub product_count: i64,
    #[serde(serialize_with = "avg_cents_as_price")]
    pub average_price: f64,
    pub total_inventory: i64,
    pub in_stock_count: i64,
}

/// Catalog-wide dashboard numbers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_products: i64,
    pub total_in_stock: i64,
    pub total_out_of_stock: i64,
    #[serde(serialize_with = "avg_cents_as_price")]
    pub average_price: f64,
    pub total_inventory: i64,
    pub total_reviews: i64,
    pub categories: Vec<CategoryStat>,
}

/// Product with its reviews and rating summary (`GET /products/:id/details`)
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithReviews {
    pub product: Product,
    pub reviews: Vec<Review>,
    pub average_rating: f64,
    pub review_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub uptime: String,
    pub version: String,
}

// ── Request bodies ─────────────────────────────────────────────────────────

/// Body of `POST /products` and `PUT /products/:id`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    /// Accepted for compatibility; stock state is derived from `quantity`
    pub in_stock: bool,
    pub quantity: i64,
}

impl ProductRequest {
    /// Validate field ranges and convert the price to cents
    pub fn validate(self) -> Result<NewProduct, String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.price < 0.0 || !self.price.is_finite() {
            return Err("price must be non-negative".to_string());
        }
        if self.quantity < 0 {
            return Err("quantity must be non-negative".to_string());
        }
        Ok(NewProduct {
            name: self.name,
            description: self.description,
            price_cents: price_to_cents(self.price),
            category: self.category,
            quantity: self.quantity,
        })
    }
}

/// Body of `POST /products/:id/variants` and `PUT /products/:id/variants/:vid`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VariantRequest {
    pub sku: String,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    /// Accepted for compatibility; stock state is derived from `quantity`
    pub in_stock: bool,
    pub attributes: Option<Attributes>,
    pub sort_order: i64,
}

impl VariantRequest {
    pub fn validate(self) -> Result<NewVariant, String> {
        if self.sku.trim().is_empty() {
            return Err("sku is required".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.price < 0.0 || !self.price.is_finite() {
            return Err("price must be non-negative".to_string());
        }
        if self.quantity < 0 {
            return Err("quantity must be non-negative".to_string());
        }
        Ok(NewVariant {
            sku: self.sku,
            name: self.name,
            price_cents: price_to_cents(self.price),
            quantity: self.quantity,
            attributes: self.attributes.unwrap_or_default(),
            sort_order: self.sort_order,
        })
    }
}

/// Body of `POST /products/:id/reviews`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReviewRequest {
    pub author: String,
    pub rating: i64,
    pub comment: String,
}

impl ReviewRequest {
    pub fn validate(self) -> Result<NewReview, String> {
        if self.author.trim().is_empty() {
            return Err("author is required".to_string());
        }
        if !(1..=5).contains(&self.rating) {
            return Err("rating must be between 1 and 5".to_string());
        }
        Ok(NewReview {
            author: self.author,
            rating: self.rating,
            comment: self.comment,
        })
    }
}
