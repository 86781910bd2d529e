//! Server-rendered HTML pages

use crate::models::{CategoryStat, Product, Variant};
use crate::web::error::ApiError;
use crate::web::AppState;
use askama::Template;
use axum::extract::State;
use axum::response::Html;
use std::sync::Arc;

fn money(cents: f64) -> String {
    format!("${:.2}", cents / 100.0)
}

/// Product fields preformatted for display
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: String,
    pub quantity: i64,
    pub in_stock: bool,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        Self {
            price: money(p.price_cents as f64),
            id: p.id,
            name: p.name,
            description: p.description,
            category: p.category,
            quantity: p.quantity,
            in_stock: p.in_stock,
        }
    }
}

pub struct VariantView {
    pub sku: String,
    pub name: String,
    pub price: String,
    pub quantity: i64,
    pub in_stock: bool,
    pub attributes: String,
}

impl From<Variant> for VariantView {
    fn from(v: Variant) -> Self {
        let attributes = v
            .attributes
            .iter()
            .map(|(k, val)| format!("{k}: {val}"))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            price: money(v.price_cents as f64),
            sku: v.sku,
            name: v.name,
            quantity: v.quantity,
            in_stock: v.in_stock,
            attributes,
        }
    }
}

pub struct CategoryView {
    pub category: String,
    pub product_count: i64,
    pub average_price: String,
    pub total_inventory: i64,
    pub in_stock_percent: String,
}

impl From<CategoryStat> for CategoryView {
    fn from(c: CategoryStat) -> Self {
        let percent = if c.product_count == 0 {
            0.0
        } else {
            c.in_stock_count as f64 * 100.0 / c.product_count as f64
        };
        Self {
            category: if c.category.is_empty() {
                "(none)".to_string()
            } else {
                c.category
            },
            product_count: c.product_count,
            average_price: money(c.average_price),
            total_inventory: c.total_inventory,
            in_stock_percent: format!("{percent:.0}%"),
        }
    }
}

#[derive(Template)]
#[template(path = "product_list.html")]
pub struct ProductListPage {
    pub title: String,
    pub products: Vec<ProductView>,
}

#[derive(Template)]
#[template(path = "new_product.html")]
pub struct NewProductPage {
    pub title: String,
}

#[derive(Template)]
#[template(path = "product_detail.html")]
pub struct ProductDetailPage {
    pub title: String,
    pub product: ProductView,
    pub variants: Vec<VariantView>,
}

#[derive(Template)]
#[template(path = "stats.html")]
pub struct StatsPage {
    pub title: String,
    pub total_products: i64,
    pub total_in_stock: i64,
    pub total_out_of_stock: i64,
    pub average_price: String,
    pub total_inventory: i64,
    pub total_reviews: i64,
    pub categories: Vec<CategoryView>,
}

fn render<T: Template>(page: T) -> Result<Html<String>, ApiError> {
    Ok(Html(page.render()?))
}

/// GET /
pub async fn product_list(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let products = state.store.list_products(None)?;
    render(ProductListPage {
        title: "Products".to_string(),
        products: products.into_iter().map(ProductView::from).collect(),
    })
}

/// GET /new
pub async fn new_product() -> Result<Html<String>, ApiError> {
    render(NewProductPage {
        title: "New Product".to_string(),
    })
}

/// GET /products/{id} with `Accept: text/html`
pub fn product_detail(state: &AppState, id: i64) -> Result<Html<String>, ApiError> {
    let product = state.store.get_product(id)?;
    // Variants are decoration here; a failure should not hide the product
    let variants = state.store.list_variants(id).unwrap_or_else(|e| {
        log::warn!("Failed to load variants for product {}: {}", id, e);
        Vec::new()
    });
    render(ProductDetailPage {
        title: product.name.clone(),
        product: product.into(),
        variants: variants.into_iter().map(VariantView::from).collect(),
    })
}

/// GET /stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let stats = state.store.dashboard_stats()?;
    render(StatsPage {
        title: "Dashboard".to_string(),
        total_products: stats.total_products,
        total_in_stock: stats.total_in_stock,
        total_out_of_stock: stats.total_out_of_stock,
        average_price: money(stats.average_price),
        total_inventory: stats.total_inventory,
        total_reviews: stats.total_reviews,
        categories: stats.categories.into_iter().map(CategoryView::from).collect(),
    })
}
