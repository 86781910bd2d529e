//! Product CRUD, purchase, search and category handlers

use super::{created, parse_json, status};
use crate::models::{Product, ProductRequest};
use crate::web::error::ApiError;
use crate::web::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// GET /products?category=
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let category = params.category.as_deref().filter(|c| !c.is_empty());
    Ok(Json(state.store.list_products(category)?))
}

/// POST /products
pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: ProductRequest = parse_json(&body)?;
    let product = request.validate().map_err(ApiError::BadRequest)?;
    let id = state.store.create_product(product)?;
    log::info!("Created product {}", id);
    Ok(created(id))
}

/// GET /products/{id}
pub fn get(state: &AppState, id: i64) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.store.get_product(id)?))
}

/// PUT /products/{id}; responds with the stored product
pub fn update(state: &AppState, id: i64, body: &[u8]) -> Result<Json<Product>, ApiError> {
    let request: ProductRequest = parse_json(body)?;
    let product = request.validate().map_err(ApiError::BadRequest)?;
    state.store.update_product(id, product)?;
    Ok(Json(state.store.get_product(id)?))
}

/// DELETE /products/{id} (soft delete)
pub fn delete(state: &AppState, id: i64) -> Result<StatusCode, ApiError> {
    state.store.delete_product(id)?;
    log::info!("Deleted product {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/{id}/purchase
pub fn purchase(state: &AppState, id: i64) -> Result<Json<Value>, ApiError> {
    let product = state.store.get_product(id)?;
    if product.quantity <= 0 {
        return Err(ApiError::Conflict("out of stock".to_string()));
    }
    let remaining = state.store.decrement_quantity(id)?;
    log::info!("Purchased product {} ({} left)", id, remaining);
    Ok(status("purchased"))
}

/// GET /search?q=
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("query parameter 'q' is required"))?;
    Ok(Json(state.store.search_products(query)?))
}

/// GET /categories
pub async fn categories(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.list_categories()?))
}
