//! Variant handlers under `/products/{id}/variants` and `/sku/{sku}`

use super::{created, parse_json, status};
use crate::error::StoreError;
use crate::models::{Variant, VariantInventory, VariantRequest};
use crate::web::error::ApiError;
use crate::web::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;
use std::sync::Arc;

/// Fetch a variant, treating one filed under another product as missing
fn owned_variant(state: &AppState, product_id: i64, variant_id: i64) -> Result<Variant, ApiError> {
    let variant = state.store.get_variant(variant_id)?;
    if variant.product_id != product_id {
        return Err(ApiError::not_found("variant not found"));
    }
    Ok(variant)
}

pub fn list(state: &AppState, product_id: i64) -> Result<Json<Vec<Variant>>, ApiError> {
    Ok(Json(state.store.list_variants(product_id)?))
}

pub fn create(state: &AppState, product_id: i64, body: &[u8]) -> Result<impl IntoResponse, ApiError> {
    let request: VariantRequest = parse_json(body)?;
    let variant = request.validate().map_err(ApiError::BadRequest)?;
    let id = state.store.create_variant(product_id, variant)?;
    log::info!("Created variant {} for product {}", id, product_id);
    Ok(created(id))
}

pub fn get(state: &AppState, product_id: i64, variant_id: i64) -> Result<Json<Variant>, ApiError> {
    Ok(Json(owned_variant(state, product_id, variant_id)?))
}

pub fn update(
    state: &AppState,
    product_id: i64,
    variant_id: i64,
    body: &[u8],
) -> Result<Json<Variant>, ApiError> {
    owned_variant(state, product_id, variant_id)?;
    let request: VariantRequest = parse_json(body)?;
    let variant = request.validate().map_err(ApiError::BadRequest)?;
    state.store.update_variant(variant_id, variant)?;
    Ok(Json(state.store.get_variant(variant_id)?))
}

pub fn delete(state: &AppState, product_id: i64, variant_id: i64) -> Result<StatusCode, ApiError> {
    owned_variant(state, product_id, variant_id)?;
    state.store.delete_variant(variant_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/{id}/variants/{vid}/purchase
pub fn purchase(state: &AppState, product_id: i64, variant_id: i64) -> Result<Json<Value>, ApiError> {
    let variant = owned_variant(state, product_id, variant_id)?;
    let out_of_stock = || ApiError::Conflict("variant out of stock".to_string());
    if variant.quantity <= 0 {
        return Err(out_of_stock());
    }
    match state.store.decrement_variant_quantity(variant_id) {
        Ok(remaining) => {
            log::info!("Purchased variant {} ({} left)", variant.sku, remaining);
            Ok(status("purchased"))
        }
        Err(StoreError::OutOfStock) => Err(out_of_stock()),
        Err(err) => Err(err.into()),
    }
}

pub fn inventory(state: &AppState, product_id: i64) -> Result<Json<VariantInventory>, ApiError> {
    Ok(Json(state.store.get_variant_inventory(product_id)?))
}

/// GET /sku/{sku}
pub async fn by_sku(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
) -> Result<Json<Variant>, ApiError> {
    let sku = sku.trim();
    if sku.is_empty() {
        return Err(ApiError::bad_request("sku is required"));
    }
    Ok(Json(state.store.get_variant_by_sku(sku)?))
}
