//! Review handlers and the product details view

use super::{created, parse_json, status};
use crate::models::{ProductWithReviews, Review, ReviewRequest};
use crate::web::error::ApiError;
use crate::web::AppState;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;

fn owned_review(state: &AppState, product_id: i64, review_id: i64) -> Result<Review, ApiError> {
    let review = state.store.get_review(review_id)?;
    if review.product_id != product_id {
        return Err(ApiError::not_found("review not found"));
    }
    Ok(review)
}

pub fn list(state: &AppState, product_id: i64) -> Result<Json<Vec<Review>>, ApiError> {
    Ok(Json(state.store.list_reviews(product_id)?))
}

pub fn create(state: &AppState, product_id: i64, body: &[u8]) -> Result<impl IntoResponse, ApiError> {
    let request: ReviewRequest = parse_json(body)?;
    let review = request.validate().map_err(ApiError::BadRequest)?;
    let id = state.store.create_review(product_id, review)?;
    log::info!("Review {} submitted for product {}", id, product_id);
    Ok(created(id))
}

pub fn delete(state: &AppState, product_id: i64, review_id: i64) -> Result<StatusCode, ApiError> {
    owned_review(state, product_id, review_id)?;
    state.store.delete_review(review_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn approve(state: &AppState, product_id: i64, review_id: i64) -> Result<Json<Value>, ApiError> {
    owned_review(state, product_id, review_id)?;
    state.store.approve_review(review_id)?;
    Ok(status("approved"))
}

/// GET /products/{id}/details
pub fn details(state: &AppState, product_id: i64) -> Result<Json<ProductWithReviews>, ApiError> {
    let product = state.store.get_product(product_id)?;
    let reviews = state.store.list_reviews(product_id)?;
    let (average_rating, review_count) = state.store.get_average_rating(product_id)?;
    Ok(Json(ProductWithReviews {
        product,
        reviews,
        average_rating,
        review_count,
    }))
}
