//! Request handlers, grouped by resource
//!
//! Handlers reached through the nested dispatcher are plain functions over
//! `&AppState`; the rest are axum handlers mounted directly in the router.

pub mod export;
pub mod pages;
pub mod products;
pub mod reviews;
pub mod stats;
pub mod variants;

use super::error::ApiError;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Decode a JSON request body
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        log::debug!("Rejected request body: {}", e);
        ApiError::bad_request("invalid request body")
    })
}

/// `201 {"id": n}`
pub(crate) fn created(id: i64) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

pub(crate) fn status(message: &str) -> Json<Value> {
    Json(json!({ "status": message }))
}
