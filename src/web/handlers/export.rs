//! CSV/JSON export and CSV import endpoints

use crate::csv_io::{import_products, write_products};
use crate::web::error::ApiError;
use crate::web::AppState;
use axum::body::to_bytes;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use std::sync::Arc;

use super::products::ListParams;

/// Upper bound on an uploaded CSV file
const MAX_IMPORT_BYTES: usize = 10 * 1024 * 1024;

fn attachment(extension: &str) -> String {
    format!(
        "attachment; filename=products_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        extension
    )
}

/// GET /products/export?category=
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let category = params.category.as_deref().filter(|c| !c.is_empty());
    let products = state.store.list_products(category)?;

    let mut body = Vec::new();
    write_products(&mut body, &products)
        .map_err(|e| ApiError::Internal(format!("CSV export failed: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, attachment("csv")),
        ],
        body,
    )
        .into_response())
}

/// GET /products/export/json
pub async fn export_json(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let products = state.store.list_products(None)?;
    let body = serde_json::to_vec_pretty(&products)
        .map_err(|e| ApiError::Internal(format!("JSON export failed: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, attachment("json")),
        ],
        body,
    )
        .into_response())
}

/// Pull the `file` field out of a multipart upload
async fn multipart_file(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read uploaded file: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read uploaded file: {e}")))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::bad_request("failed to read uploaded file: missing file field"))
}

/// POST /products/import: a `text/csv` body or a multipart `file` field
pub async fn import(State(state): State<Arc<AppState>>, request: Request) -> Result<Response, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let data = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        multipart_file(multipart).await?
    } else if content_type.starts_with("text/csv") {
        to_bytes(request.into_body(), MAX_IMPORT_BYTES)
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read request body: {e}")))?
            .to_vec()
    } else {
        return Err(ApiError::bad_request("expected CSV content"));
    };

    let summary = import_products(&state.store, data.as_slice())?;
    let status = if summary.skipped > 0 {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    Ok((status, Json(summary)).into_response())
}
