//! Nested resource routing under `/products/{id}/...`
//!
//! The wildcard tail of the path is resolved into a typed [`ProductRoute`]
//! by exact segment shape. Shapes are checked in this order: purchase,
//! reviews, variants, inventory, details, then the bare product id.

use super::error::ApiError;
use super::handlers::{pages, products, reviews, variants};
use super::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductRoute {
    Purchase(i64),
    Reviews(i64),
    Review { product_id: i64, review_id: i64 },
    ApproveReview { product_id: i64, review_id: i64 },
    Variants(i64),
    Variant { product_id: i64, variant_id: i64 },
    PurchaseVariant { product_id: i64, variant_id: i64 },
    Inventory(i64),
    Details(i64),
    Product(i64),
}

fn parse_id(segment: &str, what: &str) -> Result<i64, ApiError> {
    segment
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid {what} id {segment:?}")))
}

impl ProductRoute {
    /// Resolve the path after `/products/`. One trailing slash is tolerated.
    pub fn resolve(rest: &str) -> Result<Self, ApiError> {
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ApiError::not_found("not found"));
        }

        let product = |id: &str| parse_id(id, "product");
        let route = match segments.as_slice() {
            [id, "purchase"] => ProductRoute::Purchase(product(id)?),
            [id, "reviews"] => ProductRoute::Reviews(product(id)?),
            [id, "reviews", rid] => ProductRoute::Review {
                product_id: product(id)?,
                review_id: parse_id(rid, "review")?,
            },
            [id, "reviews", rid, "approve"] => ProductRoute::ApproveReview {
                product_id: product(id)?,
                review_id: parse_id(rid, "review")?,
            },
            [id, "variants"] => ProductRoute::Variants(product(id)?),
            [id, "variants", vid] => ProductRoute::Variant {
                product_id: product(id)?,
                variant_id: parse_id(vid, "variant")?,
            },
            [id, "variants", vid, "purchase"] => ProductRoute::PurchaseVariant {
                product_id: product(id)?,
                variant_id: parse_id(vid, "variant")?,
            },
            [id, "inventory"] => ProductRoute::Inventory(product(id)?),
            [id, "details"] => ProductRoute::Details(product(id)?),
            [id] => ProductRoute::Product(product(id)?),
            _ => return Err(ApiError::not_found("not found")),
        };
        Ok(route)
    }

    pub fn allowed_methods(&self) -> &'static [&'static str] {
        match self {
            ProductRoute::Purchase(_)
            | ProductRoute::ApproveReview { .. }
            | ProductRoute::PurchaseVariant { .. } => &["POST"],
            ProductRoute::Reviews(_) | ProductRoute::Variants(_) => &["GET", "POST"],
            ProductRoute::Review { .. } => &["DELETE"],
            ProductRoute::Variant { .. } | ProductRoute::Product(_) => &["GET", "PUT", "DELETE"],
            ProductRoute::Inventory(_) | ProductRoute::Details(_) => &["GET"],
        }
    }
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// Handler for `/products/{*rest}`
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    Path(rest): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let route = ProductRoute::resolve(&rest)?;
    if !route.allowed_methods().contains(&method.as_str()) {
        return Err(ApiError::MethodNotAllowed(route.allowed_methods()));
    }

    let state = state.as_ref();
    let response = match (route, method.as_str()) {
        (ProductRoute::Purchase(id), _) => products::purchase(state, id)?.into_response(),

        (ProductRoute::Reviews(id), "GET") => reviews::list(state, id)?.into_response(),
        (ProductRoute::Reviews(id), _) => reviews::create(state, id, &body)?.into_response(),
        (ProductRoute::Review { product_id, review_id }, _) => {
            reviews::delete(state, product_id, review_id)?.into_response()
        }
        (ProductRoute::ApproveReview { product_id, review_id }, _) => {
            reviews::approve(state, product_id, review_id)?.into_response()
        }

        (ProductRoute::Variants(id), "GET") => variants::list(state, id)?.into_response(),
        (ProductRoute::Variants(id), _) => variants::create(state, id, &body)?.into_response(),
        (ProductRoute::Variant { product_id, variant_id }, "GET") => {
            variants::get(state, product_id, variant_id)?.into_response()
        }
        (ProductRoute::Variant { product_id, variant_id }, "PUT") => {
            variants::update(state, product_id, variant_id, &body)?.into_response()
        }
        (ProductRoute::Variant { product_id, variant_id }, _) => {
            variants::delete(state, product_id, variant_id)?.into_response()
        }
        (ProductRoute::PurchaseVariant { product_id, variant_id }, _) => {
            variants::purchase(state, product_id, variant_id)?.into_response()
        }

        (ProductRoute::Inventory(id), _) => variants::inventory(state, id)?.into_response(),
        (ProductRoute::Details(id), _) => reviews::details(state, id)?.into_response(),

        (ProductRoute::Product(id), "GET") if wants_html(&headers) => {
            pages::product_detail(state, id)?.into_response()
        }
        (ProductRoute::Product(id), "GET") => products::get(state, id)?.into_response(),
        (ProductRoute::Product(id), "PUT") => products::update(state, id, &body)?.into_response(),
        (ProductRoute::Product(id), _) => products::delete(state, id)?.into_response(),
    };
    Ok(response)
}
