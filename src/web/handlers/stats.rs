//! Health, dashboard statistics and audit log endpoints

use crate::models::{AuditEntry, DashboardStats, HealthStatus};
use crate::web::error::ApiError;
use crate::web::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    pub limit: Option<String>,
    pub product_id: Option<String>,
}

/// Render an uptime as `1h2m3s`, dropping leading zero units
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let database = match state.store.ping() {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            log::warn!("Health check failed: {}", e);
            format!("error: {e}")
        }
    };

    Json(HealthStatus {
        status: "ok".to_string(),
        database,
        uptime: format_uptime(state.started_at.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /products/stats
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.store.dashboard_stats()?))
}

/// GET /audit?limit=&product_id=
pub async fn audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditParams>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    if let Some(raw) = params.product_id.as_deref().filter(|s| !s.is_empty()) {
        let product_id: i64 = raw
            .parse()
            .map_err(|_| ApiError::bad_request("invalid product_id"))?;
        return Ok(Json(state.store.audit_log(product_id)?));
    }

    // Unparsable limits fall back to the store default
    let limit = params
        .limit
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);
    Ok(Json(state.store.recent_audit_log(limit)?))
}
