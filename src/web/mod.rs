//! HTTP server for the catalog: JSON API, HTML pages and static assets

pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;

use crate::database::Store;
use axum::routing::{any, get, post};
use axum::Router;
use handlers::{export, pages, products, stats, variants};
use rate_limit::RateLimiter;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;

pub use error::ApiError;

/// Shared state handed to every handler
pub struct AppState {
    pub store: Store,
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Store, rate_limiter: RateLimiter) -> Self {
        Self {
            store,
            rate_limiter,
            started_at: Instant::now(),
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("not found")
}

/// Build the router with all routes and middleware.
///
/// Middleware order, outermost first: panic recovery, request logging,
/// CORS, rate limiting.
pub fn create_router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let layers = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(middleware::panic_response))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(middleware::cors_layer())
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit::rate_limit,
        ));

    Router::new()
        .route("/", get(pages::product_list))
        .route("/new", get(pages::new_product))
        .route("/stats", get(pages::stats))
        .route("/health", get(stats::health))
        .route("/search", get(products::search))
        .route("/categories", get(products::categories))
        .route("/audit", get(stats::audit))
        .route("/sku/{sku}", get(variants::by_sku))
        .route("/products", get(products::list).post(products::create))
        .route("/products/export", get(export::export_csv))
        .route("/products/export/json", get(export::export_json))
        .route("/products/import", post(export::import))
        .route("/products/stats", get(stats::dashboard))
        .route("/products/{*rest}", any(dispatch::dispatch))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(not_found)
        .layer(layers)
        .with_state(state)
}

/// Periodically drop stale rate-limit clients and expired cache entries
pub fn spawn_maintenance(state: Arc<AppState>) -> JoinHandle<()> {
    let period = state.rate_limiter.window() * 2;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let clients = state.rate_limiter.sweep();
            let entries = state.store.cache().purge_expired();
            log::debug!(
                "Maintenance: dropped {} rate-limit clients, {} cache entries",
                clients,
                entries
            );
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}

/// Start the web server and run until Ctrl-C
///
/// Binds to 0.0.0.0 (all interfaces).
pub async fn serve(
    state: Arc<AppState>,
    static_dir: &Path,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let maintenance = spawn_maintenance(Arc::clone(&state));
    let app = create_router(state, static_dir);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Catalog server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    maintenance.abort();
    log::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    AppState::new(crate::database::test_store(), RateLimiter::default())
}
