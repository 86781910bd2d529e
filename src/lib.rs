//! Catalog Service - products, variants and reviews over HTTP
//!
//! Stores the catalog in SQLite, serves it as a JSON API and as server-rendered
//! pages, and supports CSV export/import plus basic statistics.

pub mod cache;
pub mod csv_io;
pub mod database;
pub mod error;
pub mod models;
pub mod web;

pub use cache::ProductCache;
pub use database::Store;
pub use error::{Result, StoreError};
pub use web::{create_router, serve, AppState};
