//! In-memory read cache for single-product lookups
//!
//! Entries expire a fixed time after they were inserted. The store evicts an
//! entry whenever it mutates that product; writes that bypass the store are
//! only picked up once the entry expires.

use crate::models::Product;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Default lifetime of a cached product snapshot
pub const DEFAULT_TTL: Duration = Duration::from_secs(3);

struct CachedProduct {
    product: Product,
    expires_at: Instant,
}

/// Product id → snapshot cache guarded by a reader/writer lock
pub struct ProductCache {
    entries: RwLock<HashMap<i64, CachedProduct>>,
    ttl: Duration,
}

impl Default for ProductCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ProductCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Get a snapshot if present and not yet expired
    pub fn get(&self, id: i64) -> Option<Product> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(&id)?;
        if Instant::now() < entry.expires_at {
            log::debug!("Product cache hit for id {}", id);
            Some(entry.product.clone())
        } else {
            None
        }
    }

    /// Store a fresh snapshot, replacing any previous entry
    pub fn insert(&self, product: Product) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            product.id,
            CachedProduct {
                product,
                expires_at,
            },
        );
    }

    pub fn invalidate(&self, id: i64) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(&id).is_some() {
            log::debug!("Evicted product {} from cache", id);
        }
    }

    /// Drop expired entries; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
