//! Error types for catalog storage operations

use thiserror::Error;

/// Unified error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity does not exist (or is soft-deleted)
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Input rejected before touching the database
    #[error("{0}")]
    Validation(String),
    /// A UNIQUE constraint rejected the write (product name, variant SKU)
    #[error("{0} already exists")]
    Duplicate(String),
    /// Purchase attempted on an entity with no stock left
    #[error("out of stock")]
    OutOfStock,
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Variant attributes column could not be (de)serialized
    #[error("attributes error: {0}")]
    Attributes(#[from] serde_json::Error),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    /// Map a failed insert/update, turning UNIQUE violations into `Duplicate`
    pub(crate) fn from_write(err: rusqlite::Error, what: &str) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                StoreError::Duplicate(what.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

/// Result alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity() {
        assert_eq!(StoreError::NotFound("product").to_string(), "product not found");
    }

    #[test]
    fn unique_violation_becomes_duplicate() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err();

        match StoreError::from_write(err, "product name") {
            StoreError::Duplicate(what) => assert_eq!(what, "product name"),
            other => panic!("expected Duplicate, got {other:?}"),
        }
    }

    #[test]
    fn other_errors_stay_database_errors() {
        let err = StoreError::from_write(rusqlite::Error::QueryReturnedNoRows, "x");
        assert!(matches!(err, StoreError::Database(_)));
    }
}
