//! Append-only audit trail

use super::Store;
use crate::error::Result;
use crate::models::AuditEntry;
use chrono::Utc;
use rusqlite::{params, Row};

const DEFAULT_RECENT_ENTRIES: i64 = 50;

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        product_id: row.get(1)?,
        action: row.get(2)?,
        detail: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Store {
    /// Record an action against a product, returning the entry id
    pub fn log_audit(&self, product_id: i64, action: &str, detail: &str) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO audit_log (product_id, action, detail, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![product_id, action, detail, Utc::now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Audit trail of one product, newest first
    pub fn audit_log(&self, product_id: i64) -> Result<Vec<AuditEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, product_id, action, detail, created_at FROM audit_log
             WHERE product_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let entries = stmt
            .query_map(params![product_id], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Latest entries across all products; a non-positive limit means 50
    pub fn recent_audit_log(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let limit = if limit <= 0 {
            DEFAULT_RECENT_ENTRIES
        } else {
            limit
        };
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, product_id, action, detail, created_at FROM audit_log
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
