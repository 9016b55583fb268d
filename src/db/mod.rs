//! The store: a thin wrapper around a single `rusqlite::Connection`, opened
//! in WAL mode, with schema migrations applied on open.
//!
//! `Store` is intentionally not `Clone`/`Sync` — callers share it behind an
//! `Arc<Mutex<Store>>` (or run it on a dedicated task) the same way the
//! teacher's `ActionDb` is held by a single owner.

mod migrations;

pub mod capacity_lanes;
pub mod clients;
pub mod commitments;
pub mod communications;
pub mod cycle_logs;
pub mod events;
pub mod invoices;
pub mod pending_actions;
pub mod projects;
pub mod resolution_queue;
pub mod sync_state;
pub mod tasks;
pub mod team_members;

use crate::error::StoreError;
use rusqlite::Connection;
use std::path::Path;

pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open (creating if absent) the database at `path`, enable WAL mode, and
    /// run any pending migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Migration(format!("failed to create data directory: {e}"))
            })?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn).map_err(StoreError::Migration)?;
        Ok(Store { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn opens_fresh_db_and_applies_migrations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agency.db");
        let store = Store::open(&path).expect("should open and migrate");
        let count: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn reopening_existing_db_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agency.db");
        {
            let _store = Store::open(&path).unwrap();
        }
        let _store2 = Store::open(&path).expect("reopen should not fail");
    }
}
