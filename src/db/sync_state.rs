use crate::error::StoreError;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbSyncState {
    pub source: String,
    pub last_sync: Option<String>,
    pub last_success: Option<String>,
    pub items_synced: i64,
    pub error: Option<String>,
}

fn row_to_sync_state(row: &Row) -> rusqlite::Result<DbSyncState> {
    Ok(DbSyncState {
        source: row.get("source")?,
        last_sync: row.get("last_sync")?,
        last_success: row.get("last_success")?,
        items_synced: row.get("items_synced")?,
        error: row.get("error")?,
    })
}

impl Store {
    pub fn record_sync_success(&self, source: &str, items_synced: i64, now: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sync_state (source, last_sync, last_success, items_synced, error)
             VALUES (?1, ?2, ?2, ?3, NULL)
             ON CONFLICT(source) DO UPDATE SET
                last_sync = excluded.last_sync,
                last_success = excluded.last_success,
                items_synced = excluded.items_synced,
                error = NULL",
            params![source, now, items_synced],
        )?;
        Ok(())
    }

    pub fn record_sync_failure(&self, source: &str, error: &str, now: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sync_state (source, last_sync, items_synced, error)
             VALUES (?1, ?2, 0, ?3)
             ON CONFLICT(source) DO UPDATE SET
                last_sync = excluded.last_sync,
                error = excluded.error",
            params![source, now, error],
        )?;
        Ok(())
    }

    pub fn get_sync_state(&self, source: &str) -> Result<Option<DbSyncState>, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM sync_state WHERE source = ?1",
                params![source],
                row_to_sync_state,
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn list_sync_state(&self) -> Result<Vec<DbSyncState>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT * FROM sync_state ORDER BY source")?;
        let rows = stmt.query_map([], row_to_sync_state)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }
}
