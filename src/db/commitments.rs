use crate::error::StoreError;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCommitment {
    pub id: String,
    pub communication_id: String,
    pub client_id: Option<String>,
    pub task_id: Option<String>,
    pub kind: String,
    pub status: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

fn row_to_commitment(row: &Row) -> rusqlite::Result<DbCommitment> {
    Ok(DbCommitment {
        id: row.get("id")?,
        communication_id: row.get("communication_id")?,
        client_id: row.get("client_id")?,
        task_id: row.get("task_id")?,
        kind: row.get("kind")?,
        status: row.get("status")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Store {
    /// No extraction pipeline is wired in yet; this is the write path a
    /// future commitment extractor will call per communication.
    pub fn create_commitment(
        &self,
        id: &str,
        communication_id: &str,
        client_id: Option<&str>,
        kind: &str,
        description: &str,
        now: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO commitments (id, communication_id, client_id, kind, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, communication_id, client_id, kind, description, now],
        )?;
        Ok(())
    }

    pub fn update_commitment_status(&self, id: &str, status: &str, now: &str) -> Result<(), StoreError> {
        let rows = self.conn.execute(
            "UPDATE commitments SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status, now],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("commitment {id}")));
        }
        Ok(())
    }

    pub fn list_open_commitments_for_client(
        &self,
        client_id: &str,
    ) -> Result<Vec<DbCommitment>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM commitments WHERE client_id = ?1 AND status = 'open' ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![client_id], row_to_commitment)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn get_commitment(&self, id: &str) -> Result<Option<DbCommitment>, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM commitments WHERE id = ?1",
                params![id],
                row_to_commitment,
            )
            .optional()
            .map_err(StoreError::from)
    }
}
