use crate::error::StoreError;
use crate::types::ClientLinkStatus;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCommunication {
    pub id: String,
    pub source: String,
    pub sender: String,
    pub recipients_json: String,
    pub subject: String,
    pub snippet: String,
    pub body_text: Option<String>,
    pub extraction_method: Option<String>,
    pub received_at: String,
    pub content_hash: String,
    pub from_domain: Option<String>,
    pub client_id: Option<String>,
    pub link_status: String,
    pub created_at: String,
    pub updated_at: String,
}

fn row_to_communication(row: &Row) -> rusqlite::Result<DbCommunication> {
    Ok(DbCommunication {
        id: row.get("id")?,
        source: row.get("source")?,
        sender: row.get("sender")?,
        recipients_json: row.get("recipients")?,
        subject: row.get("subject")?,
        snippet: row.get("snippet")?,
        body_text: row.get("body_text")?,
        extraction_method: row.get("extraction_method")?,
        received_at: row.get("received_at")?,
        content_hash: row.get("content_hash")?,
        from_domain: row.get("from_domain")?,
        client_id: row.get("client_id")?,
        link_status: row.get("link_status")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub struct CollectedCommunication<'a> {
    pub id: &'a str,
    pub sender: &'a str,
    pub recipients_json: &'a str,
    pub subject: &'a str,
    pub snippet: &'a str,
    pub body_text: Option<&'a str>,
    pub extraction_method: Option<&'a str>,
    pub received_at: &'a str,
    pub content_hash: &'a str,
}

impl Store {
    /// Content-hash is the idempotency key: re-ingesting the same message
    /// (Gmail delivers duplicates across paginated polls) is a no-op.
    ///
    /// `from_domain` is not accepted here: it is derived from `sender` by
    /// the normalizer, never written by a collector.
    pub fn upsert_collected_communication(
        &self,
        c: &CollectedCommunication,
        now: &str,
    ) -> Result<bool, StoreError> {
        let rows = self.conn.execute(
            "INSERT INTO communications (
                id, sender, recipients, subject, snippet, body_text,
                extraction_method, received_at, content_hash,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
             ON CONFLICT(content_hash) DO NOTHING",
            params![
                c.id,
                c.sender,
                c.recipients_json,
                c.subject,
                c.snippet,
                c.body_text,
                c.extraction_method,
                c.received_at,
                c.content_hash,
                now,
            ],
        )?;
        Ok(rows > 0)
    }

    pub fn update_communication_link(
        &self,
        id: &str,
        from_domain: Option<&str>,
        client_id: Option<&str>,
        link_status: ClientLinkStatus,
        now: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE communications SET from_domain = ?2, client_id = ?3, link_status = ?4, updated_at = ?5 WHERE id = ?1",
            params![id, from_domain, client_id, link_status.as_db_str(), now],
        )?;
        Ok(())
    }

    pub fn get_communication(&self, id: &str) -> Result<Option<DbCommunication>, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM communications WHERE id = ?1",
                params![id],
                row_to_communication,
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn list_unlinked_communications(&self) -> Result<Vec<DbCommunication>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM communications WHERE link_status = 'unlinked'")?;
        let rows = stmt.query_map([], row_to_communication)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn list_communications(&self) -> Result<Vec<DbCommunication>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT * FROM communications")?;
        let rows = stmt.query_map([], row_to_communication)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn list_communications_for_client(
        &self,
        client_id: &str,
    ) -> Result<Vec<DbCommunication>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM communications WHERE client_id = ?1 ORDER BY received_at DESC")?;
        let rows = stmt.query_map(params![client_id], row_to_communication)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn duplicate_content_hash_is_ignored() {
        let store = Store::open_in_memory().unwrap();
        let c = CollectedCommunication {
            id: "comm1",
            sender: "client@acme.com",
            recipients_json: "[]",
            subject: "Status update",
            snippet: "...",
            body_text: None,
            extraction_method: None,
            received_at: "2026-01-01T00:00:00Z",
            content_hash: "hash-abc",
        };
        let first = store.upsert_collected_communication(&c, "2026-01-01T00:00:00Z").unwrap();
        let dup = CollectedCommunication { id: "comm2", ..c };
        let second = store.upsert_collected_communication(&dup, "2026-01-02T00:00:00Z").unwrap();

        assert!(first);
        assert!(!second);
        assert!(store.get_communication("comm2").unwrap().is_none());
    }
}
