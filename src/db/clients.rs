use crate::error::StoreError;
use crate::types::{ClientLifecycle, ClientTier};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbClient {
    pub id: String,
    pub name: String,
    pub tier: String,
    pub health_score: Option<f64>,
    pub ar_outstanding: f64,
    pub ar_aging: Option<String>,
    pub relationship_trend: Option<String>,
    pub lifecycle: String,
    pub last_contact_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn row_to_client(row: &Row) -> rusqlite::Result<DbClient> {
    Ok(DbClient {
        id: row.get("id")?,
        name: row.get("name")?,
        tier: row.get("tier")?,
        health_score: row.get("health_score")?,
        ar_outstanding: row.get("ar_outstanding")?,
        ar_aging: row.get("ar_aging")?,
        relationship_trend: row.get("relationship_trend")?,
        lifecycle: row.get("lifecycle")?,
        last_contact_at: row.get("last_contact_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Store {
    pub fn upsert_client(
        &self,
        id: &str,
        name: &str,
        tier: ClientTier,
        lifecycle: ClientLifecycle,
        now: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO clients (id, name, tier, lifecycle, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                tier = excluded.tier,
                lifecycle = excluded.lifecycle,
                updated_at = excluded.updated_at",
            params![id, name, tier.as_db_str(), lifecycle.as_db_str(), now],
        )?;
        Ok(())
    }

    /// Called by the normalizer after recomputing AR aggregates and health
    /// score for a client. Never called by a collector.
    pub fn update_client_derived_fields(
        &self,
        id: &str,
        health_score: f64,
        ar_outstanding: f64,
        ar_aging: &str,
        relationship_trend: &str,
        now: &str,
    ) -> Result<(), StoreError> {
        let rows = self.conn.execute(
            "UPDATE clients SET
                health_score = ?2,
                ar_outstanding = ?3,
                ar_aging = ?4,
                relationship_trend = ?5,
                updated_at = ?6
             WHERE id = ?1",
            params![id, health_score, ar_outstanding, ar_aging, relationship_trend, now],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("client {id}")));
        }
        Ok(())
    }

    pub fn update_client_last_contact(&self, id: &str, at: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE clients SET last_contact_at = ?2 WHERE id = ?1 \
             AND (last_contact_at IS NULL OR last_contact_at < ?2)",
            params![id, at],
        )?;
        Ok(())
    }

    pub fn get_client(&self, id: &str) -> Result<Option<DbClient>, StoreError> {
        self.conn
            .query_row("SELECT * FROM clients WHERE id = ?1", params![id], row_to_client)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn list_clients(&self) -> Result<Vec<DbClient>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT * FROM clients ORDER BY tier, name")?;
        let rows = stmt.query_map([], row_to_client)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn find_client_by_identity(
        &self,
        email: Option<&str>,
        domain: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row(
                "SELECT client_id FROM client_identities WHERE
                    (?1 IS NOT NULL AND email = ?1) OR (?2 IS NOT NULL AND domain = ?2)
                 LIMIT 1",
                params![email, domain],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// Case-insensitive exact match on `clients.name`, used by the
    /// normalizer to resolve an invoice's `contact_name` to a client id.
    pub fn find_client_by_name(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row(
                "SELECT id FROM clients WHERE name = ?1 COLLATE NOCASE LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn link_client_identity(
        &self,
        client_id: &str,
        email: Option<&str>,
        domain: Option<&str>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO client_identities (client_id, email, domain) VALUES (?1, ?2, ?3)",
            params![client_id, email, domain],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn upsert_is_idempotent_and_updates_on_conflict() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_client("c1", "Acme", ClientTier::A, ClientLifecycle::Active, "2026-01-01T00:00:00Z")
            .unwrap();
        store
            .upsert_client("c1", "Acme Corp", ClientTier::B, ClientLifecycle::Active, "2026-01-02T00:00:00Z")
            .unwrap();

        let client = store.get_client("c1").unwrap().unwrap();
        assert_eq!(client.name, "Acme Corp");
        assert_eq!(client.tier, "B");
    }

    #[test]
    fn identity_lookup_resolves_by_domain() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_client("c1", "Acme", ClientTier::A, ClientLifecycle::Active, "2026-01-01T00:00:00Z")
            .unwrap();
        store.link_client_identity("c1", None, Some("acme.com")).unwrap();

        let found = store.find_client_by_identity(None, Some("acme.com")).unwrap();
        assert_eq!(found, Some("c1".to_string()));
    }
}
