use crate::error::StoreError;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbResolutionQueueItem {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub issue_type: String,
    pub priority: i64,
    pub context_json: String,
    pub created_at: String,
    pub last_seen_at: String,
    pub expires_at: Option<String>,
    pub resolved_at: Option<String>,
}

fn row_to_item(row: &Row) -> rusqlite::Result<DbResolutionQueueItem> {
    Ok(DbResolutionQueueItem {
        id: row.get("id")?,
        entity_type: row.get("entity_type")?,
        entity_id: row.get("entity_id")?,
        issue_type: row.get("issue_type")?,
        priority: row.get("priority")?,
        context_json: row.get("context_json")?,
        created_at: row.get("created_at")?,
        last_seen_at: row.get("last_seen_at")?,
        expires_at: row.get("expires_at")?,
        resolved_at: row.get("resolved_at")?,
    })
}

impl Store {
    /// Uniqueness is `(entity_type, entity_id, issue_type)`: a recurring
    /// issue on the same entity refreshes `last_seen_at`/`priority` rather
    /// than creating a duplicate row.
    pub fn upsert_resolution_issue(
        &self,
        id: &str,
        entity_type: &str,
        entity_id: &str,
        issue_type: &str,
        priority: i64,
        context_json: &str,
        now: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO resolution_queue (
                id, entity_type, entity_id, issue_type, priority, context_json,
                created_at, last_seen_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(entity_type, entity_id, issue_type) DO UPDATE SET
                priority = excluded.priority,
                context_json = excluded.context_json,
                last_seen_at = excluded.last_seen_at,
                resolved_at = NULL",
            params![id, entity_type, entity_id, issue_type, priority, context_json, now],
        )?;
        Ok(())
    }

    /// Issues that were open last cycle but were not re-raised this cycle
    /// are implicitly resolved; call this with the set of keys that were
    /// NOT re-raised to archive them.
    pub fn resolve_issue(
        &self,
        entity_type: &str,
        entity_id: &str,
        issue_type: &str,
        now: &str,
        resolved_by: Option<&str>,
    ) -> Result<(), StoreError> {
        let item = self
            .conn
            .query_row(
                "SELECT * FROM resolution_queue WHERE entity_type = ?1 AND entity_id = ?2 AND issue_type = ?3",
                params![entity_type, entity_id, issue_type],
                row_to_item,
            )
            .optional()?;

        let Some(item) = item else { return Ok(()) };

        self.conn.execute(
            "INSERT INTO resolved_queue_items (
                id, entity_type, entity_id, issue_type, priority, context_json,
                created_at, resolved_at, resolved_by
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.id,
                item.entity_type,
                item.entity_id,
                item.issue_type,
                item.priority,
                item.context_json,
                item.created_at,
                now,
                resolved_by,
            ],
        )?;
        self.conn.execute(
            "UPDATE resolution_queue SET resolved_at = ?4 WHERE entity_type = ?1 AND entity_id = ?2 AND issue_type = ?3",
            params![entity_type, entity_id, issue_type, now],
        )?;
        Ok(())
    }

    pub fn list_open_resolution_queue(&self) -> Result<Vec<DbResolutionQueueItem>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM resolution_queue WHERE resolved_at IS NULL ORDER BY priority, created_at",
        )?;
        let rows = stmt.query_map([], row_to_item)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn get_resolution_queue_item(&self, id: &str) -> Result<Option<DbResolutionQueueItem>, StoreError> {
        self.conn
            .query_row("SELECT * FROM resolution_queue WHERE id = ?1", params![id], row_to_item)
            .optional()
            .map_err(StoreError::from)
    }

    /// Used by the `/api/v2/inbox/{id}/action` HTTP boundary, which
    /// addresses a queue item by its own `id` rather than the
    /// `(entity_type, entity_id, issue_type)` triple `resolve_issue` keys
    /// on.
    pub fn resolve_by_id(&self, id: &str, now: &str, resolved_by: Option<&str>) -> Result<bool, StoreError> {
        let Some(item) = self.get_resolution_queue_item(id)? else {
            return Ok(false);
        };
        if item.resolved_at.is_some() {
            return Ok(true);
        }
        self.resolve_issue(&item.entity_type, &item.entity_id, &item.issue_type, now, resolved_by)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn recurring_issue_updates_instead_of_duplicating() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_resolution_issue("rq1", "task", "t1", "missing_project_link", 3, "{}", "2026-01-01T00:00:00Z")
            .unwrap();
        store
            .upsert_resolution_issue("rq2", "task", "t1", "missing_project_link", 2, "{}", "2026-01-02T00:00:00Z")
            .unwrap();

        let open = store.list_open_resolution_queue().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].priority, 2);
        assert_eq!(open[0].last_seen_at, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn resolving_an_issue_archives_and_clears_it() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_resolution_issue("rq1", "task", "t1", "missing_project_link", 3, "{}", "2026-01-01T00:00:00Z")
            .unwrap();
        store
            .resolve_issue("task", "t1", "missing_project_link", "2026-01-03T00:00:00Z", Some("normalizer"))
            .unwrap();

        assert!(store.list_open_resolution_queue().unwrap().is_empty());
    }
}
