use crate::error::StoreError;
use crate::types::{ClientLinkStatus, ProjectLinkStatus};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTask {
    pub id: String,
    pub source: String,
    pub source_id: Option<String>,
    pub title: String,
    pub status: String,
    pub priority: i64,
    pub due_date: Option<String>,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
    pub project_id: Option<String>,
    pub brand_id: Option<String>,
    pub client_id: Option<String>,
    pub project_link_status: String,
    pub client_link_status: String,
    pub assignee_person_id: Option<String>,
    pub assignee_raw: Option<String>,
    pub blocked: bool,
    pub blocked_since: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn row_to_task(row: &Row) -> rusqlite::Result<DbTask> {
    Ok(DbTask {
        id: row.get("id")?,
        source: row.get("source")?,
        source_id: row.get("source_id")?,
        title: row.get("title")?,
        status: row.get("status")?,
        priority: row.get("priority")?,
        due_date: row.get("due_date")?,
        duration_minutes: row.get("duration_minutes")?,
        notes: row.get("notes")?,
        project_id: row.get("project_id")?,
        brand_id: row.get("brand_id")?,
        client_id: row.get("client_id")?,
        project_link_status: row.get("project_link_status")?,
        client_link_status: row.get("client_link_status")?,
        assignee_person_id: row.get("assignee_person_id")?,
        assignee_raw: row.get("assignee_raw")?,
        blocked: row.get::<_, i64>("blocked")? != 0,
        blocked_since: row.get("blocked_since")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Fields a collector owns and may write on ingest. Derived fields
/// (`project_link_status`, `client_link_status`, `assignee_person_id`,
/// `client_id`) are never touched here — only by `update_task_links`.
pub struct CollectedTask<'a> {
    pub id: &'a str,
    pub source: &'a str,
    pub source_id: Option<&'a str>,
    pub title: &'a str,
    pub status: &'a str,
    pub priority: i64,
    pub due_date: Option<&'a str>,
    pub duration_minutes: Option<i64>,
    pub notes: Option<&'a str>,
    pub project_id: Option<&'a str>,
    pub assignee_raw: Option<&'a str>,
    pub blocked: bool,
}

impl Store {
    pub fn upsert_collected_task(&self, t: &CollectedTask, now: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO tasks (
                id, source, source_id, title, status, priority, due_date,
                duration_minutes, notes, project_id, assignee_raw, blocked,
                blocked_since, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                status = excluded.status,
                priority = excluded.priority,
                due_date = excluded.due_date,
                duration_minutes = excluded.duration_minutes,
                notes = excluded.notes,
                project_id = excluded.project_id,
                assignee_raw = excluded.assignee_raw,
                blocked = excluded.blocked,
                blocked_since = CASE WHEN excluded.blocked = 1 AND tasks.blocked = 0
                                     THEN excluded.updated_at ELSE tasks.blocked_since END,
                updated_at = excluded.updated_at",
            params![
                t.id,
                t.source,
                t.source_id,
                t.title,
                t.status,
                t.priority,
                t.due_date,
                t.duration_minutes,
                t.notes,
                t.project_id,
                t.assignee_raw,
                t.blocked as i64,
                if t.blocked { Some(now) } else { None },
                now,
            ],
        )?;
        Ok(())
    }

    /// Normalizer-owned: recompute link statuses and resolved references.
    /// Never called by a collector.
    pub fn update_task_links(
        &self,
        id: &str,
        brand_id: Option<&str>,
        client_id: Option<&str>,
        project_link_status: ProjectLinkStatus,
        client_link_status: ClientLinkStatus,
        assignee_person_id: Option<&str>,
        now: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE tasks SET
                brand_id = ?2,
                client_id = ?3,
                project_link_status = ?4,
                client_link_status = ?5,
                assignee_person_id = ?6,
                updated_at = ?7
             WHERE id = ?1",
            params![
                id,
                brand_id,
                client_id,
                project_link_status.as_db_str(),
                client_link_status.as_db_str(),
                assignee_person_id,
                now
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<DbTask>, StoreError> {
        self.conn
            .query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn list_open_tasks(&self) -> Result<Vec<DbTask>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM tasks WHERE status != 'done' ORDER BY priority DESC, due_date")?;
        let rows = stmt.query_map([], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn list_tasks_without_project_link(&self) -> Result<Vec<DbTask>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM tasks WHERE project_link_status = 'unlinked' AND status != 'done'")?;
        let rows = stmt.query_map([], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn list_tasks_for_client(&self, client_id: &str) -> Result<Vec<DbTask>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM tasks WHERE client_id = ?1 ORDER BY priority DESC")?;
        let rows = stmt.query_map(params![client_id], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn list_tasks_for_project(&self, project_id: &str) -> Result<Vec<DbTask>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM tasks WHERE project_id = ?1")?;
        let rows = stmt.query_map(params![project_id], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn upsert_preserves_blocked_since_across_updates() {
        let store = Store::open_in_memory().unwrap();
        let collected = CollectedTask {
            id: "t1",
            source: "google_tasks",
            source_id: Some("gt_1"),
            title: "Draft brief",
            status: "pending",
            priority: 50,
            due_date: None,
            duration_minutes: None,
            notes: None,
            project_id: None,
            assignee_raw: None,
            blocked: true,
        };
        store.upsert_collected_task(&collected, "2026-01-01T00:00:00Z").unwrap();
        store.upsert_collected_task(&collected, "2026-01-02T00:00:00Z").unwrap();

        let task = store.get_task("t1").unwrap().unwrap();
        assert_eq!(task.blocked_since.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn collector_upsert_never_sets_derived_link_fields() {
        let store = Store::open_in_memory().unwrap();
        let collected = CollectedTask {
            id: "t1",
            source: "google_tasks",
            source_id: None,
            title: "Draft brief",
            status: "pending",
            priority: 50,
            due_date: None,
            duration_minutes: None,
            notes: None,
            project_id: None,
            assignee_raw: Some("someone@agency.com"),
            blocked: false,
        };
        store.upsert_collected_task(&collected, "2026-01-01T00:00:00Z").unwrap();
        let task = store.get_task("t1").unwrap().unwrap();
        assert_eq!(task.project_link_status, "unlinked");
        assert_eq!(task.client_link_status, "n/a");
        assert!(task.assignee_person_id.is_none());
    }
}
