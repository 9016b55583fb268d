use crate::error::StoreError;
use crate::types::ProjectHealthColor;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbProject {
    pub id: String,
    pub brand_id: Option<String>,
    pub client_id: Option<String>,
    pub is_internal: bool,
    pub name: String,
    pub status: String,
    pub health_color: String,
    pub deadline: Option<String>,
    pub task_count: i64,
    pub completed_task_count: i64,
    pub completion_percent: f64,
    pub slip_risk: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

fn row_to_project(row: &Row) -> rusqlite::Result<DbProject> {
    Ok(DbProject {
        id: row.get("id")?,
        brand_id: row.get("brand_id")?,
        client_id: row.get("client_id")?,
        is_internal: row.get::<_, i64>("is_internal")? != 0,
        name: row.get("name")?,
        status: row.get("status")?,
        health_color: row.get("health_color")?,
        deadline: row.get("deadline")?,
        task_count: row.get("task_count")?,
        completed_task_count: row.get("completed_task_count")?,
        completion_percent: row.get("completion_percent")?,
        slip_risk: row.get("slip_risk")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Store {
    pub fn upsert_project(
        &self,
        id: &str,
        brand_id: Option<&str>,
        client_id: Option<&str>,
        name: &str,
        status: &str,
        deadline: Option<&str>,
        now: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO projects (id, brand_id, client_id, name, status, deadline, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(id) DO UPDATE SET
                brand_id = excluded.brand_id,
                client_id = excluded.client_id,
                name = excluded.name,
                status = excluded.status,
                deadline = excluded.deadline,
                updated_at = excluded.updated_at",
            params![id, brand_id, client_id, name, status, deadline, now],
        )?;
        Ok(())
    }

    /// Recomputed each normalization pass from the project's linked tasks.
    pub fn update_project_rollup(
        &self,
        id: &str,
        task_count: i64,
        completed_task_count: i64,
        completion_percent: f64,
        health_color: ProjectHealthColor,
        slip_risk: Option<f64>,
        now: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE projects SET
                task_count = ?2,
                completed_task_count = ?3,
                completion_percent = ?4,
                health_color = ?5,
                slip_risk = ?6,
                updated_at = ?7
             WHERE id = ?1",
            params![
                id,
                task_count,
                completed_task_count,
                completion_percent,
                health_color.as_db_str(),
                slip_risk,
                now
            ],
        )?;
        Ok(())
    }

    pub fn get_project(&self, id: &str) -> Result<Option<DbProject>, StoreError> {
        self.conn
            .query_row("SELECT * FROM projects WHERE id = ?1", params![id], row_to_project)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn list_projects_for_client(&self, client_id: &str) -> Result<Vec<DbProject>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM projects WHERE client_id = ?1 ORDER BY deadline")?;
        let rows = stmt.query_map(params![client_id], row_to_project)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn list_projects(&self) -> Result<Vec<DbProject>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT * FROM projects ORDER BY deadline")?;
        let rows = stmt.query_map([], row_to_project)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn rollup_update_recomputes_derived_fields() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_project("p1", None, None, "Website Redesign", "active", None, "2026-01-01T00:00:00Z")
            .unwrap();
        store
            .update_project_rollup("p1", 10, 6, 60.0, ProjectHealthColor::Yellow, Some(0.3), "2026-01-02T00:00:00Z")
            .unwrap();

        let project = store.get_project("p1").unwrap().unwrap();
        assert_eq!(project.task_count, 10);
        assert_eq!(project.completed_task_count, 6);
        assert_eq!(project.health_color, "yellow");
    }
}
