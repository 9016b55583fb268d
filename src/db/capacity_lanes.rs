use crate::error::StoreError;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::Store;

/// The schema's single source of truth for per-person workload. A
/// previously-considered parallel `lanes` table would have duplicated this
/// information; it is intentionally not created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCapacityLane {
    pub id: String,
    pub person_id: Option<String>,
    pub name: String,
    pub weekly_hours: f64,
    pub allocated_hours: f64,
    pub created_at: String,
    pub updated_at: String,
}

fn row_to_lane(row: &Row) -> rusqlite::Result<DbCapacityLane> {
    Ok(DbCapacityLane {
        id: row.get("id")?,
        person_id: row.get("person_id")?,
        name: row.get("name")?,
        weekly_hours: row.get("weekly_hours")?,
        allocated_hours: row.get("allocated_hours")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Store {
    pub fn upsert_capacity_lane(
        &self,
        id: &str,
        person_id: Option<&str>,
        name: &str,
        weekly_hours: f64,
        now: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO capacity_lanes (id, person_id, name, weekly_hours, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(id) DO UPDATE SET
                person_id = excluded.person_id,
                name = excluded.name,
                weekly_hours = excluded.weekly_hours,
                updated_at = excluded.updated_at",
            params![id, person_id, name, weekly_hours, now],
        )?;
        Ok(())
    }

    pub fn update_lane_allocation(&self, id: &str, allocated_hours: f64, now: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE capacity_lanes SET allocated_hours = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, allocated_hours, now],
        )?;
        Ok(())
    }

    pub fn list_lanes_for_person(&self, person_id: &str) -> Result<Vec<DbCapacityLane>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM capacity_lanes WHERE person_id = ?1")?;
        let rows = stmt.query_map(params![person_id], row_to_lane)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn list_lanes(&self) -> Result<Vec<DbCapacityLane>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT * FROM capacity_lanes")?;
        let rows = stmt.query_map([], row_to_lane)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }
}
