use crate::error::StoreError;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbEvent {
    pub id: String,
    pub source: String,
    pub title: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub attendees_json: String,
    pub task_id: Option<String>,
    pub location: Option<String>,
    pub prep_notes_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn row_to_event(row: &Row) -> rusqlite::Result<DbEvent> {
    Ok(DbEvent {
        id: row.get("id")?,
        source: row.get("source")?,
        title: row.get("title")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        attendees_json: row.get("attendees")?,
        task_id: row.get("task_id")?,
        location: row.get("location")?,
        prep_notes_json: row.get("prep_notes_json")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub struct CollectedEvent<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub start_time: &'a str,
    pub end_time: Option<&'a str>,
    pub attendees_json: &'a str,
    pub location: Option<&'a str>,
}

impl Store {
    pub fn upsert_collected_event(&self, e: &CollectedEvent, now: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO events (id, title, start_time, end_time, attendees, location, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                attendees = excluded.attendees,
                location = excluded.location,
                updated_at = excluded.updated_at",
            params![e.id, e.title, e.start_time, e.end_time, e.attendees_json, e.location, now],
        )?;
        Ok(())
    }

    /// Normalizer-derived prep notes for an upcoming meeting (linked
    /// attendee's open tasks/commitments). Never written by a collector.
    pub fn update_event_prep_notes(
        &self,
        id: &str,
        prep_notes_json: &str,
        now: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE events SET prep_notes_json = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, prep_notes_json, now],
        )?;
        Ok(())
    }

    pub fn list_upcoming_events(&self, from: &str, to: &str) -> Result<Vec<DbEvent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM events WHERE start_time BETWEEN ?1 AND ?2 ORDER BY start_time")?;
        let rows = stmt.query_map(params![from, to], row_to_event)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn get_event(&self, id: &str) -> Result<Option<DbEvent>, StoreError> {
        self.conn
            .query_row("SELECT * FROM events WHERE id = ?1", params![id], row_to_event)
            .optional()
            .map_err(StoreError::from)
    }
}
