use crate::error::StoreError;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCycleLog {
    pub id: i64,
    pub cycle_number: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub success: bool,
    pub failed_phase: Option<String>,
    pub phase_durations_json: String,
}

fn row_to_cycle_log(row: &Row) -> rusqlite::Result<DbCycleLog> {
    Ok(DbCycleLog {
        id: row.get("id")?,
        cycle_number: row.get("cycle_number")?,
        started_at: row.get("started_at")?,
        finished_at: row.get("finished_at")?,
        success: row.get::<_, i64>("success")? != 0,
        failed_phase: row.get("failed_phase")?,
        phase_durations_json: row.get("phase_durations_json")?,
    })
}

impl Store {
    pub fn begin_cycle_log(&self, cycle_number: i64, started_at: &str) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO cycle_logs (cycle_number, started_at) VALUES (?1, ?2)",
            params![cycle_number, started_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_cycle_log(
        &self,
        id: i64,
        finished_at: &str,
        success: bool,
        failed_phase: Option<&str>,
        phase_durations_json: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE cycle_logs SET finished_at = ?2, success = ?3, failed_phase = ?4, phase_durations_json = ?5
             WHERE id = ?1",
            params![id, finished_at, success as i64, failed_phase, phase_durations_json],
        )?;
        Ok(())
    }

    pub fn last_cycle_number(&self) -> Result<i64, StoreError> {
        self.conn
            .query_row("SELECT COALESCE(MAX(cycle_number), 0) FROM cycle_logs", [], |row| {
                row.get(0)
            })
            .map_err(StoreError::from)
    }

    pub fn list_recent_cycle_logs(&self, limit: i64) -> Result<Vec<DbCycleLog>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM cycle_logs ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], row_to_cycle_log)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn cycle_number_increments_across_logged_cycles() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.last_cycle_number().unwrap(), 0);
        let id = store.begin_cycle_log(1, "2026-01-01T00:00:00Z").unwrap();
        store
            .finish_cycle_log(id, "2026-01-01T00:00:05Z", true, None, "{}")
            .unwrap();
        assert_eq!(store.last_cycle_number().unwrap(), 1);
    }
}
