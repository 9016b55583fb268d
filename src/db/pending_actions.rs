use crate::error::StoreError;
use crate::types::{MoveType, RiskLevel};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbPendingAction {
    pub id: String,
    pub idempotency_key: String,
    pub move_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub rationale: String,
    pub payload_json: String,
    pub risk_level: String,
    pub approval_mode: String,
    pub status: String,
    pub proposed_at: String,
    pub decided_at: Option<String>,
    pub decided_by: Option<String>,
}

fn row_to_action(row: &Row) -> rusqlite::Result<DbPendingAction> {
    Ok(DbPendingAction {
        id: row.get("id")?,
        idempotency_key: row.get("idempotency_key")?,
        move_type: row.get("move_type")?,
        entity_type: row.get("entity_type")?,
        entity_id: row.get("entity_id")?,
        rationale: row.get("rationale")?,
        payload_json: row.get("payload_json")?,
        risk_level: row.get("risk_level")?,
        approval_mode: row.get("approval_mode")?,
        status: row.get("status")?,
        proposed_at: row.get("proposed_at")?,
        decided_at: row.get("decided_at")?,
        decided_by: row.get("decided_by")?,
    })
}

impl Store {
    /// Idempotency key dedups a move across cycles. If the same trigger
    /// fires again while the prior proposal is still pending, no new row
    /// is created but its `proposed_at` is refreshed so the proposal reads
    /// as current. A duplicate against a decided (terminal) row is a
    /// pure no-op: it must not resurrect a proposal the operator already
    /// acted on.
    pub fn propose_action(
        &self,
        id: &str,
        idempotency_key: &str,
        move_type: MoveType,
        entity_type: &str,
        entity_id: &str,
        rationale: &str,
        payload_json: &str,
        risk_level: RiskLevel,
        approval_mode: &str,
        now: &str,
    ) -> Result<bool, StoreError> {
        let existing_status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM pending_actions WHERE idempotency_key = ?1",
                params![idempotency_key],
                |row| row.get(0),
            )
            .optional()?;

        match existing_status.as_deref() {
            None => {
                self.conn.execute(
                    "INSERT INTO pending_actions (
                        id, idempotency_key, move_type, entity_type, entity_id,
                        rationale, payload_json, risk_level, approval_mode, proposed_at
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        id,
                        idempotency_key,
                        move_type.as_db_str(),
                        entity_type,
                        entity_id,
                        rationale,
                        payload_json,
                        risk_level.as_db_str(),
                        approval_mode,
                        now
                    ],
                )?;
                Ok(true)
            }
            Some("pending") => {
                self.conn.execute(
                    "UPDATE pending_actions SET proposed_at = ?2 WHERE idempotency_key = ?1",
                    params![idempotency_key, now],
                )?;
                Ok(false)
            }
            Some(_) => Ok(false),
        }
    }

    pub fn decide_action(
        &self,
        id: &str,
        status: &str,
        decided_by: &str,
        now: &str,
    ) -> Result<(), StoreError> {
        let rows = self.conn.execute(
            "UPDATE pending_actions SET status = ?2, decided_at = ?3, decided_by = ?4 WHERE id = ?1",
            params![id, status, now, decided_by],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("pending action {id}")));
        }
        Ok(())
    }

    pub fn list_pending_actions(&self) -> Result<Vec<DbPendingAction>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM pending_actions WHERE status = 'pending' ORDER BY proposed_at")?;
        let rows = stmt.query_map([], row_to_action)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn get_pending_action(&self, id: &str) -> Result<Option<DbPendingAction>, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM pending_actions WHERE id = ?1",
                params![id],
                row_to_action,
            )
            .optional()
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn duplicate_idempotency_key_is_not_reproposed() {
        let store = Store::open_in_memory().unwrap();
        let first = store
            .propose_action(
                "pa1",
                "escalate_blocker:task:t1:2026-01-01",
                MoveType::EscalateBlocker,
                "task",
                "t1",
                "overdue and blocked",
                "{}",
                RiskLevel::Medium,
                "human",
                "2026-01-01T00:00:00Z",
            )
            .unwrap();
        let second = store
            .propose_action(
                "pa2",
                "escalate_blocker:task:t1:2026-01-01",
                MoveType::EscalateBlocker,
                "task",
                "t1",
                "overdue and blocked",
                "{}",
                RiskLevel::Medium,
                "human",
                "2026-01-02T00:00:00Z",
            )
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(store.list_pending_actions().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_of_a_pending_row_refreshes_proposed_at() {
        let store = Store::open_in_memory().unwrap();
        store
            .propose_action(
                "pa1",
                "escalate_blocker:task:t1:2026-01-01",
                MoveType::EscalateBlocker,
                "task",
                "t1",
                "overdue and blocked",
                "{}",
                RiskLevel::Medium,
                "human",
                "2026-01-01T00:00:00Z",
            )
            .unwrap();
        store
            .propose_action(
                "pa2",
                "escalate_blocker:task:t1:2026-01-01",
                MoveType::EscalateBlocker,
                "task",
                "t1",
                "overdue and blocked",
                "{}",
                RiskLevel::Medium,
                "human",
                "2026-01-05T00:00:00Z",
            )
            .unwrap();

        let action = store.get_pending_action("pa1").unwrap().unwrap();
        assert_eq!(action.proposed_at, "2026-01-05T00:00:00Z");
    }

    #[test]
    fn duplicate_of_a_decided_row_does_not_reopen_it() {
        let store = Store::open_in_memory().unwrap();
        store
            .propose_action(
                "pa1",
                "escalate_blocker:task:t1:2026-01-01",
                MoveType::EscalateBlocker,
                "task",
                "t1",
                "overdue and blocked",
                "{}",
                RiskLevel::Medium,
                "human",
                "2026-01-01T00:00:00Z",
            )
            .unwrap();
        store
            .decide_action("pa1", "approved", "operator", "2026-01-02T00:00:00Z")
            .unwrap();

        let created = store
            .propose_action(
                "pa2",
                "escalate_blocker:task:t1:2026-01-01",
                MoveType::EscalateBlocker,
                "task",
                "t1",
                "overdue and blocked",
                "{}",
                RiskLevel::Medium,
                "human",
                "2026-01-05T00:00:00Z",
            )
            .unwrap();

        assert!(!created);
        let action = store.get_pending_action("pa1").unwrap().unwrap();
        assert_eq!(action.proposed_at, "2026-01-01T00:00:00Z");
        assert_eq!(action.status, "approved");
        assert!(store.list_pending_actions().unwrap().is_empty());
    }
}
