use crate::error::StoreError;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTeamMember {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn row_to_team_member(row: &Row) -> rusqlite::Result<DbTeamMember> {
    Ok(DbTeamMember {
        id: row.get("id")?,
        display_name: row.get("display_name")?,
        email: row.get("email")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Store {
    pub fn find_team_member_by_email(&self, email: &str) -> Result<Option<DbTeamMember>, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM team_members WHERE email = ?1",
                params![email],
                row_to_team_member,
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// First sighting of an email-shaped assignee creates the team member
    /// row; subsequent sightings are a no-op. Non-email assignee strings
    /// never create a row (kept as `tasks.assignee_raw` instead).
    pub fn get_or_create_team_member(
        &self,
        id: &str,
        display_name: &str,
        email: &str,
        now: &str,
    ) -> Result<DbTeamMember, StoreError> {
        if let Some(existing) = self.find_team_member_by_email(email)? {
            return Ok(existing);
        }
        self.conn.execute(
            "INSERT INTO team_members (id, display_name, email, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, display_name, email, now],
        )?;
        Ok(DbTeamMember {
            id: id.to_string(),
            display_name: display_name.to_string(),
            email: Some(email.to_string()),
            created_at: now.to_string(),
            updated_at: now.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn second_sighting_of_same_email_reuses_row() {
        let store = Store::open_in_memory().unwrap();
        let first = store
            .get_or_create_team_member("tm1", "Jane Doe", "jane@agency.com", "2026-01-01T00:00:00Z")
            .unwrap();
        let second = store
            .get_or_create_team_member("tm2", "Jane D.", "jane@agency.com", "2026-01-02T00:00:00Z")
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.id, "tm1");
    }
}
