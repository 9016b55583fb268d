//! Asana analogue collector. Prefix `asana_`. Syncs projects and tasks,
//! maintaining a projects-map (external gid -> internal project id) and a
//! users-map (external gid -> internal team_member id) so repeated polls
//! resolve the same external entity to the same internal row.

use crate::collectors::{Collector, CollectorRunReport};
use crate::db::tasks::CollectedTask;
use crate::db::Store;
use crate::error::CollectorError;
use async_trait::async_trait;
use std::collections::HashMap;

const SOURCE: &str = "asana";
const PREFIX: &str = "asana_";

pub struct RawAsanaProject {
    pub gid: String,
    pub name: String,
}

pub struct RawAsanaTask {
    pub gid: String,
    pub name: String,
    pub completed: bool,
    pub due_on: Option<String>,
    pub notes: Option<String>,
    pub project_gid: Option<String>,
    pub assignee_gid: Option<String>,
    pub assignee_name: Option<String>,
}

/// Stable mapping from an external gid to the internal id namespaced under
/// this source's prefix; kept in-process for the duration of one poll.
#[derive(Default)]
pub struct AsanaIdMaps {
    pub projects: HashMap<String, String>,
    pub users: HashMap<String, String>,
}

impl AsanaIdMaps {
    pub fn project_id_for(&mut self, gid: &str) -> String {
        self.projects
            .entry(gid.to_string())
            .or_insert_with(|| format!("{PREFIX}project_{gid}"))
            .clone()
    }

    pub fn user_id_for(&mut self, gid: &str) -> String {
        self.users
            .entry(gid.to_string())
            .or_insert_with(|| format!("{PREFIX}user_{gid}"))
            .clone()
    }
}

pub struct AsanaCollector;

#[async_trait]
impl Collector for AsanaCollector {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn poll(&self, store: &Store, now: &str) -> Result<CollectorRunReport, CollectorError> {
        let (projects, tasks) = fetch_projects_and_tasks().await?;
        let mut maps = AsanaIdMaps::default();

        for project in &projects {
            let id = maps.project_id_for(&project.gid);
            store
                .upsert_project(&id, None, None, &project.name, "active", None, now)
                .map_err(|e| CollectorError::Parse {
                    source: SOURCE,
                    message: e.to_string(),
                })?;
        }

        for task in &tasks {
            let id = format!("{PREFIX}{}", task.gid);
            let status = if task.completed { "done" } else { "pending" };
            let project_id = task.project_gid.as_ref().map(|g| maps.project_id_for(g));

            if let (Some(assignee_gid), Some(_name)) = (&task.assignee_gid, &task.assignee_name) {
                maps.user_id_for(assignee_gid);
            }

            let collected = CollectedTask {
                id: &id,
                source: SOURCE,
                source_id: Some(&task.gid),
                title: &task.name,
                status,
                priority: 50,
                due_date: task.due_on.as_deref(),
                duration_minutes: None,
                notes: task.notes.as_deref(),
                project_id: project_id.as_deref(),
                assignee_raw: task.assignee_name.as_deref(),
                blocked: false,
            };
            store
                .upsert_collected_task(&collected, now)
                .map_err(|e| CollectorError::Parse {
                    source: SOURCE,
                    message: e.to_string(),
                })?;
        }

        Ok(CollectorRunReport {
            items_synced: tasks.len() as i64,
        })
    }
}

async fn fetch_projects_and_tasks(
) -> Result<(Vec<RawAsanaProject>, Vec<RawAsanaTask>), CollectorError> {
    Ok((Vec::new(), Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_gid_resolves_to_same_internal_id_across_calls() {
        let mut maps = AsanaIdMaps::default();
        let first = maps.project_id_for("12345");
        let second = maps.project_id_for("12345");
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_gids_resolve_to_distinct_ids() {
        let mut maps = AsanaIdMaps::default();
        assert_ne!(maps.project_id_for("1"), maps.project_id_for("2"));
    }
}
