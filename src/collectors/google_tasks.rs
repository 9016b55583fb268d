//! Google Tasks analogue collector. Prefix `gtask_`.

use crate::collectors::{Collector, CollectorRunReport};
use crate::db::tasks::CollectedTask;
use crate::db::Store;
use crate::error::CollectorError;
use async_trait::async_trait;
use chrono::NaiveDate;

const SOURCE: &str = "google_tasks";
const PREFIX: &str = "gtask_";

/// Raw artifact shape as delivered by the upstream API, before mapping to
/// the canonical task entity.
pub struct RawGoogleTask {
    pub id: String,
    pub title: String,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub assignee_raw: Option<String>,
}

/// Deterministic integer priority 0-100 from due-date proximity and notes.
/// `today` is the cycle's reference date, never `chrono::Local::today()`
/// directly, so the computation stays testable.
pub fn compute_priority(due_date: Option<NaiveDate>, notes_present: bool, today: NaiveDate) -> i64 {
    let mut score: i64 = 50;

    if let Some(due) = due_date {
        let days_until = (due - today).num_days();
        if days_until < 0 {
            // min(40, 40 + days_overdue*2) is always 40 for days_overdue >= 0;
            // overdue tasks get a flat bonus regardless of how overdue.
            score += 40;
        } else if days_until == 0 {
            score += 35;
        } else if days_until == 1 {
            score += 25;
        } else if days_until <= 3 {
            score += 15;
        } else if days_until <= 7 {
            score += 5;
        }
    }

    if notes_present {
        score += 5;
    }

    score.clamp(0, 100)
}

fn map_status(raw_status: &str) -> &'static str {
    if raw_status == "completed" {
        "done"
    } else {
        "pending"
    }
}

pub struct GoogleTasksCollector;

#[async_trait]
impl Collector for GoogleTasksCollector {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn poll(&self, store: &Store, now: &str) -> Result<CollectorRunReport, CollectorError> {
        let today = chrono::Utc::now().date_naive();
        let artifacts = fetch_tasks().await?;

        for artifact in &artifacts {
            let priority = compute_priority(artifact.due_date, artifact.notes.is_some(), today);
            let id = format!("{PREFIX}{}", artifact.id);
            let status = map_status(&artifact.status);
            let due_date_str = artifact.due_date.map(|d| d.format("%Y-%m-%d").to_string());

            let collected = CollectedTask {
                id: &id,
                source: SOURCE,
                source_id: Some(&artifact.id),
                title: &artifact.title,
                status,
                priority,
                due_date: due_date_str.as_deref(),
                duration_minutes: None,
                notes: artifact.notes.as_deref(),
                project_id: None,
                assignee_raw: artifact.assignee_raw.as_deref(),
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
            items_synced: artifacts.len() as i64,
        })
    }
}

async fn fetch_tasks() -> Result<Vec<RawGoogleTask>, CollectorError> {
    // The concrete HTTP client and OAuth token plumbing are out of scope
    // (spec §1); this seam is where a real integration reads from the
    // upstream API and returns the bounded page of artifacts.
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_in_thirty_days_no_notes_is_exactly_fifty() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let due = today + chrono::Duration::days(30);
        assert_eq!(compute_priority(Some(due), false, today), 50);
    }

    #[test]
    fn overdue_by_a_hundred_days_clamps_at_one_hundred() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let due = today - chrono::Duration::days(100);
        assert_eq!(compute_priority(Some(due), false, today), 90);
    }

    #[test]
    fn due_today_adds_thirty_five() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(compute_priority(Some(today), false, today), 85);
    }

    #[test]
    fn notes_add_five() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let due = today + chrono::Duration::days(10);
        assert_eq!(compute_priority(Some(due), true, today), 55);
    }

    #[test]
    fn status_maps_completed_to_done() {
        assert_eq!(map_status("completed"), "done");
        assert_eq!(map_status("needsAction"), "pending");
    }
}
