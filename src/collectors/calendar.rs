//! Calendar analogue collector. Prefix `calendar_`. Fetches a window of 30
//! days back to 30 days ahead and derives per-event prep notes.

use crate::collectors::{Collector, CollectorRunReport};
use crate::db::events::CollectedEvent;
use crate::db::Store;
use crate::error::CollectorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

const SOURCE: &str = "calendar";
const PREFIX: &str = "calendar_";

pub struct RawCalendarEvent {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub attendees: Vec<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PrepNotes {
    pub time_minutes: i64,
    pub items: Vec<String>,
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// Derives the meeting-prep checklist from the event title and location.
/// Pure function so the mapping is directly testable without a fetch.
pub fn derive_prep_notes(title: &str, location: Option<&str>) -> PrepNotes {
    let mut notes = PrepNotes {
        time_minutes: 15,
        items: Vec::new(),
    };

    if contains_any(title, &["interview", "presentation", "pitch", "demo"]) {
        notes.time_minutes = 30;
        notes.items.push("Review materials".to_string());
    }

    if contains_any(title, &["1:1", "1-1", "one on one", "one-on-one"]) {
        notes.items.push("Check notes from last meeting".to_string());
    }

    if contains_any(title, &["call", "meeting"]) {
        notes.items.push("Join link ready".to_string());
    }

    let is_virtual = location
        .map(|l| contains_any(l, &["zoom", "meet.google", "teams.microsoft", "virtual"]))
        .unwrap_or(true);
    if !is_virtual && location.map(|l| !l.trim().is_empty()).unwrap_or(false) {
        notes.time_minutes += 15;
        notes.items.push("Travel to location".to_string());
    }

    notes
}

pub struct CalendarCollector;

#[async_trait]
impl Collector for CalendarCollector {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn poll(&self, store: &Store, now: &str) -> Result<CollectorRunReport, CollectorError> {
        let today = Utc::now();
        let window_start = today - chrono::Duration::days(30);
        let window_end = today + chrono::Duration::days(30);

        let artifacts = fetch_events(window_start, window_end).await?;

        for artifact in &artifacts {
            let id = format!("{PREFIX}{}", artifact.id);
            let attendees_json = serde_json::to_string(&artifact.attendees).map_err(|e| {
                CollectorError::Parse {
                    source: SOURCE,
                    message: e.to_string(),
                }
            })?;

            let collected = CollectedEvent {
                id: &id,
                title: &artifact.title,
                start_time: &artifact.start_time.to_rfc3339(),
                end_time: artifact.end_time.map(|t| t.to_rfc3339()).as_deref(),
                attendees_json: &attendees_json,
                location: artifact.location.as_deref(),
            };
            store
                .upsert_collected_event(&collected, now)
                .map_err(|e| CollectorError::Parse {
                    source: SOURCE,
                    message: e.to_string(),
                })?;

            let prep_notes = derive_prep_notes(&artifact.title, artifact.location.as_deref());
            let prep_notes_json = serde_json::to_string(&prep_notes).map_err(|e| CollectorError::Parse {
                source: SOURCE,
                message: e.to_string(),
            })?;
            store
                .update_event_prep_notes(&id, &prep_notes_json, now)
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

async fn fetch_events(
    _window_start: DateTime<Utc>,
    _window_end: DateTime<Utc>,
) -> Result<Vec<RawCalendarEvent>, CollectorError> {
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interview_title_gets_thirty_minutes_and_review_item() {
        let notes = derive_prep_notes("Interview: Senior Designer", None);
        assert_eq!(notes.time_minutes, 30);
        assert!(notes.items.contains(&"Review materials".to_string()));
    }

    #[test]
    fn call_title_adds_join_link_item() {
        let notes = derive_prep_notes("Weekly client call", None);
        assert!(notes.items.contains(&"Join link ready".to_string()));
    }

    #[test]
    fn physical_location_adds_travel_time() {
        let notes = derive_prep_notes("Client lunch", Some("123 Main St"));
        assert_eq!(notes.time_minutes, 30);
        assert!(notes.items.contains(&"Travel to location".to_string()));
    }

    #[test]
    fn virtual_location_does_not_add_travel_time() {
        let notes = derive_prep_notes("Client sync", Some("https://zoom.us/j/123"));
        assert_eq!(notes.time_minutes, 15);
        assert!(!notes.items.contains(&"Travel to location".to_string()));
    }
}
