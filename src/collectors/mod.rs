//! Collector framework: each external source implements [`Collector`] and is
//! polled on its own interval by the orchestrator. Collectors are I/O-bound
//! and run concurrently with each other (but never concurrently with
//! themselves — at most one poll of a given collector is in flight).
//!
//! Collectors only ever write collector-owned fields (see the `Collected*`
//! structs in `src/db`); derived fields belong exclusively to the
//! normalizer.

pub mod asana;
pub mod calendar;
pub mod gmail;
pub mod google_tasks;
pub mod xero;

use crate::db::Store;
use crate::error::CollectorError;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of a single poll: how many artifacts were ingested (for
/// `sync_state.items_synced`), used for both logging and snapshot metadata.
pub struct CollectorRunReport {
    pub items_synced: i64,
}

#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable identifier used as the `sync_state.source` key and the
    /// `tasks.source` / `communications.source` / `invoices.source` tag.
    fn name(&self) -> &'static str;

    async fn poll(&self, store: &Store, now: &str) -> Result<CollectorRunReport, CollectorError>;
}

/// §4.2's scheduling contract: a collector wakes when `now() - last_sync >=
/// interval`. A collector that has never run (`last_sync` is `None`) is
/// always due; an unparseable timestamp is treated the same way rather than
/// wedging the collector permanently.
pub fn is_due(last_sync: Option<&str>, now: &str, interval: Duration) -> bool {
    let Some(last_sync) = last_sync else {
        return true;
    };
    let (Ok(last), Ok(now)) = (
        chrono::DateTime::parse_from_rfc3339(last_sync),
        chrono::DateTime::parse_from_rfc3339(now),
    ) else {
        return true;
    };
    (now - last).num_seconds() >= interval.as_secs() as i64
}

/// Runs one collector's poll if its interval has elapsed since
/// `sync_state.last_sync`, classifying failures and recording `sync_state`
/// regardless of outcome. Returns whether the caller should keep
/// scheduling this collector (false only for auth failures).
pub async fn run_once(collector: &dyn Collector, store: &Store, now: &str, interval: Duration) -> bool {
    let last_sync = store
        .get_sync_state(collector.name())
        .ok()
        .flatten()
        .and_then(|s| s.last_sync);
    if !is_due(last_sync.as_deref(), now, interval) {
        tracing::debug!(source = collector.name(), "skipping poll, interval not yet elapsed");
        return true;
    }

    match collector.poll(store, now).await {
        Ok(report) => {
            tracing::info!(
                source = collector.name(),
                items_synced = report.items_synced,
                "collector run succeeded"
            );
            if let Err(e) = store.record_sync_success(collector.name(), report.items_synced, now) {
                tracing::warn!(source = collector.name(), error = %e, "failed to record sync_state");
            }
            true
        }
        Err(err) => {
            tracing::warn!(source = collector.name(), error = %err, "collector run failed");
            if let Err(e) = store.record_sync_failure(collector.name(), &err.to_string(), now) {
                tracing::warn!(source = collector.name(), error = %e, "failed to record sync_state failure");
            }
            !err.stops_collector()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_synced_is_always_due() {
        assert!(is_due(None, "2026-01-15T00:00:00Z", Duration::from_secs(300)));
    }

    #[test]
    fn due_once_interval_elapsed() {
        let last = "2026-01-15T00:00:00Z";
        let now = "2026-01-15T00:05:00Z";
        assert!(is_due(Some(last), now, Duration::from_secs(300)));
    }

    #[test]
    fn not_due_before_interval_elapsed() {
        let last = "2026-01-15T00:00:00Z";
        let now = "2026-01-15T00:04:00Z";
        assert!(!is_due(Some(last), now, Duration::from_secs(300)));
    }
}
