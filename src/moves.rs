//! Moves engine: rule-driven proposal generator. Each rule is a pure
//! predicate over snapshot-adjacent store state that yields zero or more
//! proposals, each with a stable idempotency key so repeated cycles don't
//! duplicate a standing proposal.

use crate::db::Store;
use crate::error::MovesError;
use crate::types::{MoveType, RiskLevel};
use chrono::NaiveDate;
use uuid::Uuid;

const AR_COLLECTION_THRESHOLD: f64 = 1000.0;
const COMMITMENT_SILENCE_DAYS: i64 = 7;
const BLOCKED_ESCALATION_DAYS: i64 = 3;
const NO_CONTACT_DAYS_TIER_A: i64 = 14;
const LINK_ISSUE_STALE_DAYS: i64 = 14;

pub struct MovesReport {
    pub proposed: i64,
}

fn propose(
    store: &Store,
    move_type: MoveType,
    entity_type: &str,
    entity_id: &str,
    rationale: &str,
    payload_json: &str,
    risk_level: RiskLevel,
    idempotency_key: &str,
    now: &str,
) -> Result<bool, MovesError> {
    let id = Uuid::new_v4().to_string();
    let created = store.propose_action(
        &id,
        idempotency_key,
        move_type,
        entity_type,
        entity_id,
        rationale,
        payload_json,
        risk_level,
        "human",
        now,
    )?;
    Ok(created)
}

pub fn run(store: &Store, today: NaiveDate, now: &str) -> Result<MovesReport, MovesError> {
    let mut proposed = 0i64;

    // collection_call: AR for client > threshold AND worst bucket >= 31-60.
    for client in store.list_clients()? {
        if client.ar_outstanding <= AR_COLLECTION_THRESHOLD {
            continue;
        }
        let severe = matches!(client.ar_aging.as_deref(), Some("31-60") | Some("61-90") | Some("90+"));
        if !severe {
            continue;
        }
        let key = format!("collection_call:client:{}", client.id);
        if propose(
            store,
            MoveType::CollectionCall,
            "client",
            &client.id,
            &format!("AR outstanding ${:.2} in {} bucket", client.ar_outstanding, client.ar_aging.as_deref().unwrap_or("?")),
            "{}",
            RiskLevel::Medium,
            &key,
            now,
        )? {
            proposed += 1;
        }
    }

    // escalate_blocker: task blocked for > N days.
    for task in store.list_open_tasks()? {
        let Some(blocked_since) = &task.blocked_since else { continue };
        let Ok(since) = chrono::DateTime::parse_from_rfc3339(blocked_since) else { continue };
        let Ok(now_dt) = chrono::DateTime::parse_from_rfc3339(now) else { continue };
        if (now_dt - since).num_days() <= BLOCKED_ESCALATION_DAYS {
            continue;
        }
        let key = format!("escalate_blocker:task:{}", task.id);
        if propose(
            store,
            MoveType::EscalateBlocker,
            "task",
            &task.id,
            &format!("Task blocked since {blocked_since}"),
            "{}",
            RiskLevel::Medium,
            &key,
            now,
        )? {
            proposed += 1;
        }
    }

    // follow_up_email: silence > N days on open commitments.
    for client in store.list_clients()? {
        for commitment in store.list_open_commitments_for_client(&client.id)? {
            let Ok(created) = chrono::DateTime::parse_from_rfc3339(&commitment.created_at) else { continue };
            let Ok(now_dt) = chrono::DateTime::parse_from_rfc3339(now) else { continue };
            if (now_dt - created).num_days() <= COMMITMENT_SILENCE_DAYS {
                continue;
            }
            let key = format!("follow_up_email:commitment:{}", commitment.id);
            if propose(
                store,
                MoveType::FollowUpEmail,
                "commitment",
                &commitment.id,
                "Open commitment with no recent activity",
                "{}",
                RiskLevel::Low,
                &key,
                now,
            )? {
                proposed += 1;
            }
        }
    }

    // reassign_overload: person estimated utilization > 100%.
    for lane in store.list_lanes()? {
        if lane.weekly_hours <= 0.0 {
            continue;
        }
        if lane.allocated_hours / lane.weekly_hours <= 1.0 {
            continue;
        }
        let key = format!("reassign_overload:lane:{}", lane.id);
        if propose(
            store,
            MoveType::ReassignOverload,
            "capacity_lane",
            &lane.id,
            &format!(
                "Lane '{}' allocated {:.1}h against {:.1}h capacity",
                lane.name, lane.allocated_hours, lane.weekly_hours
            ),
            "{}",
            RiskLevel::Low,
            &key,
            now,
        )? {
            proposed += 1;
        }
    }

    // schedule_meeting: no contact logged > N days for tier-A clients.
    for client in store.list_clients()? {
        if client.tier != "A" {
            continue;
        }
        let stale = match &client.last_contact_at {
            None => true,
            Some(last_contact) => chrono::DateTime::parse_from_rfc3339(last_contact)
                .ok()
                .and_then(|last| {
                    chrono::DateTime::parse_from_rfc3339(now)
                        .ok()
                        .map(|now_dt| (now_dt - last).num_days() > NO_CONTACT_DAYS_TIER_A)
                })
                .unwrap_or(false),
        };
        if !stale {
            continue;
        }
        let key = format!("schedule_meeting:client:{}", client.id);
        if propose(
            store,
            MoveType::ScheduleMeeting,
            "client",
            &client.id,
            "No contact logged recently for a tier-A client",
            "{}",
            RiskLevel::Low,
            &key,
            now,
        )? {
            proposed += 1;
        }
    }

    // resolve_link: unresolved link-status issue > N days old.
    for item in store.list_open_resolution_queue()? {
        let Ok(created) = chrono::DateTime::parse_from_rfc3339(&item.created_at) else { continue };
        let Ok(now_dt) = chrono::DateTime::parse_from_rfc3339(now) else { continue };
        if (now_dt - created).num_days() <= LINK_ISSUE_STALE_DAYS {
            continue;
        }
        if !matches!(item.issue_type.as_str(), "missing_project" | "missing_client" | "unlinked_comm") {
            continue;
        }
        let key = format!("resolve_link:{}:{}:{}", item.entity_type, item.entity_id, item.issue_type);
        if propose(
            store,
            MoveType::ResolveLink,
            &item.entity_type,
            &item.entity_id,
            &format!("Link issue '{}' unresolved past {LINK_ISSUE_STALE_DAYS} days", item.issue_type),
            "{}",
            RiskLevel::Low,
            &key,
            now,
        )? {
            proposed += 1;
        }
    }

    let _ = today;
    Ok(MovesReport { proposed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::types::{ClientLifecycle, ClientTier};

    #[test]
    fn collection_call_proposed_once_per_idempotency_key() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_client("c1", "Acme", ClientTier::A, ClientLifecycle::Active, "2026-01-01T00:00:00Z")
            .unwrap();
        store
            .update_client_derived_fields("c1", 50.0, 5000.0, "31-60", "steady", "2026-01-01T00:00:00Z")
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let report1 = run(&store, today, "2026-01-15T00:00:00Z").unwrap();
        let report2 = run(&store, today, "2026-01-16T00:00:00Z").unwrap();

        assert_eq!(report1.proposed, 1);
        assert_eq!(report2.proposed, 0);
        assert_eq!(store.list_pending_actions().unwrap().len(), 1);
    }

    #[test]
    fn below_threshold_ar_does_not_propose_collection_call() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_client("c1", "Acme", ClientTier::A, ClientLifecycle::Active, "2026-01-01T00:00:00Z")
            .unwrap();
        store
            .update_client_derived_fields("c1", 50.0, 100.0, "31-60", "steady", "2026-01-01T00:00:00Z")
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let report = run(&store, today, "2026-01-15T00:00:00Z").unwrap();
        assert_eq!(report.proposed, 0);
    }
}
