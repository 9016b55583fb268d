//! Scoring formulas over post-normalization store state, plus the
//! store-integration pass that applies them each cycle. The formulas
//! themselves take their inputs explicitly and do no I/O, so the boundary
//! laws in the testable-properties section are checkable without a store;
//! `recompute_and_persist` is the one function here that touches the store.

use crate::types::{Horizon, ProjectHealthColor};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Med,
    Low,
}

impl Confidence {
    fn scalar(self) -> f64 {
        match self {
            Confidence::High => 1.0,
            Confidence::Med => 0.6,
            Confidence::Low => 0.3,
        }
    }
}

pub struct BaseScoreInputs {
    pub impact: f64,
    pub urgency: f64,
    pub controllability: f64,
    pub confidence: Confidence,
}

/// `0.30*Impact + 0.30*Urgency + 0.20*Controllability + 0.20*ConfidenceScalar`.
/// Weights are locked constants, not configuration.
pub fn base_score(inputs: &BaseScoreInputs) -> f64 {
    0.30 * inputs.impact + 0.30 * inputs.urgency + 0.20 * inputs.controllability + 0.20 * inputs.confidence.scalar()
}

/// Piecewise-linear urgency from time-to-consequence, in hours.
pub fn urgency_from_ttc(ttc_hours: f64) -> f64 {
    if ttc_hours <= 0.0 {
        1.0
    } else if ttc_hours <= 12.0 {
        1.0 - (ttc_hours / 12.0) * 0.3
    } else if ttc_hours <= 24.0 {
        0.7 - ((ttc_hours - 12.0) / 12.0) * 0.2
    } else if ttc_hours <= 168.0 {
        0.5 - ((ttc_hours - 24.0) / 144.0) * 0.4
    } else {
        (0.1 - (ttc_hours - 168.0) / 1000.0).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    OpsHead,
    CoFounder,
    Artist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Delivery,
    Clients,
    Cash,
    Comms,
    Capacity,
}

/// Fixed mode x domain weight matrix (§6). Values chosen so each mode
/// emphasizes the domains its name suggests while still weighting every
/// domain above zero.
pub fn domain_weight(mode: Mode, domain: Domain) -> f64 {
    match (mode, domain) {
        (Mode::OpsHead, Domain::Delivery) => 1.3,
        (Mode::OpsHead, Domain::Capacity) => 1.2,
        (Mode::OpsHead, Domain::Clients) => 0.9,
        (Mode::OpsHead, Domain::Cash) => 0.8,
        (Mode::OpsHead, Domain::Comms) => 0.8,

        (Mode::CoFounder, Domain::Cash) => 1.3,
        (Mode::CoFounder, Domain::Clients) => 1.2,
        (Mode::CoFounder, Domain::Delivery) => 0.9,
        (Mode::CoFounder, Domain::Comms) => 0.9,
        (Mode::CoFounder, Domain::Capacity) => 0.8,

        (Mode::Artist, Domain::Delivery) => 1.2,
        (Mode::Artist, Domain::Comms) => 1.1,
        (Mode::Artist, Domain::Clients) => 1.0,
        (Mode::Artist, Domain::Cash) => 0.7,
        (Mode::Artist, Domain::Capacity) => 0.7,
    }
}

pub fn mode_weighted_score(base: f64, mode: Mode, domain: Domain) -> f64 {
    base * domain_weight(mode, domain)
}

pub struct SlipRiskInputs {
    pub deadline_passed: bool,
    pub days_to_deadline: f64,
    pub remaining_work_ratio: f64,
    pub capacity_gap_ratio: f64,
    pub blocking_severity: f64,
}

/// `0.35*DeadlinePressure + 0.25*RemainingWorkRatio + 0.25*CapacityGapRatio + 0.15*BlockingSeverity`.
/// Always in [0, 1] given inputs in [0, 1].
pub fn slip_risk_score(inputs: &SlipRiskInputs) -> f64 {
    let deadline_pressure = if inputs.deadline_passed {
        1.0
    } else {
        (1.0 - inputs.days_to_deadline / 14.0).max(0.0)
    };
    let score = 0.35 * deadline_pressure
        + 0.25 * inputs.remaining_work_ratio
        + 0.25 * inputs.capacity_gap_ratio
        + 0.15 * inputs.blocking_severity;
    score.clamp(0.0, 1.0)
}

pub struct ClientHealthInputs {
    pub delivery: f64,
    pub finance: f64,
    pub responsiveness: f64,
    pub commitments: f64,
    pub capacity: f64,
}

/// Weighted average of five 0-100 sub-scores: delivery 0.30, finance 0.25,
/// responsiveness 0.20, commitments 0.15, capacity 0.10.
pub fn client_health_score(inputs: &ClientHealthInputs) -> f64 {
    0.30 * inputs.delivery
        + 0.25 * inputs.finance
        + 0.20 * inputs.responsiveness
        + 0.15 * inputs.commitments
        + 0.10 * inputs.capacity
}

pub struct ProjectHealthInputs {
    pub slip_risk: f64,
    pub has_blocked_critical_task: bool,
    pub has_blocked_tasks: bool,
    pub overdue: bool,
}

pub fn project_health_color(inputs: &ProjectHealthInputs) -> ProjectHealthColor {
    if inputs.slip_risk > 0.6 || inputs.has_blocked_critical_task || inputs.overdue {
        ProjectHealthColor::Red
    } else if (0.3..=0.6).contains(&inputs.slip_risk) || inputs.has_blocked_tasks {
        ProjectHealthColor::Yellow
    } else if inputs.slip_risk < 0.3 && !inputs.has_blocked_critical_task {
        ProjectHealthColor::Green
    } else {
        ProjectHealthColor::Yellow
    }
}

pub struct HorizonInputs {
    pub ttc_hours: f64,
    pub impact: f64,
    pub dependency_breaker: bool,
    pub capacity_blocker_today: bool,
    pub tomorrow_starts_broken: bool,
    pub overdue: bool,
    pub critical_path: bool,
    pub compounding_damage: bool,
    pub ar_severe: bool,
}

pub fn eligible_horizons(inputs: &HorizonInputs) -> Vec<Horizon> {
    let mut horizons = Vec::new();

    if inputs.ttc_hours <= 12.0
        || inputs.dependency_breaker
        || inputs.capacity_blocker_today
        || (inputs.impact >= 0.5 && inputs.ttc_hours <= 24.0)
    {
        horizons.push(Horizon::Now);
    }

    if inputs.ttc_hours <= 16.0
        || inputs.tomorrow_starts_broken
        || inputs.impact >= 0.5
        || inputs.ttc_hours <= 48.0
        || inputs.overdue
    {
        horizons.push(Horizon::Today);
    }

    if inputs.critical_path
        || inputs.compounding_damage
        || inputs.ar_severe
        || inputs.ttc_hours <= 168.0
        || inputs.impact > 0.3
    {
        horizons.push(Horizon::ThisWeek);
    }

    horizons
}

/// Convenience used by the snapshot generator to weight-sort across domains
/// without allocating a full matrix every call.
pub fn mode_weights_for(mode: Mode) -> HashMap<Domain, f64> {
    [
        Domain::Delivery,
        Domain::Clients,
        Domain::Cash,
        Domain::Comms,
        Domain::Capacity,
    ]
    .into_iter()
    .map(|d| (d, domain_weight(mode, d)))
    .collect()
}

/// Open commitments older than this with no status change count against a
/// client's commitments sub-score. Mirrors the silence window the moves
/// engine uses to escalate a `follow_up_email`.
const COMMITMENT_STALE_DAYS: i64 = 7;

/// Recomputes capacity-lane allocation, project rollups, and client health
/// from live store state and persists the results. Runs once per cycle,
/// ahead of snapshot assembly, so the snapshot reads freshly written
/// denormalized scores rather than the previous cycle's.
///
/// The schema has no project -> capacity-lane mapping, so a project's
/// `capacity_gap_ratio` input is approximated from org-wide lane
/// utilization rather than a per-project figure.
pub fn recompute_and_persist(
    store: &crate::db::Store,
    today: chrono::NaiveDate,
    now: &str,
) -> Result<(), crate::error::SnapshotError> {
    use chrono::{DateTime, NaiveDate};

    let open_tasks = store.list_open_tasks()?;

    for lane in store.list_lanes()? {
        let Some(person_id) = &lane.person_id else {
            continue;
        };
        let allocated_minutes: i64 = open_tasks
            .iter()
            .filter(|t| t.assignee_person_id.as_deref() == Some(person_id.as_str()))
            .filter_map(|t| t.duration_minutes)
            .sum();
        store.update_lane_allocation(&lane.id, allocated_minutes as f64 / 60.0, now)?;
    }

    let lanes = store.list_lanes()?;
    let total_weekly: f64 = lanes.iter().map(|l| l.weekly_hours).sum();
    let total_allocated: f64 = lanes.iter().map(|l| l.allocated_hours).sum();
    let capacity_gap_ratio = if total_weekly > 0.0 {
        (total_allocated / total_weekly - 1.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    for project in store.list_projects()? {
        let tasks = store.list_tasks_for_project(&project.id)?;
        let task_count = tasks.len() as i64;
        let completed_task_count = tasks.iter().filter(|t| t.status == "done").count() as i64;
        let completion_percent = if task_count > 0 {
            completed_task_count as f64 / task_count as f64 * 100.0
        } else {
            0.0
        };

        let open: Vec<_> = tasks.iter().filter(|t| t.status != "done").collect();
        let remaining_work_ratio = if task_count > 0 {
            open.len() as f64 / task_count as f64
        } else {
            0.0
        };
        let has_blocked_tasks = open.iter().any(|t| t.blocked);
        let has_blocked_critical_task = open.iter().any(|t| t.blocked && t.priority >= 80);
        let overdue = open.iter().any(|t| {
            t.due_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                .is_some_and(|due| due < today)
        });

        let (deadline_passed, days_to_deadline) = match project
            .deadline
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        {
            Some(deadline) => {
                let days = (deadline - today).num_days();
                (days < 0, days.max(0) as f64)
            }
            None => (false, 365.0),
        };

        let blocking_severity = if has_blocked_critical_task {
            1.0
        } else if has_blocked_tasks {
            0.5
        } else {
            0.0
        };

        let slip_risk = slip_risk_score(&SlipRiskInputs {
            deadline_passed,
            days_to_deadline,
            remaining_work_ratio,
            capacity_gap_ratio,
            blocking_severity,
        });
        let health_color = project_health_color(&ProjectHealthInputs {
            slip_risk,
            has_blocked_critical_task,
            has_blocked_tasks,
            overdue,
        });

        store.update_project_rollup(
            &project.id,
            task_count,
            completed_task_count,
            completion_percent,
            health_color,
            Some(slip_risk),
            now,
        )?;
    }

    let now_dt = DateTime::parse_from_rfc3339(now).ok();

    for client in store.list_clients()? {
        let comms = store.list_communications_for_client(&client.id)?;
        if let Some(latest) = comms.iter().map(|c| c.received_at.as_str()).max() {
            store.update_client_last_contact(&client.id, latest)?;
        }

        let days_since_contact = comms
            .iter()
            .map(|c| c.received_at.as_str())
            .max()
            .and_then(|at| DateTime::parse_from_rfc3339(at).ok())
            .and_then(|dt| now_dt.map(|n| (n - dt).num_days()));
        let responsiveness = match days_since_contact {
            None => 50.0,
            Some(d) if d <= 2 => 100.0,
            Some(d) if d <= 7 => 80.0,
            Some(d) if d <= 14 => 60.0,
            Some(d) if d <= 30 => 40.0,
            _ => 20.0,
        };

        let projects = store.list_projects_for_client(&client.id)?;
        let delivery = if projects.is_empty() {
            100.0
        } else {
            projects.iter().map(|p| p.completion_percent).sum::<f64>() / projects.len() as f64
        };

        let finance = match client.ar_aging.as_deref() {
            Some("1-30") => 80.0,
            Some("31-60") => 55.0,
            Some("61-90") => 30.0,
            Some("90+") => 10.0,
            _ => 100.0,
        };

        let open_commitments = store.list_open_commitments_for_client(&client.id)?;
        let commitments = if open_commitments.is_empty() {
            100.0
        } else {
            let stale = open_commitments
                .iter()
                .filter(|c| {
                    let created = match DateTime::parse_from_rfc3339(&c.created_at) {
                        Ok(d) => d,
                        Err(_) => return false,
                    };
                    now_dt.is_some_and(|n| (n - created).num_days() > COMMITMENT_STALE_DAYS)
                })
                .count();
            100.0 * (1.0 - stale as f64 / open_commitments.len() as f64)
        };

        let capacity = 100.0 - capacity_gap_ratio * 100.0;

        let health = client_health_score(&ClientHealthInputs {
            delivery,
            finance,
            responsiveness,
            commitments,
            capacity,
        });

        let trend = client.relationship_trend.clone().unwrap_or_else(|| "steady".to_string());
        store.update_client_derived_fields(
            &client.id,
            health,
            client.ar_outstanding,
            client.ar_aging.as_deref().unwrap_or("current"),
            &trend,
            now,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_boundary_values_match_spec() {
        assert_eq!(urgency_from_ttc(0.0), 1.0);
        assert!((urgency_from_ttc(12.0) - 0.7).abs() < 1e-9);
        assert!((urgency_from_ttc(24.0) - 0.5).abs() < 1e-9);
        assert!((urgency_from_ttc(168.0) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn urgency_never_goes_negative_past_the_tail() {
        assert!(urgency_from_ttc(2000.0) >= 0.0);
    }

    #[test]
    fn slip_risk_stays_in_unit_interval() {
        let inputs = SlipRiskInputs {
            deadline_passed: true,
            days_to_deadline: 0.0,
            remaining_work_ratio: 1.0,
            capacity_gap_ratio: 1.0,
            blocking_severity: 1.0,
        };
        assert_eq!(slip_risk_score(&inputs), 1.0);

        let zero_inputs = SlipRiskInputs {
            deadline_passed: false,
            days_to_deadline: 30.0,
            remaining_work_ratio: 0.0,
            capacity_gap_ratio: 0.0,
            blocking_severity: 0.0,
        };
        assert_eq!(slip_risk_score(&zero_inputs), 0.0);
    }

    #[test]
    fn base_score_uses_locked_weights() {
        let inputs = BaseScoreInputs {
            impact: 1.0,
            urgency: 1.0,
            controllability: 1.0,
            confidence: Confidence::High,
        };
        assert!((base_score(&inputs) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn project_health_red_when_overdue_regardless_of_slip_risk() {
        let inputs = ProjectHealthInputs {
            slip_risk: 0.1,
            has_blocked_critical_task: false,
            has_blocked_tasks: false,
            overdue: true,
        };
        assert_eq!(project_health_color(&inputs), ProjectHealthColor::Red);
    }

    #[test]
    fn now_horizon_triggers_on_low_ttc() {
        let inputs = HorizonInputs {
            ttc_hours: 6.0,
            impact: 0.1,
            dependency_breaker: false,
            capacity_blocker_today: false,
            tomorrow_starts_broken: false,
            overdue: false,
            critical_path: false,
            compounding_damage: false,
            ar_severe: false,
        };
        assert!(eligible_horizons(&inputs).contains(&Horizon::Now));
    }

    #[test]
    fn recompute_and_persist_derives_project_rollup_and_client_health() {
        use crate::db::tasks::CollectedTask;
        use crate::db::Store;
        use crate::types::{ClientLifecycle, ClientTier};
        use chrono::NaiveDate;

        let store = Store::open_in_memory().unwrap();
        let now = "2026-01-10T00:00:00Z";
        store
            .upsert_client("c1", "Acme", ClientTier::A, ClientLifecycle::Active, now)
            .unwrap();
        store
            .upsert_project("p1", None, Some("c1"), "Website Redesign", "active", Some("2026-01-20"), now)
            .unwrap();

        store
            .upsert_collected_task(
                &CollectedTask {
                    id: "t1",
                    source: "google_tasks",
                    source_id: None,
                    title: "Ship homepage",
                    status: "done",
                    priority: 50,
                    due_date: None,
                    duration_minutes: None,
                    notes: None,
                    project_id: Some("p1"),
                    assignee_raw: None,
                    blocked: false,
                },
                now,
            )
            .unwrap();
        store
            .upsert_collected_task(
                &CollectedTask {
                    id: "t2",
                    source: "google_tasks",
                    source_id: None,
                    title: "Ship footer",
                    status: "pending",
                    priority: 50,
                    due_date: None,
                    duration_minutes: None,
                    notes: None,
                    project_id: Some("p1"),
                    assignee_raw: None,
                    blocked: false,
                },
                now,
            )
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        recompute_and_persist(&store, today, now).unwrap();

        let project = store.get_project("p1").unwrap().unwrap();
        assert_eq!(project.task_count, 2);
        assert_eq!(project.completed_task_count, 1);
        assert!((project.completion_percent - 50.0).abs() < 1e-9);

        let client = store.get_client("c1").unwrap().unwrap();
        assert!(client.health_score.unwrap() > 0.0);
    }
}
