//! Snapshot generator: aggregates store + gate report into a single JSON
//! document, writes it atomically, and computes a delta against the
//! previous snapshot.

use crate::config::Config;
use crate::db::Store;
use crate::error::SnapshotError;
use crate::gates::{domain_confidence, GateReport};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRollup {
    pub id: String,
    pub name: String,
    pub health_color: String,
    pub completion_percent: f64,
    pub slip_risk: Option<f64>,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPortfolioEntry {
    pub id: String,
    pub name: String,
    pub tier: String,
    pub health_score: Option<f64>,
    pub ar_outstanding: f64,
    pub ar_aging: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CashRollup {
    pub total_outstanding: f64,
    pub ar_aging: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommsRollup {
    pub unlinked_count: i64,
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityLaneSummary {
    pub name: String,
    pub weekly_hours: f64,
    pub allocated_hours: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveSummary {
    pub id: String,
    pub move_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub rationale: String,
    pub risk_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Deltas {
    pub gate_flips: Vec<String>,
    pub new_issues: Vec<String>,
    pub resolved_issues: Vec<String>,
    pub health_color_changes: Vec<String>,
    pub ar_bucket_transitions: Vec<String>,
    pub domain_level_changes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: String,
    pub cycle_number: i64,
    pub gates: BTreeMap<String, crate::gates::GateResult>,
    pub domain_confidence: BTreeMap<String, String>,
    pub delivery: Vec<ProjectRollup>,
    pub clients: Vec<ClientPortfolioEntry>,
    pub cash: CashRollup,
    pub comms: CommsRollup,
    pub capacity: Vec<CapacityLaneSummary>,
    pub moves: Vec<MoveSummary>,
    pub deltas: Deltas,
    /// Composite `(entity_type, entity_id, issue_type)` keys of every open
    /// resolution-queue item at this cycle. Carried on the snapshot itself
    /// (rather than re-queried from the store) so the next cycle's
    /// `compute_deltas` can diff new/resolved issues purely from the
    /// previous snapshot file, the same way it diffs gates and health
    /// colors.
    pub open_issue_keys: BTreeSet<String>,
}

pub fn build(
    store: &Store,
    gate_report: &GateReport,
    cycle_number: i64,
    generated_at: &str,
) -> Result<Snapshot, SnapshotError> {
    let projects = store.list_projects()?;
    let delivery = projects
        .iter()
        .map(|p| ProjectRollup {
            id: p.id.clone(),
            name: p.name.clone(),
            health_color: p.health_color.clone(),
            completion_percent: p.completion_percent,
            slip_risk: p.slip_risk,
            deadline: p.deadline.clone(),
        })
        .collect();

    let clients = store
        .list_clients()?
        .into_iter()
        .map(|c| ClientPortfolioEntry {
            id: c.id,
            name: c.name,
            tier: c.tier,
            health_score: c.health_score,
            ar_outstanding: c.ar_outstanding,
            ar_aging: c.ar_aging,
        })
        .collect();

    let unpaid = store.list_unpaid_invoices()?;
    let mut ar_aging: BTreeMap<String, f64> = BTreeMap::new();
    let mut total_outstanding = 0.0;
    for invoice in &unpaid {
        total_outstanding += invoice.amount;
        let bucket = invoice.aging_bucket.clone().unwrap_or_else(|| "current".to_string());
        *ar_aging.entry(bucket).or_insert(0.0) += invoice.amount;
    }

    let unlinked_comms = store.list_unlinked_communications()?;
    let all_comms = store.list_communications()?;
    let comms = CommsRollup {
        unlinked_count: unlinked_comms.len() as i64,
        total_count: all_comms.len() as i64,
    };

    let capacity = store
        .list_lanes()?
        .into_iter()
        .map(|l| CapacityLaneSummary {
            name: l.name,
            weekly_hours: l.weekly_hours,
            allocated_hours: l.allocated_hours,
            utilization: if l.weekly_hours > 0.0 {
                l.allocated_hours / l.weekly_hours
            } else {
                0.0
            },
        })
        .collect();

    let moves = store
        .list_pending_actions()?
        .into_iter()
        .take(20)
        .map(|a| MoveSummary {
            id: a.id,
            move_type: a.move_type,
            entity_type: a.entity_type,
            entity_id: a.entity_id,
            rationale: a.rationale,
            risk_level: a.risk_level,
        })
        .collect();

    let confidence = domain_confidence(gate_report);
    let domain_confidence_map = confidence
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.as_db_str().to_string()))
        .collect();

    let open_issue_keys = store
        .list_open_resolution_queue()?
        .into_iter()
        .map(|item| format!("{}:{}:{}", item.entity_type, item.entity_id, item.issue_type))
        .collect();

    Ok(Snapshot {
        generated_at: generated_at.to_string(),
        cycle_number,
        gates: gate_report.gates.clone(),
        domain_confidence: domain_confidence_map,
        delivery,
        clients,
        cash: CashRollup {
            total_outstanding,
            ar_aging,
        },
        comms,
        capacity,
        moves,
        deltas: Deltas::default(),
        open_issue_keys,
    })
}

/// Compares the new snapshot against the previously written one (if any)
/// and fills in the `deltas` section.
pub fn compute_deltas(current: &mut Snapshot, previous: Option<&Snapshot>) {
    let Some(previous) = previous else { return };

    for (gate, result) in &current.gates {
        if let Some(prev_result) = previous.gates.get(gate) {
            if prev_result.pass != result.pass {
                current.deltas.gate_flips.push(gate.clone());
            }
        }
    }

    for key in &current.open_issue_keys {
        if !previous.open_issue_keys.contains(key) {
            current.deltas.new_issues.push(key.clone());
        }
    }
    for key in &previous.open_issue_keys {
        if !current.open_issue_keys.contains(key) {
            current.deltas.resolved_issues.push(key.clone());
        }
    }

    for (domain, level) in &current.domain_confidence {
        if let Some(prev_level) = previous.domain_confidence.get(domain) {
            if prev_level != level {
                current.deltas.domain_level_changes.push(domain.clone());
            }
        }
    }

    let prev_projects: BTreeMap<_, _> = previous.delivery.iter().map(|p| (p.id.clone(), p.health_color.clone())).collect();
    for project in &current.delivery {
        if let Some(prev_color) = prev_projects.get(&project.id) {
            if prev_color != &project.health_color {
                current.deltas.health_color_changes.push(project.id.clone());
            }
        }
    }

    for (bucket, amount) in &current.cash.ar_aging {
        let prev_amount = previous.cash.ar_aging.get(bucket).copied().unwrap_or(0.0);
        if (prev_amount - amount).abs() > f64::EPSILON && *amount > 0.0 && prev_amount == 0.0 {
            current.deltas.ar_bucket_transitions.push(bucket.clone());
        }
    }
}

/// Atomic write: temp file in the same directory, fsync, rename over the
/// final path. The prior snapshot is preserved as `previous_snapshot.json`
/// before the rename so readers never observe a partially written document.
pub fn write_atomic(config: &Config, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    fs::create_dir_all(&config.data_dir)?;
    fs::create_dir_all(config.snapshot_dir())?;

    let current_path = config.current_snapshot_path();
    let previous_path = config.previous_snapshot_path();

    if current_path.exists() {
        fs::copy(&current_path, &previous_path)?;
    }

    let tmp_path = current_path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        let json = serde_json::to_vec_pretty(snapshot)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, &current_path)?;

    let history_path = config
        .snapshot_dir()
        .join(format!("snapshot_{}.json", snapshot.cycle_number));
    fs::write(&history_path, serde_json::to_vec_pretty(snapshot)?)?;

    Ok(())
}

pub fn read_previous(path: &Path) -> Option<Snapshot> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::GateResult;

    fn sample_snapshot(cycle: i64, gate_pass: bool, issues: &[&str]) -> Snapshot {
        let mut gates = BTreeMap::new();
        gates.insert(
            "client_coverage".to_string(),
            GateResult {
                pass: gate_pass,
                value: Some(if gate_pass { 0.82 } else { 0.75 }),
                message: "".to_string(),
            },
        );
        let mut domain_confidence = BTreeMap::new();
        domain_confidence.insert(
            "clients".to_string(),
            if gate_pass { "reliable" } else { "degraded" }.to_string(),
        );

        Snapshot {
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            cycle_number: cycle,
            gates,
            domain_confidence,
            delivery: Vec::new(),
            clients: Vec::new(),
            cash: CashRollup::default(),
            comms: CommsRollup {
                unlinked_count: 0,
                total_count: 0,
            },
            capacity: Vec::new(),
            moves: Vec::new(),
            deltas: Deltas::default(),
            open_issue_keys: issues.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn identical_snapshots_produce_empty_deltas() {
        let previous = sample_snapshot(1, true, &[]);
        let mut current = sample_snapshot(2, true, &[]);
        compute_deltas(&mut current, Some(&previous));
        assert!(current.deltas.gate_flips.is_empty());
        assert!(current.deltas.domain_level_changes.is_empty());
        assert!(current.deltas.new_issues.is_empty());
        assert!(current.deltas.resolved_issues.is_empty());
    }

    #[test]
    fn gate_flip_is_detected_and_domain_level_change_follows() {
        let previous = sample_snapshot(1, true, &[]);
        let mut current = sample_snapshot(2, false, &[]);
        compute_deltas(&mut current, Some(&previous));
        assert_eq!(current.deltas.gate_flips, vec!["client_coverage".to_string()]);
        assert_eq!(current.deltas.domain_level_changes, vec!["clients".to_string()]);
    }

    #[test]
    fn new_and_resolved_issues_are_detected_against_previous_open_set() {
        let previous = sample_snapshot(1, true, &["task:t1:overdue", "task:t2:stale"]);
        let mut current = sample_snapshot(2, true, &["task:t1:overdue", "task:t3:blocked"]);
        compute_deltas(&mut current, Some(&previous));
        assert_eq!(current.deltas.new_issues, vec!["task:t3:blocked".to_string()]);
        assert_eq!(current.deltas.resolved_issues, vec!["task:t2:stale".to_string()]);
    }
}
