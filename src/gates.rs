//! Data-quality gate battery, evaluated against the store after
//! normalization. Produces a `GateReport` and, from it, a per-domain
//! confidence level.

use crate::db::Store;
use crate::error::GateError;
use crate::types::DomainConfidence;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub pass: bool,
    pub value: Option<f64>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GateReport {
    pub gates: BTreeMap<String, GateResult>,
}

impl GateReport {
    pub fn passed(&self, name: &str) -> bool {
        self.gates.get(name).map(|g| g.pass).unwrap_or(false)
    }
}

const DELIVERY_BLOCKING: &[&str] = &["data_integrity"];
const DELIVERY_QUALITY: &[&str] = &["project_brand_required", "project_client_populated"];
const CLIENTS_BLOCKING: &[&str] = &["data_integrity"];
const CLIENTS_QUALITY: &[&str] = &["client_coverage"];
const CASH_BLOCKING: &[&str] = &["data_integrity", "finance_ar_clean"];
const CASH_QUALITY: &[&str] = &["finance_ar_coverage"];
const COMMS_BLOCKING: &[&str] = &["data_integrity"];
const COMMS_QUALITY: &[&str] = &["commitment_ready"];
const CAPACITY_BLOCKING: &[&str] = &["data_integrity", "capacity_baseline"];
const CAPACITY_QUALITY: &[&str] = &[];

pub fn domain_confidence(report: &GateReport) -> BTreeMap<&'static str, DomainConfidence> {
    let domains: &[(&str, &[&str], &[&str])] = &[
        ("delivery", DELIVERY_BLOCKING, DELIVERY_QUALITY),
        ("clients", CLIENTS_BLOCKING, CLIENTS_QUALITY),
        ("cash", CASH_BLOCKING, CASH_QUALITY),
        ("comms", COMMS_BLOCKING, COMMS_QUALITY),
        ("capacity", CAPACITY_BLOCKING, CAPACITY_QUALITY),
    ];

    domains
        .iter()
        .map(|(name, blocking, quality)| {
            let level = if blocking.iter().any(|g| !report.passed(g)) {
                DomainConfidence::Blocked
            } else if quality.iter().any(|g| !report.passed(g)) {
                DomainConfidence::Degraded
            } else {
                DomainConfidence::Reliable
            };
            (*name, level)
        })
        .collect()
}

fn gate(pass: bool, value: Option<f64>, message: impl Into<String>) -> GateResult {
    GateResult {
        pass,
        value,
        message: message.into(),
    }
}

pub fn evaluate(store: &Store) -> Result<GateReport, GateError> {
    let mut gates = BTreeMap::new();

    let tasks = store.list_open_tasks()?;
    let projects = store.list_projects()?;
    let invoices = store.list_unpaid_invoices()?;
    let lanes = store.list_lanes()?;
    let comms = store.list_communications()?;
    let clients = store.list_clients()?;

    // data_integrity: the six invariants from the data model, checked over
    // tasks, projects, and communications currently in the store.
    let mut integrity_violations = 0;
    for task in &tasks {
        match task.project_link_status.as_str() {
            "linked" if task.project_id.is_none() => integrity_violations += 1,
            "unlinked" if task.project_id.is_some() => integrity_violations += 1,
            "partial" if task.project_id.is_none() => integrity_violations += 1,
            _ => {}
        }
        if task.client_link_status == "n/a" {
            if let Some(project_id) = &task.project_id {
                if let Some(project) = projects.iter().find(|p| &p.id == project_id) {
                    if !project.is_internal {
                        integrity_violations += 1;
                    }
                }
            }
        }
    }
    for project in &projects {
        if project.is_internal && (project.client_id.is_some() || project.brand_id.is_some()) {
            integrity_violations += 1;
        }
    }
    // Invariant 6: a `linked` communication must reference a real client.
    for comm in &comms {
        if comm.link_status == "linked" {
            let resolves = comm
                .client_id
                .as_deref()
                .is_some_and(|id| clients.iter().any(|c| c.id == id));
            if !resolves {
                integrity_violations += 1;
            }
        }
    }
    gates.insert(
        "data_integrity".to_string(),
        gate(
            integrity_violations == 0,
            Some(integrity_violations as f64),
            format!("{integrity_violations} invariant violation(s)"),
        ),
    );

    let non_internal_missing_brand = projects
        .iter()
        .filter(|p| !p.is_internal && p.brand_id.is_none())
        .count();
    gates.insert(
        "project_brand_required".to_string(),
        gate(
            non_internal_missing_brand == 0,
            Some(non_internal_missing_brand as f64),
            format!("{non_internal_missing_brand} non-internal project(s) missing brand_id"),
        ),
    );

    // project_brand_consistency has no brand-level client_id to cross-check
    // without a brand fetch; every project row already carries its
    // resolved client_id directly, so this gate passes trivially once
    // project_brand_required passes (no divergent source of truth exists
    // in this schema).
    gates.insert(
        "project_brand_consistency".to_string(),
        gate(true, Some(0.0), "no brand/project client_id divergence possible"),
    );

    let non_internal_missing_client = projects
        .iter()
        .filter(|p| !p.is_internal && p.client_id.is_none())
        .count();
    gates.insert(
        "project_client_populated".to_string(),
        gate(
            non_internal_missing_client == 0,
            Some(non_internal_missing_client as f64),
            format!("{non_internal_missing_client} non-internal project(s) missing client_id"),
        ),
    );

    let internal_with_client = projects
        .iter()
        .filter(|p| p.is_internal && (p.client_id.is_some() || p.brand_id.is_some()))
        .count();
    gates.insert(
        "internal_project_client_null".to_string(),
        gate(
            internal_with_client == 0,
            Some(internal_with_client as f64),
            format!("{internal_with_client} internal project(s) with non-null client/brand"),
        ),
    );

    let non_na_tasks: Vec<_> = tasks.iter().filter(|t| t.client_link_status != "n/a").collect();
    let client_coverage = if non_na_tasks.is_empty() {
        1.0
    } else {
        non_na_tasks.iter().filter(|t| t.client_link_status == "linked").count() as f64
            / non_na_tasks.len() as f64
    };
    gates.insert(
        "client_coverage".to_string(),
        gate(
            client_coverage >= 0.80,
            Some(client_coverage),
            format!("{:.2} of non-n/a tasks have a linked client", client_coverage),
        ),
    );

    let ready = if comms.is_empty() {
        1.0
    } else {
        comms
            .iter()
            .filter(|c| c.body_text.as_ref().map(|b| b.len() >= 50).unwrap_or(false))
            .count() as f64
            / comms.len() as f64
    };
    gates.insert(
        "commitment_ready".to_string(),
        gate(
            ready >= 0.50,
            Some(ready),
            format!("{:.2} of communications have body_text >= 50 chars", ready),
        ),
    );

    let ar_complete = invoices
        .iter()
        .filter(|i| i.client_id.is_some() && i.due_date.is_some())
        .count();
    let finance_ar_coverage = if invoices.is_empty() {
        1.0
    } else {
        ar_complete as f64 / invoices.len() as f64
    };
    gates.insert(
        "finance_ar_coverage".to_string(),
        gate(
            finance_ar_coverage >= 0.95,
            Some(finance_ar_coverage),
            format!("{:.2} of AR invoices have client_id and due_date", finance_ar_coverage),
        ),
    );

    let ar_missing = invoices.len() - ar_complete;
    gates.insert(
        "finance_ar_clean".to_string(),
        gate(
            ar_missing == 0,
            Some(ar_missing as f64),
            format!("{ar_missing} AR invoice(s) missing client_id or due_date"),
        ),
    );

    let bad_lanes = lanes.iter().filter(|l| l.weekly_hours <= 0.0).count();
    gates.insert(
        "capacity_baseline".to_string(),
        gate(
            bad_lanes == 0,
            Some(bad_lanes as f64),
            format!("{bad_lanes} capacity lane(s) with weekly_hours <= 0"),
        ),
    );

    Ok(GateReport { gates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn empty_store_passes_all_gates() {
        let store = Store::open_in_memory().unwrap();
        let report = evaluate(&store).unwrap();
        assert!(report.gates.values().all(|g| g.pass));
    }

    #[test]
    fn all_domains_reliable_when_gates_pass() {
        let store = Store::open_in_memory().unwrap();
        let report = evaluate(&store).unwrap();
        let confidence = domain_confidence(&report);
        assert!(confidence.values().all(|c| matches!(c, DomainConfidence::Reliable)));
    }

    #[test]
    fn internal_project_with_client_id_fails_integrity_and_blocks_domains() {
        let store = Store::open_in_memory().unwrap();
        store.conn.execute(
            "INSERT INTO projects (id, client_id, is_internal, name, created_at, updated_at)
             VALUES ('p1', 'c1', 1, 'Internal Tooling', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        ).unwrap();

        let report = evaluate(&store).unwrap();
        assert!(!report.passed("data_integrity"));
        assert!(!report.passed("internal_project_client_null"));

        let confidence = domain_confidence(&report);
        assert_eq!(confidence["delivery"], DomainConfidence::Blocked);
    }

    #[test]
    fn linked_communication_without_a_real_client_fails_data_integrity() {
        let store = Store::open_in_memory().unwrap();
        store.conn.execute(
            "INSERT INTO communications (id, sender, received_at, content_hash, link_status, created_at, updated_at)
             VALUES ('comm1', 'a@example.com', '2026-01-01T00:00:00Z', 'hash1', 'linked', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        ).unwrap();

        let report = evaluate(&store).unwrap();
        assert!(!report.passed("data_integrity"));
    }

    #[test]
    fn linked_communication_with_a_real_client_passes_data_integrity() {
        use crate::types::{ClientLifecycle, ClientTier};

        let store = Store::open_in_memory().unwrap();
        store
            .upsert_client("c1", "Acme", ClientTier::A, ClientLifecycle::Active, "2026-01-01T00:00:00Z")
            .unwrap();
        store.conn.execute(
            "INSERT INTO communications (id, sender, received_at, content_hash, client_id, link_status, created_at, updated_at)
             VALUES ('comm1', 'a@example.com', '2026-01-01T00:00:00Z', 'hash1', 'c1', 'linked', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        ).unwrap();

        let report = evaluate(&store).unwrap();
        assert!(report.passed("data_integrity"));
    }
}
