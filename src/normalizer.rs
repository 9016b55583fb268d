//! Single-pass, idempotent derivation over tasks, communications, and
//! invoices. Owns every field listed as "derived" in the data model;
//! collectors never write these fields.

use crate::db::Store;
use crate::error::NormalizeError;
use crate::types::{AgingBucket, ClientLinkStatus, ProjectLinkStatus};
use chrono::NaiveDate;

pub struct NormalizeReport {
    pub tasks_linked: i64,
    pub communications_linked: i64,
    pub invoices_aged: i64,
}

/// Resolves a task's project -> brand -> client chain and returns the
/// derived link statuses plus resolved brand/client ids. Pure function over
/// already-fetched rows so the chain-resolution rules are directly
/// testable without a store.
pub fn resolve_task_chain(
    project: Option<&crate::db::projects::DbProject>,
) -> (ProjectLinkStatus, ClientLinkStatus, Option<String>, Option<String>) {
    let Some(project) = project else {
        return (ProjectLinkStatus::Unlinked, ClientLinkStatus::NotApplicable, None, None);
    };

    if project.is_internal {
        return (
            ProjectLinkStatus::Linked,
            ClientLinkStatus::NotApplicable,
            None,
            None,
        );
    }

    match (&project.brand_id, &project.client_id) {
        (Some(brand_id), Some(client_id)) => (
            ProjectLinkStatus::Linked,
            ClientLinkStatus::Linked,
            Some(brand_id.clone()),
            Some(client_id.clone()),
        ),
        _ => (
            ProjectLinkStatus::Partial,
            ClientLinkStatus::Unlinked,
            project.brand_id.clone(),
            project.client_id.clone(),
        ),
    }
}

/// Days past due, floored at zero, used to pick an aging bucket. `today` is
/// the cycle's reference date rather than a live clock read.
pub fn days_past_due(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - due_date).num_days().max(0)
}

pub fn run(store: &Store, today: NaiveDate, now: &str) -> Result<NormalizeReport, NormalizeError> {
    let mut tasks_linked = 0i64;
    let mut communications_linked = 0i64;
    let mut invoices_aged = 0i64;

    for task in store.list_open_tasks()? {
        let project = match &task.project_id {
            Some(project_id) => store.get_project(project_id)?,
            None => None,
        };
        let (project_link_status, client_link_status, brand_id, client_id) =
            resolve_task_chain(project.as_ref());

        let assignee_person_id = match &task.assignee_raw {
            Some(raw) if raw.contains('@') => {
                let tm = store.get_or_create_team_member(
                    &format!("tm_{}", sanitize_for_id(raw)),
                    raw,
                    raw,
                    now,
                )?;
                Some(tm.id)
            }
            _ => task.assignee_person_id.clone(),
        };

        store.update_task_links(
            &task.id,
            brand_id.as_deref(),
            client_id.as_deref(),
            project_link_status,
            client_link_status,
            assignee_person_id.as_deref(),
            now,
        )?;
        tasks_linked += 1;
    }

    for comm in store.list_unlinked_communications()? {
        let from_domain = derive_from_domain(&comm.sender);
        let client_id = from_domain
            .as_deref()
            .map(|domain| store.find_client_by_identity(None, Some(domain)))
            .transpose()?
            .flatten();
        let link_status = if client_id.is_some() {
            ClientLinkStatus::Linked
        } else {
            ClientLinkStatus::Unlinked
        };
        store.update_communication_link(
            &comm.id,
            from_domain.as_deref(),
            client_id.as_deref(),
            link_status,
            now,
        )?;
        communications_linked += 1;
    }

    for invoice in store.list_unpaid_invoices()? {
        if invoice.client_id.is_none() {
            if let Some(contact_name) = &invoice.contact_name {
                if let Some(client_id) = store.find_client_by_name(contact_name)? {
                    store.update_invoice_client(&invoice.id, &client_id, now)?;
                }
            }
        }

        if let Some(due_date_str) = &invoice.due_date {
            if let Ok(due_date) = NaiveDate::parse_from_str(due_date_str, "%Y-%m-%d") {
                let bucket = AgingBucket::from_days_past_due(days_past_due(due_date, today));
                store.update_invoice_aging_bucket(&invoice.id, bucket, now)?;
                invoices_aged += 1;
            }
        }
    }

    rebuild_client_ar_aggregates(store, now)?;

    Ok(NormalizeReport {
        tasks_linked,
        communications_linked,
        invoices_aged,
    })
}

/// The sole owner of `from_domain`: collectors never set it, so every
/// communication gets it recomputed fresh each cycle from `sender`.
fn derive_from_domain(sender: &str) -> Option<String> {
    sender.split('@').nth(1).map(|d| d.to_lowercase())
}

fn sanitize_for_id(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn rebuild_client_ar_aggregates(store: &Store, now: &str) -> Result<(), NormalizeError> {
    for client in store.list_clients()? {
        let unpaid = store.list_unpaid_invoices_for_client(&client.id)?;
        let total: f64 = unpaid.iter().map(|i| i.amount).sum();
        let worst_bucket = unpaid
            .iter()
            .filter_map(|i| i.aging_bucket.as_deref().map(AgingBucket::from_db))
            .max_by_key(|b| b.severity());

        let aging_str = worst_bucket.map(|b| b.as_db_str().to_string()).unwrap_or_else(|| "current".to_string());
        let health_score = client.health_score.unwrap_or(100.0);
        let trend = client.relationship_trend.clone().unwrap_or_else(|| "steady".to_string());

        store.update_client_derived_fields(&client.id, health_score, total, &aging_str, &trend, now)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::projects::DbProject;

    fn sample_project(is_internal: bool, brand_id: Option<&str>, client_id: Option<&str>) -> DbProject {
        DbProject {
            id: "p1".into(),
            brand_id: brand_id.map(String::from),
            client_id: client_id.map(String::from),
            is_internal,
            name: "Project".into(),
            status: "active".into(),
            health_color: "green".into(),
            deadline: None,
            task_count: 0,
            completed_task_count: 0,
            completion_percent: 0.0,
            slip_risk: None,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn no_project_yields_unlinked_and_not_applicable() {
        let (proj_status, client_status, brand, client) = resolve_task_chain(None);
        assert_eq!(proj_status, ProjectLinkStatus::Unlinked);
        assert_eq!(client_status, ClientLinkStatus::NotApplicable);
        assert!(brand.is_none());
        assert!(client.is_none());
    }

    #[test]
    fn internal_project_yields_linked_and_not_applicable() {
        let project = sample_project(true, None, None);
        let (proj_status, client_status, _, client) = resolve_task_chain(Some(&project));
        assert_eq!(proj_status, ProjectLinkStatus::Linked);
        assert_eq!(client_status, ClientLinkStatus::NotApplicable);
        assert!(client.is_none());
    }

    #[test]
    fn full_chain_yields_linked_and_linked() {
        let project = sample_project(false, Some("b1"), Some("c1"));
        let (proj_status, client_status, brand, client) = resolve_task_chain(Some(&project));
        assert_eq!(proj_status, ProjectLinkStatus::Linked);
        assert_eq!(client_status, ClientLinkStatus::Linked);
        assert_eq!(brand.as_deref(), Some("b1"));
        assert_eq!(client.as_deref(), Some("c1"));
    }

    #[test]
    fn broken_chain_yields_partial_and_unlinked() {
        let project = sample_project(false, Some("b1"), None);
        let (proj_status, client_status, _, _) = resolve_task_chain(Some(&project));
        assert_eq!(proj_status, ProjectLinkStatus::Partial);
        assert_eq!(client_status, ClientLinkStatus::Unlinked);
    }

    #[test]
    fn days_past_due_floors_at_zero() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let future_due = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        assert_eq!(days_past_due(future_due, today), 0);
    }

    #[test]
    fn from_domain_is_derived_lowercase_from_sender() {
        assert_eq!(derive_from_domain("Client@ACME.com"), Some("acme.com".to_string()));
        assert_eq!(derive_from_domain("no-at-sign"), None);
    }
}
