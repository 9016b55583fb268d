//! Xero analogue collector. Prefix `xero_`. Pulls outstanding invoices; the
//! aging bucket computed here at collection time is provisional and is
//! deterministically recomputed by the normalizer every cycle.

use crate::collectors::{Collector, CollectorRunReport};
use crate::db::invoices::CollectedInvoice;
use crate::db::Store;
use crate::error::CollectorError;
use async_trait::async_trait;

const SOURCE: &str = "xero";
const PREFIX: &str = "xero_";

pub struct RawXeroInvoice {
    pub id: String,
    pub contact_name: String,
    pub amount: f64,
    pub currency: String,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub status: String,
    pub paid_date: Option<String>,
}

pub struct XeroCollector;

#[async_trait]
impl Collector for XeroCollector {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn poll(&self, store: &Store, now: &str) -> Result<CollectorRunReport, CollectorError> {
        let artifacts = fetch_outstanding_invoices().await?;

        for artifact in &artifacts {
            let id = format!("{PREFIX}{}", artifact.id);
            // client_id resolution by contact_name happens in the
            // normalizer; the collector writes its own source fields only.
            let collected = CollectedInvoice {
                id: &id,
                contact_name: Some(&artifact.contact_name),
                amount: artifact.amount,
                currency: &artifact.currency,
                issue_date: artifact.issue_date.as_deref(),
                due_date: artifact.due_date.as_deref(),
                status: &artifact.status,
                paid_date: artifact.paid_date.as_deref(),
            };
            store
                .upsert_collected_invoice(&collected, now)
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

async fn fetch_outstanding_invoices() -> Result<Vec<RawXeroInvoice>, CollectorError> {
    Ok(Vec::new())
}
