use crate::error::StoreError;
use crate::types::AgingBucket;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbInvoice {
    pub id: String,
    pub client_id: Option<String>,
    pub contact_name: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub status: String,
    pub paid_date: Option<String>,
    pub aging_bucket: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn row_to_invoice(row: &Row) -> rusqlite::Result<DbInvoice> {
    Ok(DbInvoice {
        id: row.get("id")?,
        client_id: row.get("client_id")?,
        contact_name: row.get("contact_name")?,
        amount: row.get("amount")?,
        currency: row.get("currency")?,
        issue_date: row.get("issue_date")?,
        due_date: row.get("due_date")?,
        status: row.get("status")?,
        paid_date: row.get("paid_date")?,
        aging_bucket: row.get("aging_bucket")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Fields a collector owns. `client_id` is derived from `contact_name` by
/// the normalizer and is never set here.
pub struct CollectedInvoice<'a> {
    pub id: &'a str,
    pub contact_name: Option<&'a str>,
    pub amount: f64,
    pub currency: &'a str,
    pub issue_date: Option<&'a str>,
    pub due_date: Option<&'a str>,
    pub status: &'a str,
    pub paid_date: Option<&'a str>,
}

impl Store {
    pub fn upsert_collected_invoice(&self, inv: &CollectedInvoice, now: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO invoices (
                id, contact_name, amount, currency, issue_date, due_date,
                status, paid_date, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(id) DO UPDATE SET
                contact_name = excluded.contact_name,
                amount = excluded.amount,
                currency = excluded.currency,
                issue_date = excluded.issue_date,
                due_date = excluded.due_date,
                status = excluded.status,
                paid_date = excluded.paid_date,
                updated_at = excluded.updated_at",
            params![
                inv.id,
                inv.contact_name,
                inv.amount,
                inv.currency,
                inv.issue_date,
                inv.due_date,
                inv.status,
                inv.paid_date,
                now
            ],
        )?;
        Ok(())
    }

    /// Recomputed by the normalizer from `due_date`/`paid_date` against the
    /// cycle's reference date. Never set by a collector.
    pub fn update_invoice_aging_bucket(
        &self,
        id: &str,
        bucket: AgingBucket,
        now: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE invoices SET aging_bucket = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, bucket.as_db_str(), now],
        )?;
        Ok(())
    }

    /// Resolved from `contact_name` by the normalizer. Never set by a
    /// collector.
    pub fn update_invoice_client(&self, id: &str, client_id: &str, now: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE invoices SET client_id = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, client_id, now],
        )?;
        Ok(())
    }

    pub fn list_unpaid_invoices(&self) -> Result<Vec<DbInvoice>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM invoices WHERE paid_date IS NULL")?;
        let rows = stmt.query_map([], row_to_invoice)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn list_unpaid_invoices_for_client(&self, client_id: &str) -> Result<Vec<DbInvoice>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM invoices WHERE client_id = ?1 AND paid_date IS NULL")?;
        let rows = stmt.query_map(params![client_id], row_to_invoice)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StoreError::from)
    }

    pub fn get_invoice(&self, id: &str) -> Result<Option<DbInvoice>, StoreError> {
        self.conn
            .query_row("SELECT * FROM invoices WHERE id = ?1", params![id], row_to_invoice)
            .optional()
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn unpaid_query_excludes_paid_invoices() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_collected_invoice(
                &CollectedInvoice {
                    id: "inv1",
                    contact_name: Some("Acme Co"),
                    amount: 1000.0,
                    currency: "USD",
                    issue_date: Some("2026-01-01"),
                    due_date: Some("2026-01-15"),
                    status: "sent",
                    paid_date: None,
                },
                "2026-01-01T00:00:00Z",
            )
            .unwrap();
        store
            .upsert_collected_invoice(
                &CollectedInvoice {
                    id: "inv2",
                    contact_name: Some("Acme Co"),
                    amount: 500.0,
                    currency: "USD",
                    issue_date: Some("2026-01-01"),
                    due_date: Some("2026-01-10"),
                    status: "paid",
                    paid_date: Some("2026-01-09"),
                },
                "2026-01-01T00:00:00Z",
            )
            .unwrap();

        let unpaid = store.list_unpaid_invoices().unwrap();
        assert_eq!(unpaid.len(), 1);
        assert_eq!(unpaid[0].id, "inv1");
    }
}
