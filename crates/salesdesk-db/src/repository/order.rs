//! # Order Repository
//!
//! Orders and the finance documents hanging off them (invoices, payments,
//! receivables, payables, bulk upload logs).

use salesdesk_core::{BulkUploadLog, Invoice, LedgerEntry, Order, Payment};

use super::Repository;
use crate::error::DbResult;

pub type OrderRepository = Repository<Order>;
pub type InvoiceRepository = Repository<Invoice>;
pub type PaymentRepository = Repository<Payment>;
pub type LedgerRepository = Repository<LedgerEntry>;
pub type BulkUploadRepository = Repository<BulkUploadLog>;

impl Repository<Order> {
    pub async fn for_lead(&self, lead_id: &str) -> DbResult<Vec<Order>> {
        self.find_by("lead_id", lead_id).await
    }

    /// Most recent order of a lead.
    pub async fn latest_for_lead(&self, lead_id: &str) -> DbResult<Option<Order>> {
        Ok(self.for_lead(lead_id).await?.into_iter().next())
    }

    pub async fn find_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        self.find_one_by("order_number", order_number).await
    }

    /// Looks an order up by document id, then by order number.
    pub async fn resolve(&self, key: &str) -> DbResult<Option<Order>> {
        match self.get(key).await? {
            Some(order) => Ok(Some(order)),
            None => self.find_by_number(key).await,
        }
    }
}

impl Repository<Invoice> {
    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<Invoice>> {
        self.find_by("order_id", order_id).await
    }
}

impl Repository<Payment> {
    pub async fn for_lead(&self, lead_id: &str) -> DbResult<Vec<Payment>> {
        self.find_by("lead_id", lead_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use salesdesk_core::{LedgerEntry, Order};

    #[tokio::test]
    async fn test_resolve_by_id_or_number() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order = db
            .orders()
            .insert(Order {
                order_number: Some("ORD-1".into()),
                lead_id: Some("L1".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(db.orders().resolve(&order.id).await.unwrap().unwrap().id, order.id);
        assert_eq!(db.orders().resolve("ORD-1").await.unwrap().unwrap().id, order.id);
        assert!(db.orders().resolve("ORD-2").await.unwrap().is_none());
        assert_eq!(db.orders().for_lead("L1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_receivables_and_payables_are_separate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.receivables()
            .insert(LedgerEntry {
                amount: Some(1000.0),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(db.receivables().list().await.unwrap().len(), 1);
        assert!(db.payables().list().await.unwrap().is_empty());
    }
}
