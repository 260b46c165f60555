//! # Allocation Repository
//!
//! Allocations and the inventory they draw from.
//!
//! Creating or removing an allocation touches two documents (the allocation
//! and its inventory item). Both writes go through one batch so they commit
//! together.

use tracing::info;

use salesdesk_core::{Allocation, Inventory};

use super::Repository;
use crate::collections;
use crate::error::DbResult;
use crate::store::WriteOp;

pub type AllocationRepository = Repository<Allocation>;
pub type InventoryRepository = Repository<Inventory>;

impl Repository<Allocation> {
    pub async fn for_inventory(&self, inventory_id: &str) -> DbResult<Vec<Allocation>> {
        self.find_by("inventory_id", inventory_id).await
    }

    pub async fn for_lead(&self, lead_id: &str) -> DbResult<Vec<Allocation>> {
        self.find_by("lead_id", lead_id).await
    }

    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<Allocation>> {
        self.find_by("order_id", order_id).await
    }

    /// Stores a new allocation together with the inventory it reduced.
    pub async fn create_with_inventory(
        &self,
        allocation: &Allocation,
        inventory: &Inventory,
    ) -> DbResult<()> {
        let ops = vec![
            WriteOp::set(self.collection(), &allocation.id, allocation)?,
            WriteOp::set(collections::INVENTORY, &inventory.id, inventory)?,
        ];
        self.store().write_batch(&ops).await?;
        info!(
            allocation = %allocation.id,
            inventory = %inventory.id,
            tickets = allocation.tickets_allocated,
            "Allocated tickets"
        );
        Ok(())
    }

    /// Deletes an allocation and stores the inventory it was returned to.
    pub async fn remove_with_inventory(
        &self,
        allocation_id: &str,
        inventory: Option<&Inventory>,
    ) -> DbResult<()> {
        let mut ops = vec![WriteOp::delete(self.collection(), allocation_id)];
        if let Some(inventory) = inventory {
            ops.push(WriteOp::set(collections::INVENTORY, &inventory.id, inventory)?);
        }
        self.store().write_batch(&ops).await?;
        info!(allocation = allocation_id, "Unallocated tickets");
        Ok(())
    }
}

impl Repository<Inventory> {
    /// Inventory items that are not soft-deleted.
    pub async fn list_active(&self) -> DbResult<Vec<Inventory>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|i| !i.is_deleted)
            .collect())
    }

    pub async fn find_by_event(&self, event_name: &str) -> DbResult<Vec<Inventory>> {
        self.find_by("event_name", event_name).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use salesdesk_core::{Allocation, Inventory};

    #[tokio::test]
    async fn test_create_and_remove_with_inventory() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut inventory = db
            .inventory()
            .insert(Inventory {
                event_name: "IPL Final".into(),
                available_tickets: 10,
                total_tickets: 10,
                ..Default::default()
            })
            .await
            .unwrap();

        inventory.allocate(None, 4).unwrap();
        let allocation = Allocation {
            id: "A1".into(),
            inventory_id: Some(inventory.id.clone()),
            tickets_allocated: 4,
            ..Default::default()
        };
        db.allocations()
            .create_with_inventory(&allocation, &inventory)
            .await
            .unwrap();

        let stored = db.inventory().get_required(&inventory.id).await.unwrap();
        assert_eq!(stored.available_tickets, 6);
        assert_eq!(db.allocations().for_inventory(&inventory.id).await.unwrap().len(), 1);

        inventory.release(None, 4);
        db.allocations()
            .remove_with_inventory("A1", Some(&inventory))
            .await
            .unwrap();
        let stored = db.inventory().get_required(&inventory.id).await.unwrap();
        assert_eq!(stored.available_tickets, 10);
        assert_eq!(db.allocations().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_active_skips_deleted() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.inventory()
            .insert(Inventory {
                event_name: "A".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        db.inventory()
            .insert(Inventory {
                event_name: "B".into(),
                is_deleted: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let active = db.inventory().list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].event_name, "A");
    }
}
