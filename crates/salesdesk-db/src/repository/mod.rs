//! # Repository Module
//!
//! Typed access to each collection of the document store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories over one store                          │
//! │                                                                         │
//! │  Route handler                                                         │
//! │       │                                                                 │
//! │       │  db.leads().find_by_phone("+91 98765 43210")                   │
//! │       ▼                                                                 │
//! │  Repository<Lead>            (collection = "crm_leads")                │
//! │  ├── get / get_required / list / find_by          ← shared, generic    │
//! │  ├── insert / set / update / delete / count                            │
//! │  └── find_by_phone / find_by_client_id            ← lead-specific      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DocumentStore  ──►  documents (collection, id, data JSON)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A record type names its default collection through [`Document`]. Types
//! stored in more than one collection (team members, ledger entries) use
//! [`Repository::with_collection`].
//!
//! ## Available Repositories
//!
//! - [`lead`] - Leads, phone/client lookups, activity log
//! - [`order`] - Orders, invoices, payments
//! - [`allocation`] - Allocations and inventory
//! - [`reminder`] - Follow-up reminders
//! - [`calendar`] - Events and journeys
//! - [`team`] - Users, team memberships, targets
//! - [`stats`] - Stats snapshot, history and run marker

pub mod allocation;
pub mod calendar;
pub mod lead;
pub mod order;
pub mod reminder;
pub mod stats;
pub mod team;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::debug;
use uuid::Uuid;

use salesdesk_core::{
    ActivityLog, Allocation, BulkUploadLog, Event, Inventory, Invoice, Journey, Lead, LedgerEntry,
    Order, Payment, Reminder, SalesTarget, TeamMember, User,
};

use crate::collections;
use crate::error::{DbError, DbResult};
use crate::store::DocumentStore;

// =============================================================================
// Document Trait
// =============================================================================

/// A record stored as a document.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Default collection.
    const COLLECTION: &'static str;
    /// Name used in `NotFound` errors.
    const ENTITY: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

macro_rules! document {
    ($ty:ty, $collection:expr, $entity:literal) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;
            const ENTITY: &'static str = $entity;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

document!(Lead, collections::LEADS, "Lead");
document!(Order, collections::ORDERS, "Order");
document!(Allocation, collections::ALLOCATIONS, "Allocation");
document!(Inventory, collections::INVENTORY, "Inventory");
document!(Reminder, collections::REMINDERS, "Reminder");
document!(Event, collections::EVENTS, "Event");
document!(Journey, collections::JOURNEYS, "Journey");
document!(User, collections::USERS, "User");
document!(TeamMember, collections::SALES_MEMBERS, "Team member");
document!(SalesTarget, collections::SALES_TARGETS, "Target");
document!(Payment, collections::PAYMENTS, "Payment");
document!(Invoice, collections::INVOICES, "Invoice");
document!(LedgerEntry, collections::RECEIVABLES, "Ledger entry");
document!(ActivityLog, collections::ACTIVITY_LOGS, "Activity log");
document!(BulkUploadLog, collections::BULK_UPLOADS, "Bulk upload");

/// Generates a new document id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Generic Repository
// =============================================================================

/// CRUD over one collection, typed by its record.
#[derive(Debug)]
pub struct Repository<T> {
    store: DocumentStore,
    collection: &'static str,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Repository {
            store: self.store.clone(),
            collection: self.collection,
            _record: PhantomData,
        }
    }
}

impl<T: Document> Repository<T> {
    /// Repository over the record's default collection.
    pub fn new(store: DocumentStore) -> Self {
        Self::with_collection(store, T::COLLECTION)
    }

    pub fn with_collection(store: DocumentStore, collection: &'static str) -> Self {
        Repository {
            store,
            collection,
            _record: PhantomData,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<T>> {
        self.store.get(self.collection, id).await
    }

    /// Like [`get`](Self::get), but a missing document is `NotFound`.
    pub async fn get_required(&self, id: &str) -> DbResult<T> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found(T::ENTITY, id))
    }

    /// All documents, newest first.
    pub async fn list(&self) -> DbResult<Vec<T>> {
        self.store.list(self.collection).await
    }

    pub async fn find_by(&self, field: &str, value: impl Into<Value>) -> DbResult<Vec<T>> {
        self.store
            .find_by(self.collection, field, &value.into())
            .await
    }

    pub async fn find_one_by(&self, field: &str, value: impl Into<Value>) -> DbResult<Option<T>> {
        Ok(self.find_by(field, value).await?.into_iter().next())
    }

    pub async fn find_in(&self, field: &str, values: &[String]) -> DbResult<Vec<T>> {
        self.store.find_in(self.collection, field, values).await
    }

    /// Inserts a new document. An empty id is replaced by a fresh UUID.
    /// Returns the stored record.
    pub async fn insert(&self, mut doc: T) -> DbResult<T> {
        if doc.id().is_empty() {
            doc.set_id(new_id());
        }
        self.store.insert(self.collection, doc.id(), &doc).await?;
        debug!(collection = self.collection, id = doc.id(), "Created document");
        Ok(doc)
    }

    /// Writes the whole record under its id.
    pub async fn save(&self, doc: &T) -> DbResult<()> {
        if doc.id().is_empty() {
            return Err(DbError::QueryFailed(format!(
                "cannot save {} without an id",
                T::ENTITY
            )));
        }
        self.store.set(self.collection, doc.id(), doc).await
    }

    /// Merge-patches the document and returns the result.
    pub async fn update(&self, id: &str, patch: &Value) -> DbResult<T> {
        self.store
            .update(self.collection, id, patch)
            .await
            .map_err(|e| match e {
                DbError::NotFound { .. } => DbError::not_found(T::ENTITY, id),
                other => other,
            })?;
        self.get_required(id).await
    }

    /// Deletes the document. `NotFound` if it did not exist.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        if self.store.delete(self.collection, id).await? {
            Ok(())
        } else {
            Err(DbError::not_found(T::ENTITY, id))
        }
    }

    pub async fn count(&self) -> DbResult<i64> {
        self.store.count(self.collection).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use salesdesk_core::LeadStatus;
    use serde_json::json;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let db = db().await;
        let lead = db
            .leads()
            .insert(Lead {
                name: Some("Asha".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(!lead.id.is_empty());
        let loaded = db.leads().get_required(&lead.id).await.unwrap();
        assert_eq!(loaded.name.as_deref(), Some("Asha"));
    }

    #[tokio::test]
    async fn test_update_returns_patched_record() {
        let db = db().await;
        let lead = db.leads().insert(Lead::default()).await.unwrap();

        let updated = db
            .leads()
            .update(&lead.id, &json!({"status": "qualified"}))
            .await
            .unwrap();
        assert_eq!(updated.status, LeadStatus::Qualified);

        let err = db.leads().update("missing", &json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Lead not found: missing");
    }

    #[tokio::test]
    async fn test_extra_fields_survive_save() {
        let db = db().await;
        db.store()
            .set(collections::LEADS, "L1", &json!({"name": "Asha", "utm_medium": "cpc"}))
            .await
            .unwrap();

        let mut lead = db.leads().get_required("L1").await.unwrap();
        lead.notes = Some("called".into());
        db.leads().save(&lead).await.unwrap();

        let raw: Value = db.store().get(collections::LEADS, "L1").await.unwrap().unwrap();
        assert_eq!(raw["utm_medium"], "cpc");
        assert_eq!(raw["notes"], "called");
    }

    #[tokio::test]
    async fn test_same_type_in_two_collections() {
        let db = db().await;
        db.sales_members()
            .insert(TeamMember {
                user_id: "u1".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(db.sales_members().count().await.unwrap(), 1);
        assert_eq!(db.retail_members().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let db = db().await;
        let err = db.events().delete("nope").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
