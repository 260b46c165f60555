//! # Lead Repository
//!
//! Lead lookups beyond plain CRUD, plus the per-lead activity log.
//!
//! ## Client Detection
//! ```text
//! New lead phone: "+91 98765 43210"
//!       │
//!       ▼
//! phone_variants ──► ["+91 98765 43210", "919876543210",
//!                     "9876543210", "+919876543210"]
//!       │
//!       ▼
//! json_extract(data, '$.phone') IN (variants)
//!       │
//!       ▼
//! Existing leads of the same client (newest first)
//! ```

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use salesdesk_core::validation::phone_variants;
use salesdesk_core::{ActivityLog, Lead};

use super::Repository;
use crate::error::DbResult;

pub type LeadRepository = Repository<Lead>;
pub type ActivityLogRepository = Repository<ActivityLog>;

impl Repository<Lead> {
    /// Leads whose stored phone matches any common spelling of `phone`.
    pub async fn find_by_phone(&self, phone: &str) -> DbResult<Vec<Lead>> {
        let variants = phone_variants(phone);
        if variants.is_empty() {
            return Ok(Vec::new());
        }
        let leads = self.find_in("phone", &variants).await?;
        debug!(variants = variants.len(), found = leads.len(), "Phone lookup");
        Ok(leads)
    }

    pub async fn find_by_client_id(&self, client_id: &str) -> DbResult<Vec<Lead>> {
        self.find_by("client_id", client_id).await
    }

    pub async fn find_by_assignee(&self, email: &str) -> DbResult<Vec<Lead>> {
        self.find_by("assigned_to", email).await
    }

    /// Loads the leads with the given ids. Missing ids are skipped.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Lead>> {
        self.find_in("id", ids).await
    }
}

impl Repository<ActivityLog> {
    pub async fn for_lead(&self, lead_id: &str) -> DbResult<Vec<ActivityLog>> {
        self.find_by("lead_id", lead_id).await
    }

    /// Appends an entry to a lead's activity log.
    pub async fn record(
        &self,
        lead_id: &str,
        activity_type: &str,
        description: impl Into<String>,
        performed_by: Option<&str>,
        metadata: Value,
    ) -> DbResult<ActivityLog> {
        self.insert(ActivityLog {
            id: String::new(),
            lead_id: lead_id.to_string(),
            activity_type: activity_type.to_string(),
            description: description.into(),
            performed_by: performed_by.map(str::to_string),
            metadata,
            created_date: Some(Utc::now()),
        })
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use salesdesk_core::Lead;
    use serde_json::json;

    #[tokio::test]
    async fn test_find_by_phone_matches_spellings() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let leads = db.leads();
        leads
            .insert(Lead {
                phone: Some("9876543210".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        leads
            .insert(Lead {
                phone: Some("+919876543210".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        leads
            .insert(Lead {
                phone: Some("9000000000".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let found = leads.find_by_phone("+91 98765 43210").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(leads.find_by_phone("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_many_skips_missing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let lead = db.leads().insert(Lead::default()).await.unwrap();

        let found = db
            .leads()
            .get_many(&[lead.id.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_activity_log_for_lead() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.activity_logs()
            .record("L1", "status_change", "Status changed to qualified", Some("a@x.com"), json!({}))
            .await
            .unwrap();
        db.activity_logs()
            .record("L2", "note", "Other lead", None, json!({}))
            .await
            .unwrap();

        let logs = db.activity_logs().for_lead("L1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].activity_type, "status_change");
    }
}
