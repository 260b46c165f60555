//! # Reminder Repository

use salesdesk_core::{Reminder, ReminderStatus};

use super::Repository;
use crate::error::DbResult;

pub type ReminderRepository = Repository<Reminder>;

impl Repository<Reminder> {
    pub async fn for_lead(&self, lead_id: &str) -> DbResult<Vec<Reminder>> {
        self.find_by("lead_id", lead_id).await
    }

    pub async fn for_assignee(&self, email: &str) -> DbResult<Vec<Reminder>> {
        self.find_by("assigned_to", email).await
    }

    /// Reminders that still need action (pending, snoozed or overdue).
    pub async fn list_open(&self) -> DbResult<Vec<Reminder>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| {
                matches!(
                    r.status,
                    ReminderStatus::Pending | ReminderStatus::Snoozed | ReminderStatus::Overdue
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use salesdesk_core::{Reminder, ReminderStatus};

    #[tokio::test]
    async fn test_list_open_and_for_lead() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (lead, status) in [
            ("L1", ReminderStatus::Pending),
            ("L1", ReminderStatus::Completed),
            ("L2", ReminderStatus::Snoozed),
        ] {
            db.reminders()
                .insert(Reminder {
                    lead_id: lead.into(),
                    status,
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        assert_eq!(db.reminders().for_lead("L1").await.unwrap().len(), 2);
        assert_eq!(db.reminders().list_open().await.unwrap().len(), 2);
    }
}
