//! # Calendar Repository
//!
//! The events calendar and post-sale customer journeys.

use tracing::warn;

use salesdesk_core::{Event, Journey};

use super::Repository;
use crate::error::{DbError, DbResult};

pub type EventRepository = Repository<Event>;
pub type JourneyRepository = Repository<Journey>;

impl Repository<Event> {
    /// Events with exactly this name, ignoring case and surrounding spaces.
    pub async fn find_by_name(&self, name: &str) -> DbResult<Vec<Event>> {
        let name = name.trim();
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|e| e.event_name.trim().eq_ignore_ascii_case(name))
            .collect())
    }

    /// Inserts an event unless another event already uses its name.
    pub async fn insert_unique(&self, event: Event) -> DbResult<Event> {
        if !self.find_by_name(&event.event_name).await?.is_empty() {
            warn!(name = %event.event_name, "Duplicate event name rejected");
            return Err(DbError::duplicate("event_name", event.event_name));
        }
        self.insert(event).await
    }
}

impl Repository<Journey> {
    pub async fn find_by_token(&self, token: &str) -> DbResult<Option<Journey>> {
        self.find_one_by("access_token", token).await
    }

    pub async fn for_order(&self, order_id: &str) -> DbResult<Option<Journey>> {
        self.find_one_by("order_id", order_id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use salesdesk_core::{Event, Journey};

    #[tokio::test]
    async fn test_duplicate_event_name_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.events()
            .insert_unique(Event {
                event_name: "Wimbledon 2025".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let err = db
            .events()
            .insert_unique(Event {
                event_name: " wimbledon 2025 ".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_journey_by_token() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.journeys()
            .insert(Journey {
                order_id: "O1".into(),
                access_token: "tok123".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(db.journeys().find_by_token("tok123").await.unwrap().is_some());
        assert!(db.journeys().find_by_token("nope").await.unwrap().is_none());
        assert!(db.journeys().for_order("O1").await.unwrap().is_some());
    }
}
