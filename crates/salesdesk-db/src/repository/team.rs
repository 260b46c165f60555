//! # Team Repository
//!
//! Users, sales/retail team memberships and sales targets.
//!
//! Targets are keyed by user id: the target document id is the user id, so
//! setting a target is an upsert.

use chrono::Utc;

use salesdesk_core::{SalesTarget, TeamMember, User};

use super::Repository;
use crate::error::DbResult;

pub type UserRepository = Repository<User>;
pub type TeamMemberRepository = Repository<TeamMember>;
pub type TargetRepository = Repository<SalesTarget>;

impl Repository<User> {
    /// Case-insensitive email lookup.
    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let email = email.trim();
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }
}

impl Repository<TeamMember> {
    pub async fn find_by_user(&self, user_id: &str) -> DbResult<Option<TeamMember>> {
        self.find_one_by("user_id", user_id).await
    }

    /// Adds a user to the team. Returns the existing membership when the
    /// user is already a member.
    pub async fn add(&self, user: &User, added_by: &str) -> DbResult<TeamMember> {
        if let Some(existing) = self.find_by_user(&user.id).await? {
            return Ok(existing);
        }
        self.insert(TeamMember {
            id: String::new(),
            user_id: user.id.clone(),
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            added_by: Some(added_by.to_string()),
            added_date: Some(Utc::now()),
            extra: Default::default(),
        })
        .await
    }

    /// Removes a user from the team. Returns whether they were a member.
    pub async fn remove_user(&self, user_id: &str) -> DbResult<bool> {
        match self.find_by_user(user_id).await? {
            Some(member) => {
                self.delete(&member.id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Repository<SalesTarget> {
    /// Stores a target in rupees.
    pub async fn set_target(&self, user_id: &str, rupees: f64, updated_by: &str) -> DbResult<SalesTarget> {
        let target = SalesTarget {
            id: user_id.to_string(),
            user_id: user_id.to_string(),
            target: Some(rupees),
            updated_by: Some(updated_by.to_string()),
            updated_date: Some(Utc::now()),
        };
        self.save(&target).await?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use salesdesk_core::User;

    fn user() -> User {
        User {
            id: "u1".into(),
            name: "Ravi".into(),
            email: "Ravi@Example.com".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_find_by_email_ignores_case() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.users().insert(user()).await.unwrap();

        let found = db.users().find_by_email("ravi@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));
    }

    #[tokio::test]
    async fn test_team_add_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = db.retail_members().add(&user(), "admin@x.com").await.unwrap();
        let second = db.retail_members().add(&user(), "admin@x.com").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(db.retail_members().count().await.unwrap(), 1);
        assert!(db.retail_members().remove_user("u1").await.unwrap());
        assert!(!db.retail_members().remove_user("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_target_upserts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.targets().set_target("u1", 10_000_000.0, "admin").await.unwrap();
        db.targets().set_target("u1", 25_000_000.0, "admin").await.unwrap();

        let targets = db.targets().list().await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].target, Some(25_000_000.0));
    }
}
