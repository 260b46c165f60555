//! # Stats Aggregation Service
//!
//! Rebuilds the performance stats snapshot from the whole store.
//!
//! ## Run Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  trigger (cron / super admin)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  AtomicBool false → true ?  ── no ──► skipped (same process running)   │
//! │       │ yes                                                             │
//! │       ▼                                                                 │
//! │  marker.is_running and started < stale window ? ── yes ──► skipped     │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  mark_started ──► load ──► aggregate ──► save snapshot + history       │
//! │       │                                      │                          │
//! │       ▼ error                                ▼ ok                       │
//! │  mark_failed (old snapshot kept)        mark_completed                 │
//! │                                                                         │
//! │  RunGuard drop ──► AtomicBool back to false                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The marker document is advisory: it is what other processes and
//! `/api/cron/health` see. Within one process the atomic flag is
//! authoritative. A marker left `is_running` by a crashed process stops
//! blocking runs once it is older than the stale window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use salesdesk_core::dates::{parse_timestamp, to_iso_millis};
use salesdesk_core::stats::{aggregate, AggregationInput};
use salesdesk_db::{Database, DbError, DbResult, RunMarker};

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Aggregation already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Database(#[from] DbError),
}

/// What a finished run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub timestamp: String,
    pub processing_time_ms: u64,
    pub orders: usize,
    pub leads: usize,
    pub sales_people: usize,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunSummary),
    Skipped,
}

/// Freshness of the stored snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsHealth {
    pub healthy: bool,
    pub last_update: Option<String>,
    pub time_since_update_ms: Option<i64>,
    pub is_running: bool,
}

/// Resets the in-process flag when a run ends, however it ends.
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Loads every collection the aggregation reads.
pub async fn load_input(db: &Database) -> DbResult<AggregationInput> {
    let input = AggregationInput {
        orders: db.orders().list().await?,
        leads: db.leads().list().await?,
        allocations: db.allocations().list().await?,
        inventory_count: db.inventory().count().await?.max(0) as usize,
        users: db.users().list().await?,
        sales_members: db.sales_members().list().await?,
        retail_members: db.retail_members().list().await?,
        targets: db.targets().list().await?,
        receivables: db.receivables().list().await?,
        payables: db.payables().list().await?,
    };
    info!(
        orders = input.orders.len(),
        leads = input.leads.len(),
        allocations = input.allocations.len(),
        users = input.users.len(),
        "Loaded aggregation input"
    );
    Ok(input)
}

#[derive(Clone)]
pub struct AggregationService {
    db: Database,
    running: Arc<AtomicBool>,
    stale_after: Duration,
}

impl AggregationService {
    pub fn new(db: Database, stale_after_mins: i64) -> Self {
        AggregationService {
            db,
            running: Arc::new(AtomicBool::new(false)),
            stale_after: Duration::minutes(stale_after_mins),
        }
    }

    fn marker_is_live(&self, marker: &RunMarker, now: DateTime<Utc>) -> bool {
        if !marker.is_running {
            return false;
        }
        match marker.started_at.as_deref().and_then(parse_timestamp) {
            Some(started) => now - started < self.stale_after,
            None => false,
        }
    }

    /// Whether a run is in progress here or, per the marker, elsewhere.
    pub async fn is_running(&self) -> DbResult<bool> {
        if self.running.load(Ordering::Acquire) {
            return Ok(true);
        }
        let marker = self.db.stats().marker().await?;
        Ok(self.marker_is_live(&marker, Utc::now()))
    }

    async fn acquire(&self) -> DbResult<Option<RunGuard>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }
        let guard = RunGuard {
            flag: Arc::clone(&self.running),
        };

        let marker = self.db.stats().marker().await?;
        if self.marker_is_live(&marker, Utc::now()) {
            info!(started_by = ?marker.started_by, "Marker shows a run elsewhere");
            return Ok(None);
        }
        Ok(Some(guard))
    }

    /// Runs the aggregation now. Returns `Skipped` when a run is already in
    /// progress.
    pub async fn run(&self, started_by: &str) -> Result<RunOutcome, AggregationError> {
        let Some(guard) = self.acquire().await? else {
            info!(started_by, "Aggregation skipped, already running");
            return Ok(RunOutcome::Skipped);
        };
        self.execute(guard, started_by).await.map(RunOutcome::Completed)
    }

    /// Starts the aggregation on a background task.
    pub async fn spawn(&self, started_by: String) -> Result<(), AggregationError> {
        let guard = self
            .acquire()
            .await?
            .ok_or(AggregationError::AlreadyRunning)?;

        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.execute(guard, &started_by).await {
                error!(error = %e, started_by = %started_by, "Background aggregation failed");
            }
        });
        Ok(())
    }

    async fn execute(&self, _guard: RunGuard, started_by: &str) -> Result<RunSummary, AggregationError> {
        let stats = self.db.stats();
        let started = Instant::now();
        info!(started_by, "Starting stats aggregation");
        stats.mark_started(started_by, Utc::now()).await?;

        match self.compute(started).await {
            Ok(summary) => {
                stats
                    .mark_completed(summary.processing_time_ms, Utc::now())
                    .await?;
                info!(
                    processing_time_ms = summary.processing_time_ms,
                    orders = summary.orders,
                    leads = summary.leads,
                    "Stats aggregation complete"
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(mark_err) = stats.mark_failed(&e.to_string(), Utc::now()).await {
                    warn!(error = %mark_err, "Could not record aggregation failure");
                }
                Err(e)
            }
        }
    }

    async fn compute(&self, started: Instant) -> Result<RunSummary, AggregationError> {
        let input = load_input(&self.db).await?;
        let mut snapshot = aggregate(&input, Utc::now());
        snapshot.metadata.processing_time_ms = started.elapsed().as_millis() as u64;
        self.db.stats().save(&snapshot).await?;

        Ok(RunSummary {
            timestamp: snapshot.timestamp.clone(),
            processing_time_ms: snapshot.metadata.processing_time_ms,
            orders: input.orders.len(),
            leads: input.leads.len(),
            sales_people: snapshot.sales_performance.len(),
        })
    }

    /// Healthy when the last snapshot is younger than the stale window.
    pub async fn health(&self, now: DateTime<Utc>) -> DbResult<StatsHealth> {
        let computed_at = self
            .db
            .stats()
            .latest()
            .await?
            .and_then(|s| s.computed_at());
        let since = computed_at.map(|at| now - at);

        Ok(StatsHealth {
            healthy: since.is_some_and(|d| d < self.stale_after),
            last_update: computed_at.as_ref().map(to_iso_millis),
            time_since_update_ms: since.map(|d| d.num_milliseconds()),
            is_running: self.is_running().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesdesk_core::{Order, Role, TeamMember, User};
    use salesdesk_db::DbConfig;

    async fn service() -> (Database, AggregationService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = AggregationService::new(db.clone(), 180);
        (db, service)
    }

    #[tokio::test]
    async fn test_run_stores_snapshot_and_clears_marker() {
        let (db, service) = service().await;
        let user = db
            .users()
            .insert(User {
                name: "Ravi".into(),
                email: "ravi@example.com".into(),
                role: Role::SalesPerson,
                ..Default::default()
            })
            .await
            .unwrap();
        db.sales_members().add(&user, "admin").await.unwrap();
        db.orders()
            .insert(Order {
                sales_person: Some("ravi@example.com".into()),
                payment_currency: Some("INR".into()),
                base_amount: Some(50_000.0),
                ..Default::default()
            })
            .await
            .unwrap();

        let outcome = service.run("test").await.unwrap();
        let RunOutcome::Completed(summary) = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(summary.orders, 1);
        assert_eq!(summary.sales_people, 1);

        let marker = db.stats().marker().await.unwrap();
        assert!(!marker.is_running);
        assert!(marker.completed_at.is_some());
        assert!(db.stats().latest().await.unwrap().is_some());
        assert!(!service.is_running().await.unwrap());
    }

    #[tokio::test]
    async fn test_live_marker_skips_run() {
        let (db, service) = service().await;
        db.stats().mark_started("other-process", Utc::now()).await.unwrap();

        assert!(service.is_running().await.unwrap());
        assert!(matches!(service.run("cron").await.unwrap(), RunOutcome::Skipped));
        assert!(matches!(
            service.spawn("admin".into()).await,
            Err(AggregationError::AlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn test_stale_marker_does_not_block() {
        let (db, service) = service().await;
        db.stats()
            .mark_started("crashed", Utc::now() - Duration::hours(5))
            .await
            .unwrap();

        assert!(!service.is_running().await.unwrap());
        assert!(matches!(
            service.run("cron").await.unwrap(),
            RunOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_in_process_flag_blocks_second_run() {
        let (_db, service) = service().await;
        let guard = service.acquire().await.unwrap();
        assert!(guard.is_some());
        assert!(service.acquire().await.unwrap().is_none());

        drop(guard);
        assert!(service.acquire().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_health_reflects_snapshot_age() {
        let (db, service) = service().await;
        let health = service.health(Utc::now()).await.unwrap();
        assert!(!health.healthy);
        assert!(health.last_update.is_none());

        db.retail_members()
            .insert(TeamMember {
                user_id: "nobody".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        service.run("cron").await.unwrap();

        let health = service.health(Utc::now()).await.unwrap();
        assert!(health.healthy);
        let later = service
            .health(Utc::now() + Duration::hours(4))
            .await
            .unwrap();
        assert!(!later.healthy);
    }
}
