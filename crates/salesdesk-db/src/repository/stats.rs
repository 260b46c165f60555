//! # Stats Repository
//!
//! Storage for the aggregated performance snapshot.
//!
//! ## Documents
//! ```text
//! crm_performance_stats
//! ├── latest               ← the snapshot served to readers (replaced per run)
//! └── aggregation_status   ← run marker: is_running, started/completed/failed
//!
//! crm_performance_stats_history
//! └── <uuid> ...           ← one summary per successful run
//! ```
//!
//! The marker is advisory: other processes can see it, but it does not lock
//! anything. In-process exclusion is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use salesdesk_core::dates::to_iso_millis;
use salesdesk_core::stats::StatsSnapshot;

use super::new_id;
use crate::collections;
use crate::error::DbResult;
use crate::store::DocumentStore;

const LATEST_ID: &str = "latest";
const MARKER_ID: &str = "aggregation_status";

/// State of the aggregation job as last recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMarker {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary kept for every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: String,
    pub timestamp: String,
    pub last_updated: String,
    pub processing_time_ms: u64,
    pub orders: usize,
    pub leads: usize,
    pub sales_people: usize,
}

#[derive(Debug, Clone)]
pub struct StatsRepository {
    store: DocumentStore,
}

impl StatsRepository {
    pub fn new(store: DocumentStore) -> Self {
        StatsRepository { store }
    }

    pub async fn latest(&self) -> DbResult<Option<StatsSnapshot>> {
        self.store.get(collections::PERFORMANCE_STATS, LATEST_ID).await
    }

    /// Replaces the served snapshot and appends a history summary.
    pub async fn save(&self, snapshot: &StatsSnapshot) -> DbResult<()> {
        self.store
            .set(collections::PERFORMANCE_STATS, LATEST_ID, snapshot)
            .await?;

        let entry = HistoryEntry {
            id: new_id(),
            timestamp: snapshot.timestamp.clone(),
            last_updated: snapshot.last_updated.clone(),
            processing_time_ms: snapshot.metadata.processing_time_ms,
            orders: snapshot.metadata.data_source_counts.orders,
            leads: snapshot.metadata.data_source_counts.leads,
            sales_people: snapshot.sales_performance.len(),
        };
        self.store
            .insert(collections::PERFORMANCE_STATS_HISTORY, &entry.id, &entry)
            .await?;

        info!(timestamp = %snapshot.timestamp, "Stored stats snapshot");
        Ok(())
    }

    /// Most recent history entries, newest first.
    pub async fn history(&self, limit: usize) -> DbResult<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> =
            self.store.list(collections::PERFORMANCE_STATS_HISTORY).await?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    pub async fn marker(&self) -> DbResult<RunMarker> {
        Ok(self
            .store
            .get(collections::PERFORMANCE_STATS, MARKER_ID)
            .await?
            .unwrap_or_default())
    }

    pub async fn mark_started(&self, started_by: &str, now: DateTime<Utc>) -> DbResult<()> {
        let marker = RunMarker {
            is_running: true,
            started_at: Some(to_iso_millis(&now)),
            started_by: Some(started_by.to_string()),
            ..Default::default()
        };
        self.store
            .set(collections::PERFORMANCE_STATS, MARKER_ID, &marker)
            .await
    }

    pub async fn mark_completed(&self, processing_time_ms: u64, now: DateTime<Utc>) -> DbResult<()> {
        self.patch_marker(json!({
            "is_running": false,
            "completed_at": to_iso_millis(&now),
            "processing_time_ms": processing_time_ms,
            "failed_at": null,
            "error": null,
        }))
        .await
    }

    pub async fn mark_failed(&self, error: &str, now: DateTime<Utc>) -> DbResult<()> {
        warn!(error, "Recording failed aggregation run");
        self.patch_marker(json!({
            "is_running": false,
            "failed_at": to_iso_millis(&now),
            "error": error,
        }))
        .await
    }

    async fn patch_marker(&self, patch: serde_json::Value) -> DbResult<()> {
        let exists = self
            .store
            .get::<RunMarker>(collections::PERFORMANCE_STATS, MARKER_ID)
            .await?
            .is_some();
        if exists {
            self.store
                .update(collections::PERFORMANCE_STATS, MARKER_ID, &patch)
                .await
        } else {
            let marker: RunMarker = serde_json::from_value(strip_nulls(patch))?;
            self.store
                .set(collections::PERFORMANCE_STATS, MARKER_ID, &marker)
                .await
        }
    }
}

fn strip_nulls(mut value: serde_json::Value) -> serde_json::Value {
    if let Some(map) = value.as_object_mut() {
        map.retain(|_, v| !v.is_null());
    }
    value
}
