//! # Document Store
//!
//! Schemaless JSON documents grouped in collections, on one SQLite table.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  documents                                                              │
//! │  ┌──────────────┬──────────┬────────────────────────┬──────────────┐   │
//! │  │ collection   │ id       │ data (JSON text)       │ created_at   │   │
//! │  ├──────────────┼──────────┼────────────────────────┼──────────────┤   │
//! │  │ crm_leads    │ 3f2a...  │ {"name": "...", ...}   │ 2025-07-...  │   │
//! │  │ crm_orders   │ 9c1b...  │ {"lead_id": "3f2a...}  │ 2025-07-...  │   │
//! │  └──────────────┴──────────┴────────────────────────┴──────────────┘   │
//! │                                                                         │
//! │  get / list / find_by ──► SELECT ... json_extract(data, '$.field')     │
//! │  set                  ──► INSERT ... ON CONFLICT DO UPDATE             │
//! │  update               ──► UPDATE ... SET data = json_patch(data, ?)    │
//! │  write_batch          ──► chunks of ≤ 500, one transaction per chunk   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The document id lives in its own column and is written into the body as
//! `"id"` on every write, so a document read back always carries its id.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use salesdesk_core::dates::to_iso_millis;
use salesdesk_core::BATCH_WRITE_LIMIT;

use crate::error::{DbError, DbResult};

// =============================================================================
// Write Operations
// =============================================================================

/// One write in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace the whole document.
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    /// Merge-patch an existing document (RFC 7396: `null` removes a key).
    Update {
        collection: String,
        id: String,
        patch: Value,
    },
    Delete { collection: String, id: String },
}

impl WriteOp {
    /// A `Set` for any serializable record.
    pub fn set<T: Serialize>(collection: &str, id: &str, doc: &T) -> DbResult<Self> {
        Ok(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data: serde_json::to_value(doc)?,
        })
    }

    pub fn update(collection: &str, id: &str, patch: Value) -> Self {
        WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
        }
    }

    pub fn delete(collection: &str, id: &str) -> Self {
        WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Outcome of a fully committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub writes: usize,
    pub chunks: usize,
}

// =============================================================================
// Store
// =============================================================================

/// Low-level access to the `documents` table.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

fn with_id(mut data: Value, id: &str) -> DbResult<Value> {
    match data.as_object_mut() {
        Some(map) => {
            map.insert("id".to_string(), Value::String(id.to_string()));
            Ok(data)
        }
        None => Err(DbError::Serialization(format!(
            "document {id} is not a JSON object"
        ))),
    }
}

fn decode<T: DeserializeOwned>(row: &SqliteRow) -> DbResult<T> {
    let id: String = row.try_get("id")?;
    let data: String = row.try_get("data")?;
    let value = with_id(serde_json::from_str(&data)?, &id)?;
    Ok(serde_json::from_value(value)?)
}

/// Field paths are interpolated into SQL, so only plain names are allowed.
fn json_path(field: &str) -> DbResult<String> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(format!("$.{field}"))
    } else {
        Err(DbError::QueryFailed(format!("invalid field name: {field}")))
    }
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        DocumentStore { pool }
    }

    /// Reads one document.
    pub async fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> DbResult<Option<T>> {
        let row = sqlx::query("SELECT id, data FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(decode).transpose()
    }

    /// Reads every document of a collection, newest first.
    pub async fn list<T: DeserializeOwned>(&self, collection: &str) -> DbResult<Vec<T>> {
        let rows = sqlx::query(
            "SELECT id, data FROM documents WHERE collection = ?1 ORDER BY created_at DESC, id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        debug!(collection, count = rows.len(), "Listed documents");
        rows.iter().map(decode).collect()
    }

    /// Reads documents whose top-level `field` equals `value`.
    ///
    /// Numbers and booleans are compared as stored; pass them as JSON.
    pub async fn find_by<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> DbResult<Vec<T>> {
        let sql = format!(
            "SELECT id, data FROM documents \
             WHERE collection = ?1 AND json_extract(data, '{}') = json_extract(?2, '$') \
             ORDER BY created_at DESC, id",
            json_path(field)?
        );
        let rows = sqlx::query(&sql)
            .bind(collection)
            .bind(serde_json::to_string(value)?)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode).collect()
    }

    /// Reads documents whose `field` is one of `values`.
    pub async fn find_in<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        values: &[String],
    ) -> DbResult<Vec<T>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, data FROM documents \
             WHERE collection = ?1 \
             AND json_extract(data, '{}') IN (SELECT value FROM json_each(?2)) \
             ORDER BY created_at DESC, id",
            json_path(field)?
        );
        let rows = sqlx::query(&sql)
            .bind(collection)
            .bind(serde_json::to_string(values)?)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode).collect()
    }

    /// Creates a document. Fails with `UniqueViolation` if the id is taken.
    pub async fn insert<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> DbResult<()> {
        let data = with_id(serde_json::to_value(doc)?, id)?;
        let now = to_iso_millis(&Utc::now());

        sqlx::query(
            "INSERT INTO documents (collection, id, data, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(collection)
        .bind(id)
        .bind(serde_json::to_string(&data)?)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate(format!("{collection}.id"), id),
            other => other,
        })?;

        debug!(collection, id, "Inserted document");
        Ok(())
    }

    /// Creates or replaces a document.
    pub async fn set<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> DbResult<()> {
        let op = WriteOp::set(collection, id, doc)?;
        let now = to_iso_millis(&Utc::now());
        apply(&self.pool, &op, &now).await?;
        Ok(())
    }

    /// Merge-patches a document. `NotFound` if it does not exist.
    pub async fn update(&self, collection: &str, id: &str, patch: &Value) -> DbResult<()> {
        let op = WriteOp::update(collection, id, patch.clone());
        let now = to_iso_millis(&Utc::now());
        if apply(&self.pool, &op, &now).await? == 0 {
            return Err(DbError::not_found(collection, id));
        }
        Ok(())
    }

    /// Deletes a document. Returns whether it existed.
    pub async fn delete(&self, collection: &str, id: &str) -> DbResult<bool> {
        let op = WriteOp::delete(collection, id);
        let now = to_iso_millis(&Utc::now());
        Ok(apply(&self.pool, &op, &now).await? > 0)
    }

    pub async fn count(&self, collection: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Applies writes in chunks of [`BATCH_WRITE_LIMIT`], one transaction per
    /// chunk, committed in order.
    ///
    /// ## Failure
    /// ```text
    /// ops: [0 ........ 499][500 ....... 999][1000 .. 1203]
    ///       chunk 0 ✓        chunk 1 ✗          never run
    ///
    /// → PartialBatch { committed: 500, failed_chunk: 1, .. }
    ///   chunk 0 stays committed, chunk 1 is rolled back
    /// ```
    pub async fn write_batch(&self, ops: &[WriteOp]) -> DbResult<BatchReport> {
        let mut report = BatchReport::default();

        for (index, chunk) in ops.chunks(BATCH_WRITE_LIMIT).enumerate() {
            if let Err(e) = self.commit_chunk(chunk).await {
                warn!(
                    chunk = index,
                    committed = report.writes,
                    error = %e,
                    "Batch write stopped"
                );
                return Err(DbError::PartialBatch {
                    committed: report.writes,
                    failed_chunk: index,
                    reason: e.to_string(),
                });
            }
            report.writes += chunk.len();
            report.chunks += 1;
            debug!(chunk = index, size = chunk.len(), "Committed batch chunk");
        }

        if report.writes > 0 {
            info!(writes = report.writes, chunks = report.chunks, "Batch write complete");
        }
        Ok(report)
    }

    async fn commit_chunk(&self, chunk: &[WriteOp]) -> DbResult<()> {
        let now = to_iso_millis(&Utc::now());
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for op in chunk {
            if let WriteOp::Update { collection, id, .. } = op {
                if apply(&mut *tx, op, &now).await? == 0 {
                    return Err(DbError::not_found(collection.as_str(), id.as_str()));
                }
            } else {
                apply(&mut *tx, op, &now).await?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

/// Executes one write and returns the number of affected rows.
async fn apply<'e, E>(executor: E, op: &WriteOp, now: &str) -> DbResult<u64>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = match op {
        WriteOp::Set {
            collection,
            id,
            data,
        } => {
            let data = with_id(data.clone(), id)?;
            sqlx::query(
                "INSERT INTO documents (collection, id, data, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?4) \
                 ON CONFLICT (collection, id) DO UPDATE SET \
                     data = excluded.data, updated_at = excluded.updated_at",
            )
            .bind(collection.clone())
            .bind(id.clone())
            .bind(serde_json::to_string(&data)?)
            .bind(now.to_string())
            .execute(executor)
            .await?
        }
        WriteOp::Update {
            collection,
            id,
            patch,
        } => {
            sqlx::query(
                "UPDATE documents SET data = json_patch(data, ?3), updated_at = ?4 \
                 WHERE collection = ?1 AND id = ?2",
            )
            .bind(collection.clone())
            .bind(id.clone())
            .bind(serde_json::to_string(patch)?)
            .bind(now.to_string())
            .execute(executor)
            .await?
        }
        WriteOp::Delete { collection, id } => {
            sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
                .bind(collection.clone())
                .bind(id.clone())
                .execute(executor)
                .await?
        }
    };
    Ok(result.rows_affected())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde_json::json;

    async fn store() -> DocumentStore {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.store()
    }

    #[tokio::test]
    async fn test_set_get_roundtrip_carries_id() {
        let store = store().await;
        store.set("crm_leads", "L1", &json!({"name": "Asha"})).await.unwrap();

        let doc: Value = store.get("crm_leads", "L1").await.unwrap().unwrap();
        assert_eq!(doc["id"], "L1");
        assert_eq!(doc["name"], "Asha");
        assert!(store.get::<Value>("crm_leads", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = store().await;
        store.insert("crm_events", "E1", &json!({"event_name": "IPL"})).await.unwrap();
        let err = store
            .insert("crm_events", "E1", &json!({"event_name": "IPL"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_merges_and_removes_nulls() {
        let store = store().await;
        store
            .set("crm_orders", "O1", &json!({"status": "pending_approval", "notes": "x", "amount": 5}))
            .await
            .unwrap();
        store
            .update("crm_orders", "O1", &json!({"status": "approved", "notes": null}))
            .await
            .unwrap();

        let doc: Value = store.get("crm_orders", "O1").await.unwrap().unwrap();
        assert_eq!(doc["status"], "approved");
        assert_eq!(doc["amount"], 5);
        assert!(doc.get("notes").is_none());

        let err = store.update("crm_orders", "nope", &json!({})).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_by_and_find_in() {
        let store = store().await;
        store.set("crm_orders", "O1", &json!({"lead_id": "L1"})).await.unwrap();
        store.set("crm_orders", "O2", &json!({"lead_id": "L2"})).await.unwrap();
        store.set("crm_orders", "O3", &json!({"lead_id": "L1"})).await.unwrap();
        store.set("crm_leads", "X", &json!({"lead_id": "L1"})).await.unwrap();

        let docs: Vec<Value> = store.find_by("crm_orders", "lead_id", &json!("L1")).await.unwrap();
        assert_eq!(docs.len(), 2);

        let docs: Vec<Value> = store
            .find_in("crm_orders", "lead_id", &["L2".to_string(), "L9".to_string()])
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], "O2");

        assert!(store.find_by::<Value>("crm_orders", "x'); --", &json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let store = store().await;
        store.set("crm_leads", "L1", &json!({})).await.unwrap();
        assert_eq!(store.count("crm_leads").await.unwrap(), 1);
        assert!(store.delete("crm_leads", "L1").await.unwrap());
        assert!(!store.delete("crm_leads", "L1").await.unwrap());
        assert_eq!(store.count("crm_leads").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_batch_chunks() {
        let store = store().await;
        let ops: Vec<WriteOp> = (0..1203)
            .map(|i| WriteOp::Set {
                collection: "crm_allocations".into(),
                id: format!("A{i}"),
                data: json!({"tickets_allocated": 1}),
            })
            .collect();

        let report = store.write_batch(&ops).await.unwrap();
        assert_eq!(report.writes, 1203);
        assert_eq!(report.chunks, 3);
        assert_eq!(store.count("crm_allocations").await.unwrap(), 1203);
    }

    #[tokio::test]
    async fn test_write_batch_keeps_earlier_chunks_on_failure() {
        let store = store().await;
        let mut ops: Vec<WriteOp> = (0..BATCH_WRITE_LIMIT)
            .map(|i| WriteOp::Set {
                collection: "crm_payments".into(),
                id: format!("P{i}"),
                data: json!({}),
            })
            .collect();
        ops.push(WriteOp::Set {
            collection: "crm_payments".into(),
            id: "late".into(),
            data: json!({}),
        });
        // Updating a missing document fails the second chunk
        ops.push(WriteOp::update("crm_payments", "missing", json!({"x": 1})));

        let err = store.write_batch(&ops).await.unwrap_err();
        match err {
            DbError::PartialBatch {
                committed,
                failed_chunk,
                ..
            } => {
                assert_eq!(committed, BATCH_WRITE_LIMIT);
                assert_eq!(failed_chunk, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.count("crm_payments").await.unwrap(), BATCH_WRITE_LIMIT as i64);
    }
}
