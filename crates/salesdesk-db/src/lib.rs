//! # salesdesk-db: Document Store for SalesDesk
//!
//! This crate provides database access for the SalesDesk back office.
//! Records are JSON documents grouped in collections, kept in SQLite and
//! accessed with sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SalesDesk Data Flow                              │
//! │                                                                         │
//! │  HTTP handler (GET /api/leads/:id)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   salesdesk-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ Repository<T> │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ leads, orders │    │ 001_docs.sql │  │   │
//! │  │   │ Connection    │◄───│ allocations   │    │              │  │   │
//! │  │   │ Management    │    │ stats, ...    │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                ▼                                │   │
//! │  │                     DocumentStore (store.rs)                    │   │
//! │  │              get / set / json_patch / batch ≤ 500               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   documents (collection, id, data, created_at, updated_at)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`store`] - Untyped document operations and batch writes
//! - [`repository`] - Typed repositories per collection
//! - [`collections`] - Collection names
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use salesdesk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./salesdesk.db")).await?;
//!
//! let lead = db.leads().get_required("3f2a...").await?;
//! let orders = db.orders().for_lead(&lead.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod collections;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::{BatchReport, DocumentStore, WriteOp};

// Repository re-exports for convenience
pub use repository::stats::{HistoryEntry, RunMarker, StatsRepository};
pub use repository::{new_id, Document, Repository};
