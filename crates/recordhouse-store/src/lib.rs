//! Recordhouse Storage Engine
//!
//! This crate implements the schema-driven storage engine: it maps
//! per-topic field schemas to physical SQLite storage, converts payloads to
//! and from that physical representation, manages the lifecycle of
//! per-topic storage units, and bounds each unit's footprint through
//! automatic eviction of the oldest rows.
//!
//! ## Architecture
//!
//! ```text
//! caller ──► MessageStore ──► SchemaRegistry (topic lookup)
//!                │
//!                ├──► SharedStore     (one wide table, opaque payloads)
//!                ├──► DedicatedStore  (one table per topic, typed columns)
//!                │         │
//!                │     ColumnMapper   (abstract type ◄─► column type)
//!                │
//!                └──► RetentionManager (evict oldest past the budget)
//! ```
//!
//! ## Storage Modes
//!
//! The two [`StorageStrategy`] implementations are interchangeable behind
//! one trait, selected per topic at the facade boundary:
//!
//! - [`SharedStore`]: every shared-mode topic writes into one `messages`
//!   table, rows tagged by topic name, the payload kept as one opaque JSON
//!   blob. Payloads round-trip without per-field coercion.
//! - [`DedicatedStore`]: one table per topic (`topic_<sanitized name>`),
//!   one column per schema field. Values undergo per-field type coercion on
//!   both write and read — a numeric field round-trips as a float even when
//!   handed a numeric string.
//!
//! This coercion asymmetry is deliberate and documented on each strategy.
//!
//! ## Concurrency
//!
//! All operations run against a shared connection pool; nothing holds a
//! connection across a whole put or fetch. `ensure_unit` is idempotent
//! create-if-missing, so racing first-writers on a brand-new dedicated
//! topic cannot fail on the duplicate-create path. Retention is not
//! transactional with the triggering insert; concurrent writers may land
//! rows between the footprint check and the delete, and the next write
//! simply re-checks.
//!
//! ## Usage
//!
//! ```ignore
//! use recordhouse_store::{MessageStore, StoreConfig};
//! use recordhouse_core::{FieldSpec, FieldType, Schema, StorageMode, TopicConfig};
//!
//! let store = MessageStore::open("records.db", StoreConfig::default()).await?;
//!
//! store.create_topic(TopicConfig {
//!     name: "sensors/outdoor".to_string(),
//!     schema: Schema::new(vec![
//!         FieldSpec::new("temperature", FieldType::Number),
//!         FieldSpec::new("humidity", FieldType::Number),
//!     ]),
//!     mode: StorageMode::Dedicated,
//! }).await?;
//!
//! let id = store.put("sensors/outdoor", payload).await?;
//! let page = store.fetch("sensors/outdoor", FetchOptions::default().limit(100)).await?;
//! ```

pub mod column;
pub mod config;
pub mod dedicated;
pub mod error;
pub mod registry;
pub mod retention;
pub mod shared;
pub mod store;

pub use config::StoreConfig;
pub use dedicated::DedicatedStore;
pub use error::{Result, StoreError};
pub use registry::SchemaRegistry;
pub use retention::{RetentionManager, EVICTION_TARGET_RATIO};
pub use shared::SharedStore;
pub use store::{MessageStore, TopicStats};

use async_trait::async_trait;
use recordhouse_core::{FetchOrder, RecordResult, Topic};
use serde_json::{Map, Value};

/// One storage backend for a topic's records.
///
/// Both implementations satisfy the same contract; the facade picks one per
/// topic from its registered [`StorageMode`](recordhouse_core::StorageMode)
/// and never branches on the mode anywhere else.
#[async_trait]
pub trait StorageStrategy: Send + Sync {
    /// Create the physical unit if absent and reconcile it with the
    /// topic's current schema. Idempotent and safe under concurrent
    /// callers.
    async fn ensure_unit(&self, topic: &Topic) -> Result<()>;

    /// Append one record; returns the assigned id.
    ///
    /// Fails with the "unit missing" storage error when the unit does not
    /// exist; the facade self-heals that case with one ensure-and-retry.
    async fn insert(&self, topic: &Topic, payload: &Map<String, Value>, received_at: i64)
        -> Result<i64>;

    /// Read records ordered by `(received_at, id)`; descending traverses
    /// that total order in reverse. `limit: None` returns every matching
    /// row from `offset` onward.
    async fn query(
        &self,
        topic: &Topic,
        limit: Option<u32>,
        offset: u32,
        order: FetchOrder,
    ) -> Result<Vec<RecordResult>>;

    /// Remove the topic's rows: drops the table for a dedicated unit,
    /// deletes the tagged rows for the shared one.
    async fn drop_unit(&self, topic: &Topic) -> Result<()>;

    /// Estimated footprint of the topic's unit in kilobytes.
    async fn footprint_kb(&self, topic: &Topic) -> Result<f64>;

    /// Number of rows currently stored for the topic.
    async fn row_count(&self, topic: &Topic) -> Result<u64>;

    /// Delete the `rows` oldest rows by `(received_at ASC, id ASC)`;
    /// returns how many were actually deleted.
    async fn evict_oldest(&self, topic: &Topic, rows: u64) -> Result<u64>;

    /// Reclaim physical space after an eviction pass. Best-effort: the
    /// retention manager logs and swallows a failure here.
    async fn compact(&self, topic: &Topic) -> Result<()>;
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// SQL direction keywords for a fetch order over the `(received_at, id)`
/// total order.
pub(crate) fn order_sql(order: FetchOrder) -> &'static str {
    match order {
        FetchOrder::Ascending => "received_at ASC, id ASC",
        FetchOrder::Descending => "received_at DESC, id DESC",
    }
}

/// LIMIT parameter for SQLite; -1 means unbounded.
pub(crate) fn limit_sql(limit: Option<u32>) -> i64 {
    limit.map(i64::from).unwrap_or(-1)
}
