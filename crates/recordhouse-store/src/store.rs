//! Message Store Facade
//!
//! The one entry point callers use. Owns the schema registry, both storage
//! strategies, and the retention manager; no other component mutates the
//! registry or the storage units directly.
//!
//! Per topic the lifecycle is `Unregistered -> Registered(mode)` (the mode
//! and schema may be overwritten in place by a later registration) `->
//! Deleted`. Writes dispatch to the strategy selected by the topic's stored
//! mode, then hand the written unit to the retention manager.
//!
//! ## Self-Healing Writes
//!
//! A write that fails on the "unit missing" sub-case triggers exactly one
//! `ensure_unit` and one retry, then surfaces whatever happens. This is a
//! documented retry-once policy, not an ad hoc exception handler: a
//! dedicated table can legitimately be absent when the topic was registered
//! by an older process generation or the unit was removed out-of-band.

use crate::config::StoreConfig;
use crate::dedicated::DedicatedStore;
use crate::error::{Result, StoreError};
use crate::registry::SchemaRegistry;
use crate::retention::RetentionManager;
use crate::shared::SharedStore;
use crate::{now_ms, StorageStrategy};
use recordhouse_core::{
    export, FetchOptions, RecordResult, SchemaError, StorageMode, Topic, TopicConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Operational snapshot of one topic's unit — the same numbers the
/// retention manager works from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicStats {
    pub row_count: u64,
    pub footprint_kb: f64,
}

pub struct MessageStore {
    pool: SqlitePool,
    registry: SchemaRegistry,
    shared: SharedStore,
    dedicated: DedicatedStore,
    retention: RetentionManager,
    config: StoreConfig,
}

impl MessageStore {
    /// Open a file-backed store, creating the database if missing.
    pub async fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?;

        Self::with_pool(pool, config).await
    }

    /// In-memory store for tests. Pinned to one connection: each SQLite
    /// `:memory:` connection is its own database.
    pub async fn open_in_memory(config: StoreConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool, config).await
    }

    async fn with_pool(pool: SqlitePool, config: StoreConfig) -> Result<Self> {
        let store = Self {
            registry: SchemaRegistry::new(pool.clone()),
            shared: SharedStore::new(pool.clone()),
            dedicated: DedicatedStore::new(pool.clone()),
            retention: RetentionManager::new(config.max_unit_size_kb),
            config,
            pool,
        };

        store.registry.ensure_schema().await?;
        // The shared unit exists for the store's whole lifetime
        store.shared.ensure_unit(&placeholder_topic()).await?;

        Ok(store)
    }

    /// Close the connection pool. Pending operations finish first.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn strategy(&self, mode: StorageMode) -> &dyn StorageStrategy {
        match mode {
            StorageMode::Shared => &self.shared,
            StorageMode::Dedicated => &self.dedicated,
        }
    }

    async fn topic(&self, name: &str) -> Result<Topic> {
        self.registry
            .get(name)
            .await?
            .ok_or_else(|| StoreError::TopicNotFound(name.to_string()))
    }

    /// Register (or re-register) a topic and eagerly create its unit.
    ///
    /// Re-registration overwrites the schema and mode in place. A mode
    /// change is allowed but does **not** migrate previously stored rows:
    /// they stay in the old backend, unreachable through the new mode's
    /// query path, which is logged loudly here.
    pub async fn create_topic(&self, config: TopicConfig) -> Result<()> {
        if config.name.is_empty() {
            return Err(StoreError::Validation(SchemaError::EmptyName));
        }
        config.schema.validate()?;

        // Topic-name aliasing is enforced by the registry's unique index on
        // the sanitized name, so concurrent registrations cannot both pass.
        let previous = self.registry.register(&config, now_ms()).await?;
        if let Some(previous_mode) = previous {
            if previous_mode != config.mode {
                tracing::warn!(
                    topic = %config.name,
                    from = previous_mode.as_str(),
                    to = config.mode.as_str(),
                    "storage mode changed; existing rows stay in the previous backend"
                );
            }
        }

        let topic = self.topic(&config.name).await?;
        self.strategy(topic.mode).ensure_unit(&topic).await?;

        tracing::info!(
            topic = %topic.name,
            mode = topic.mode.as_str(),
            fields = topic.schema.len(),
            "topic registered"
        );
        Ok(())
    }

    /// Persist one validated payload; returns the assigned record id.
    ///
    /// Either the record fully commits and retention runs, or an error is
    /// returned and nothing was stored.
    pub async fn put(&self, topic_name: &str, payload: Map<String, Value>) -> Result<i64> {
        let topic = self.topic(topic_name).await?;
        let strategy = self.strategy(topic.mode);
        let received_at = now_ms();

        let id = match strategy.insert(&topic, &payload, received_at).await {
            Ok(id) => id,
            Err(e) if e.is_missing_unit() => {
                tracing::warn!(topic = %topic.name, "storage unit missing on write; creating and retrying once");
                strategy.ensure_unit(&topic).await?;
                strategy.insert(&topic, &payload, received_at).await?
            }
            Err(e) => return Err(e),
        };

        let evicted = self.retention.enforce(strategy, &topic).await?;
        if evicted > 0 {
            tracing::debug!(topic = %topic.name, evicted, "retention pass after write");
        }

        Ok(id)
    }

    /// Read a page of records. Unset order/limit fall back to the
    /// configured defaults; a decode failure in one record is returned as
    /// that record's entry, never an abort of the page.
    pub async fn fetch(&self, topic_name: &str, options: FetchOptions) -> Result<Vec<RecordResult>> {
        let topic = self.topic(topic_name).await?;
        let limit = options.limit.or(self.config.default_limit);
        let order = options.order.unwrap_or(self.config.default_order);

        self.strategy(topic.mode)
            .query(&topic, limit, options.offset, order)
            .await
    }

    /// Fetch and render as CSV (the spreadsheet-tooling boundary format).
    /// Records that fail to decode are skipped with a warning.
    pub async fn export_csv(&self, topic_name: &str, options: FetchOptions) -> Result<String> {
        let topic = self.topic(topic_name).await?;
        let page = self.fetch(topic_name, options).await?;

        let mut records = Vec::with_capacity(page.len());
        for entry in page {
            match entry {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(topic = %topic.name, error = %e, "skipping undecodable record in export"),
            }
        }

        Ok(export::render_csv(&topic.schema, &records))
    }

    pub async fn get_topic(&self, name: &str) -> Result<Option<Topic>> {
        self.registry.get(name).await
    }

    /// All topics, newest registration first.
    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        self.registry.list().await
    }

    /// Drop the topic's storage unit, then its registry entry. Deleting an
    /// absent topic reports `TopicNotFound` — callers rely on that to tell
    /// "nothing to do" from "already deleted".
    pub async fn delete_topic(&self, name: &str) -> Result<()> {
        let topic = self.topic(name).await?;
        self.strategy(topic.mode).drop_unit(&topic).await?;
        self.registry.remove(name).await?;

        tracing::info!(topic = %name, mode = topic.mode.as_str(), "topic deleted");
        Ok(())
    }

    pub async fn topic_stats(&self, name: &str) -> Result<TopicStats> {
        let topic = self.topic(name).await?;
        let strategy = self.strategy(topic.mode);
        Ok(TopicStats {
            row_count: strategy.row_count(&topic).await?,
            footprint_kb: strategy.footprint_kb(&topic).await?,
        })
    }
}

/// `SharedStore::ensure_unit` ignores the topic; this satisfies the
/// signature for the startup call.
fn placeholder_topic() -> Topic {
    Topic {
        name: String::new(),
        schema: recordhouse_core::Schema::new(Vec::new()),
        mode: StorageMode::Shared,
        created_at: 0,
    }
}
