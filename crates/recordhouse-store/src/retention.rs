//! Retention Manager
//!
//! Bounds each storage unit's footprint: runs synchronously after every
//! successful insert (there is no separate background sweep) and evicts the
//! oldest rows until the unit is back under 80% of the configured maximum.
//!
//! ## Algorithm
//!
//! 1. Read the unit's footprint; at or under the maximum, nothing to do.
//! 2. `average_row = footprint / row_count` (no-op on an empty unit).
//! 3. `rows_to_delete = ceil((footprint - 0.8 * maximum) / average_row)`.
//! 4. Delete the oldest rows by `(received_at ASC, id ASC)` — strict
//!    chronological order, insertion order on ties, so the newest data is
//!    never evicted while older rows of the same unit remain.
//! 5. Ask the unit to compact. The deletion has already committed, so a
//!    compaction failure is logged and recovered locally.
//!
//! The eviction is not transactional with the triggering insert. A
//! concurrent writer landing rows between the footprint check and the
//! delete is tolerated: the next write re-checks and evicts further. The
//! bound is eventual, not hard real-time.

use crate::error::Result;
use crate::StorageStrategy;
use recordhouse_core::Topic;

/// Eviction aims for this fraction of the configured maximum, leaving
/// headroom so every write does not trigger another pass.
pub const EVICTION_TARGET_RATIO: f64 = 0.8;

pub struct RetentionManager {
    max_unit_kb: f64,
}

impl RetentionManager {
    pub fn new(max_unit_size_kb: u64) -> Self {
        Self {
            max_unit_kb: max_unit_size_kb as f64,
        }
    }

    /// Bring the topic's unit back under budget; returns the number of rows
    /// evicted (0 if the unit was within budget).
    pub async fn enforce(&self, strategy: &dyn StorageStrategy, topic: &Topic) -> Result<u64> {
        let footprint_kb = strategy.footprint_kb(topic).await?;
        if footprint_kb <= self.max_unit_kb {
            return Ok(0);
        }

        let rows = strategy.row_count(topic).await?;
        if rows == 0 {
            return Ok(0);
        }

        let average_row_kb = footprint_kb / rows as f64;
        let target_kb = self.max_unit_kb * EVICTION_TARGET_RATIO;
        let rows_to_delete = ((footprint_kb - target_kb) / average_row_kb).ceil() as u64;

        let evicted = strategy.evict_oldest(topic, rows_to_delete).await?;
        tracing::info!(
            topic = %topic.name,
            footprint_kb,
            max_kb = self.max_unit_kb,
            evicted,
            "evicted oldest rows to enforce retention budget"
        );

        if let Err(e) = strategy.compact(topic).await {
            // Row deletion already committed; space reclamation can wait
            tracing::warn!(topic = %topic.name, error = %e, "compaction after eviction failed");
        }

        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::SharedStore;
    use recordhouse_core::{FieldSpec, FieldType, Schema, StorageMode};
    use serde_json::{json, Map, Value};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> SharedStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SharedStore::new(pool);
        store.ensure_unit(&topic()).await.unwrap();
        store
    }

    fn topic() -> Topic {
        Topic {
            name: "firehose".to_string(),
            schema: Schema::new(vec![FieldSpec::new("data", FieldType::String)]),
            mode: StorageMode::Shared,
            created_at: 0,
        }
    }

    fn bulky_payload() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("data".to_string(), json!("x".repeat(512)));
        map
    }

    #[tokio::test]
    async fn within_budget_is_a_no_op() {
        let store = setup().await;
        let t = topic();
        store.insert(&t, &bulky_payload(), 1).await.unwrap();

        let manager = RetentionManager::new(1024);
        assert_eq!(manager.enforce(&store, &t).await.unwrap(), 0);
        assert_eq!(store.row_count(&t).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_unit_is_a_no_op() {
        let store = setup().await;
        let manager = RetentionManager::new(1024);
        assert_eq!(manager.enforce(&store, &topic()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn evicts_oldest_down_to_target() {
        let store = setup().await;
        let t = topic();

        // ~0.55 KB per row; 20 rows is ~11 KB
        for i in 0..20 {
            store.insert(&t, &bulky_payload(), 1000 + i).await.unwrap();
        }

        let manager = RetentionManager::new(8);
        let evicted = manager.enforce(&store, &t).await.unwrap();
        assert!(evicted > 0);

        // Back under the 80% target, and the survivors are the newest rows
        let footprint = store.footprint_kb(&t).await.unwrap();
        assert!(footprint <= 8.0 * EVICTION_TARGET_RATIO + 0.6);

        let remaining = store
            .query(&t, None, 0, recordhouse_core::FetchOrder::Ascending)
            .await
            .unwrap();
        let oldest_survivor = remaining[0].as_ref().unwrap();
        assert_eq!(oldest_survivor.received_at, 1000 + evicted as i64);
    }

    #[tokio::test]
    async fn repeated_enforcement_converges() {
        let store = setup().await;
        let t = topic();
        let manager = RetentionManager::new(4);

        for i in 0..40 {
            store.insert(&t, &bulky_payload(), i).await.unwrap();
            manager.enforce(&store, &t).await.unwrap();
            // Never more than one row's slack past the maximum
            let footprint = store.footprint_kb(&t).await.unwrap();
            assert!(footprint <= 4.0 + 0.6);
        }
    }
}
