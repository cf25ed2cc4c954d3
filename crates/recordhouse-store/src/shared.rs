//! Shared Storage Strategy
//!
//! All shared-mode topics write into one wide `messages` table, rows tagged
//! with the owning topic name. The whole payload is stored as one opaque
//! JSON blob: insert and query never touch individual fields, so the
//! payload survives round-trip byte-for-byte (modulo the JSON
//! serialize/parse cycle) without the per-field coercion dedicated tables
//! apply.
//!
//! The shared unit outlives any one topic: dropping a topic deletes its
//! tagged rows, never the table.

use crate::error::Result;
use crate::{limit_sql, order_sql, StorageStrategy};
use async_trait::async_trait;
use recordhouse_core::{DecodeError, FetchOrder, RecordResult, StoredRecord, Topic};
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};

/// Fixed per-row storage overhead (rowid, lengths, page bookkeeping) used
/// by the footprint estimate.
const ROW_OVERHEAD_BYTES: i64 = 24;

pub struct SharedStore {
    pool: SqlitePool,
}

impl SharedStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageStrategy for SharedStore {
    async fn ensure_unit(&self, _topic: &Topic) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topic TEXT NOT NULL,
                payload TEXT NOT NULL,
                received_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_topic \
             ON messages (topic, received_at, id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert(
        &self,
        topic: &Topic,
        payload: &Map<String, Value>,
        received_at: i64,
    ) -> Result<i64> {
        let payload_json = serde_json::to_string(payload)?;

        let result = sqlx::query(
            "INSERT INTO messages (topic, payload, received_at) VALUES (?, ?, ?)",
        )
        .bind(&topic.name)
        .bind(&payload_json)
        .bind(received_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn query(
        &self,
        topic: &Topic,
        limit: Option<u32>,
        offset: u32,
        order: FetchOrder,
    ) -> Result<Vec<RecordResult>> {
        let sql = format!(
            "SELECT id, received_at, payload FROM messages WHERE topic = ? \
             ORDER BY {} LIMIT ? OFFSET ?",
            order_sql(order)
        );

        let rows = sqlx::query(&sql)
            .bind(&topic.name)
            .bind(limit_sql(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get(0);
                let received_at: i64 = row.get(1);
                let payload: &str = row.get(2);

                match serde_json::from_str::<Map<String, Value>>(payload) {
                    Ok(fields) => Ok(StoredRecord {
                        id,
                        topic: topic.name.clone(),
                        received_at,
                        fields,
                    }),
                    Err(e) => Err(DecodeError {
                        record_id: id,
                        field: "payload".to_string(),
                        reason: e.to_string(),
                    }),
                }
            })
            .collect())
    }

    async fn drop_unit(&self, topic: &Topic) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM messages WHERE topic = ?")
            .bind(&topic.name)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!(topic = %topic.name, deleted, "cleared shared rows");
        Ok(())
    }

    async fn footprint_kb(&self, topic: &Topic) -> Result<f64> {
        let bytes: i64 = sqlx::query(
            "SELECT COALESCE(SUM(LENGTH(payload) + LENGTH(topic) + ?), 0) \
             FROM messages WHERE topic = ?",
        )
        .bind(ROW_OVERHEAD_BYTES)
        .bind(&topic.name)
        .fetch_one(&self.pool)
        .await?
        .get(0);

        Ok(bytes as f64 / 1024.0)
    }

    async fn row_count(&self, topic: &Topic) -> Result<u64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM messages WHERE topic = ?")
            .bind(&topic.name)
            .fetch_one(&self.pool)
            .await?
            .get(0);

        Ok(count as u64)
    }

    async fn evict_oldest(&self, topic: &Topic, rows: u64) -> Result<u64> {
        let deleted = sqlx::query(
            "DELETE FROM messages WHERE id IN ( \
                 SELECT id FROM messages WHERE topic = ? \
                 ORDER BY received_at ASC, id ASC LIMIT ?)",
        )
        .bind(&topic.name)
        .bind(rows as i64)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted)
    }

    async fn compact(&self, _topic: &Topic) -> Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordhouse_core::{FieldSpec, FieldType, Schema, StorageMode};
    use serde_json::json;
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
        store.ensure_unit(&topic("any")).await.unwrap();
        store
    }

    fn topic(name: &str) -> Topic {
        Topic {
            name: name.to_string(),
            schema: Schema::new(vec![FieldSpec::new("value", FieldType::Number)]),
            mode: StorageMode::Shared,
            created_at: 0,
        }
    }

    fn payload(value: Value) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("value".to_string(), value);
        map
    }

    #[tokio::test]
    async fn payload_round_trips_without_coercion() {
        let store = setup().await;
        let t = topic("sensors");

        // A numeric string stays a string: shared rows are opaque
        store
            .insert(&t, &payload(json!("25.5")), 1000)
            .await
            .unwrap();

        let records = store
            .query(&t, None, 0, FetchOrder::Ascending)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        let record = records[0].as_ref().unwrap();
        assert_eq!(record.fields["value"], json!("25.5"));
        assert_eq!(record.received_at, 1000);
    }

    #[tokio::test]
    async fn rows_are_isolated_by_topic() {
        let store = setup().await;
        let a = topic("a");
        let b = topic("b");

        store.insert(&a, &payload(json!(1)), 10).await.unwrap();
        store.insert(&b, &payload(json!(2)), 20).await.unwrap();

        let records = store
            .query(&a, None, 0, FetchOrder::Ascending)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);

        store.drop_unit(&a).await.unwrap();
        assert_eq!(store.row_count(&a).await.unwrap(), 0);
        assert_eq!(store.row_count(&b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pagination_and_order() {
        let store = setup().await;
        let t = topic("pages");

        for i in 0..5 {
            store.insert(&t, &payload(json!(i)), 1000 + i).await.unwrap();
        }

        let page = store
            .query(&t, Some(2), 1, FetchOrder::Ascending)
            .await
            .unwrap();
        let values: Vec<i64> = page
            .iter()
            .map(|r| r.as_ref().unwrap().fields["value"].as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![1, 2]);

        let desc = store
            .query(&t, None, 0, FetchOrder::Descending)
            .await
            .unwrap();
        let first = desc[0].as_ref().unwrap();
        assert_eq!(first.fields["value"], json!(4));
    }

    #[tokio::test]
    async fn corrupt_payload_reported_per_record() {
        let store = setup().await;
        let t = topic("mixed");

        store.insert(&t, &payload(json!(1)), 10).await.unwrap();
        sqlx::query("UPDATE messages SET payload = 'not json' WHERE received_at = 10")
            .execute(&store.pool)
            .await
            .unwrap();
        store.insert(&t, &payload(json!(2)), 20).await.unwrap();

        let records = store
            .query(&t, None, 0, FetchOrder::Ascending)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_err());
        assert!(records[1].is_ok());
    }

    #[tokio::test]
    async fn eviction_removes_oldest_first() {
        let store = setup().await;
        let t = topic("evict");

        for i in 0..4 {
            store.insert(&t, &payload(json!(i)), 1000 + i).await.unwrap();
        }

        let deleted = store.evict_oldest(&t, 2).await.unwrap();
        assert_eq!(deleted, 2);

        let remaining = store
            .query(&t, None, 0, FetchOrder::Ascending)
            .await
            .unwrap();
        let values: Vec<i64> = remaining
            .iter()
            .map(|r| r.as_ref().unwrap().fields["value"].as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![2, 3]);
    }

    #[tokio::test]
    async fn footprint_grows_with_rows() {
        let store = setup().await;
        let t = topic("size");

        let empty = store.footprint_kb(&t).await.unwrap();
        assert_eq!(empty, 0.0);

        store.insert(&t, &payload(json!("x".repeat(2048))), 1).await.unwrap();
        let one = store.footprint_kb(&t).await.unwrap();
        assert!(one > 2.0);
    }
}
