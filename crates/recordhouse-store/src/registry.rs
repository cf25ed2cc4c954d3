//! Schema Registry
//!
//! Durable mapping from topic name to `{schema, storage mode, creation
//! time}` — the single source of truth for topic existence. Backed by one
//! `topics` table; schemas are stored as JSON text.
//!
//! `register` is an idempotent upsert: re-registering a name overwrites the
//! schema and mode in place (last-write-wins, no versioning) while keeping
//! the original `created_at`. It returns the previous mode, if any, so the
//! facade can detect and warn about a mode change. Registered data is never
//! migrated between backends here.
//!
//! Sanitized topic names are persisted under a UNIQUE index: two distinct
//! names that alias one physical table cannot both register, even from
//! concurrent callers — the database enforces it, not a read-then-write
//! check.

use crate::error::{Result, StoreError};
use recordhouse_core::{sanitize_identifier, Schema, SchemaError, StorageMode, Topic, TopicConfig};
use sqlx::{Row, SqlitePool};

pub struct SchemaRegistry {
    pool: SqlitePool,
}

impl SchemaRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the registry table if missing. Safe to call repeatedly.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS topics (
                name TEXT PRIMARY KEY,
                sanitized TEXT NOT NULL,
                schema TEXT NOT NULL,
                storage_mode TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_topics_sanitized ON topics (sanitized)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert a topic definition; returns the previously registered mode if
    /// the topic already existed.
    ///
    /// A *different* topic name aliasing the same sanitized identifier is
    /// rejected with [`SchemaError::TopicCollision`] via the UNIQUE index on
    /// `sanitized`.
    pub async fn register(&self, config: &TopicConfig, now: i64) -> Result<Option<StorageMode>> {
        let schema_json = serde_json::to_string(&config.schema)?;
        let sanitized = sanitize_identifier(&config.name);

        let mut tx = self.pool.begin().await?;

        let previous: Option<String> =
            sqlx::query("SELECT storage_mode FROM topics WHERE name = ?")
                .bind(&config.name)
                .fetch_optional(&mut *tx)
                .await?
                .map(|row| row.get(0));

        let upsert = sqlx::query(
            r#"
            INSERT INTO topics (name, sanitized, schema, storage_mode, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                schema = excluded.schema,
                storage_mode = excluded.storage_mode
            "#,
        )
        .bind(&config.name)
        .bind(&sanitized)
        .bind(&schema_json)
        .bind(config.mode.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await;

        match upsert {
            Ok(_) => {}
            Err(e) if is_sanitized_conflict(&e) => {
                drop(tx);
                let existing = self
                    .sanitized_collision(&config.name)
                    .await?
                    .unwrap_or_default();
                return Err(StoreError::Validation(SchemaError::TopicCollision {
                    topic: config.name.clone(),
                    existing,
                    sanitized,
                }));
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;

        previous.as_deref().map(parse_mode).transpose()
    }

    pub async fn get(&self, name: &str) -> Result<Option<Topic>> {
        let row = sqlx::query(
            "SELECT name, schema, storage_mode, created_at FROM topics WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(topic_from_row).transpose()
    }

    /// All topics, newest registration first.
    pub async fn list(&self) -> Result<Vec<Topic>> {
        let rows = sqlx::query(
            "SELECT name, schema, storage_mode, created_at FROM topics \
             ORDER BY created_at DESC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(topic_from_row).collect()
    }

    /// Delete the registry row. The owning storage unit must already have
    /// been dropped or cleared by the caller.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let rows_affected = sqlx::query("DELETE FROM topics WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::TopicNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Name of an existing, *different* topic whose sanitized identifier
    /// collides with `name`'s. Sanitization is not injective, and a
    /// collision would alias two topics onto one dedicated table.
    pub async fn sanitized_collision(&self, name: &str) -> Result<Option<String>> {
        let sanitized = sanitize_identifier(name);

        let rows = sqlx::query("SELECT name FROM topics WHERE name != ?")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>(0))
            .find(|existing| sanitize_identifier(existing) == sanitized))
    }
}

fn is_sanitized_conflict(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db)
        if db.message().contains("UNIQUE constraint failed: topics.sanitized"))
}

fn parse_mode(s: &str) -> Result<StorageMode> {
    match s {
        "shared" => Ok(StorageMode::Shared),
        "dedicated" => Ok(StorageMode::Dedicated),
        other => Err(StoreError::Serialization(serde::de::Error::custom(
            format!("unknown storage mode '{other}'"),
        ))),
    }
}

fn topic_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Topic> {
    let schema: Schema = serde_json::from_str(row.get("schema"))?;
    let mode = parse_mode(row.get("storage_mode"))?;
    Ok(Topic {
        name: row.get("name"),
        schema,
        mode,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordhouse_core::{FieldSpec, FieldType};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> SchemaRegistry {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let registry = SchemaRegistry::new(pool);
        registry.ensure_schema().await.unwrap();
        registry
    }

    fn config(name: &str, mode: StorageMode) -> TopicConfig {
        TopicConfig {
            name: name.to_string(),
            schema: Schema::new(vec![FieldSpec::new("value", FieldType::Number)]),
            mode,
        }
    }

    #[tokio::test]
    async fn register_and_get() {
        let registry = setup().await;

        let previous = registry
            .register(&config("sensors", StorageMode::Dedicated), 100)
            .await
            .unwrap();
        assert!(previous.is_none());

        let topic = registry.get("sensors").await.unwrap().unwrap();
        assert_eq!(topic.name, "sensors");
        assert_eq!(topic.mode, StorageMode::Dedicated);
        assert_eq!(topic.created_at, 100);
        assert_eq!(topic.schema.len(), 1);
    }

    #[tokio::test]
    async fn reregistration_overwrites_in_place() {
        let registry = setup().await;

        registry
            .register(&config("sensors", StorageMode::Dedicated), 100)
            .await
            .unwrap();
        let previous = registry
            .register(&config("sensors", StorageMode::Shared), 200)
            .await
            .unwrap();

        assert_eq!(previous, Some(StorageMode::Dedicated));

        let topic = registry.get("sensors").await.unwrap().unwrap();
        assert_eq!(topic.mode, StorageMode::Shared);
        // Original registration time is preserved
        assert_eq!(topic.created_at, 100);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let registry = setup().await;

        registry
            .register(&config("old", StorageMode::Shared), 100)
            .await
            .unwrap();
        registry
            .register(&config("new", StorageMode::Shared), 200)
            .await
            .unwrap();

        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn remove_missing_topic_is_not_found() {
        let registry = setup().await;
        assert!(matches!(
            registry.remove("ghost").await,
            Err(StoreError::TopicNotFound(_))
        ));
    }

    #[tokio::test]
    async fn detects_sanitized_name_collision() {
        let registry = setup().await;

        registry
            .register(&config("sensor/temp", StorageMode::Dedicated), 100)
            .await
            .unwrap();

        let clash = registry.sanitized_collision("sensor.temp").await.unwrap();
        assert_eq!(clash, Some("sensor/temp".to_string()));

        // A topic never collides with itself
        let same = registry.sanitized_collision("sensor/temp").await.unwrap();
        assert!(same.is_none());
    }

    #[tokio::test]
    async fn aliasing_names_cannot_both_register() {
        let registry = setup().await;

        registry
            .register(&config("a/b", StorageMode::Dedicated), 100)
            .await
            .unwrap();

        // The UNIQUE index rejects the alias even without a prior read
        let err = registry
            .register(&config("a.b", StorageMode::Dedicated), 200)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(SchemaError::TopicCollision { ref existing, .. })
                if existing == "a/b"
        ));

        // Re-registering the same name is still an upsert, not a collision
        registry
            .register(&config("a/b", StorageMode::Shared), 300)
            .await
            .unwrap();
    }
}
