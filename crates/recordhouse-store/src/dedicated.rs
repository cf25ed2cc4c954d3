//! Dedicated Storage Strategy
//!
//! One physical table per topic, named by a fixed prefix plus the sanitized
//! topic name, with one column per schema field (via the column mapper)
//! plus `id` and `received_at`. Values undergo per-field type coercion on
//! both write and read; payload fields missing at write time are stored as
//! null. Dropping the topic drops the table.
//!
//! `ensure_unit` reconciles the live table with the current schema: fields
//! added by a re-registration get their columns via `ALTER TABLE`, so
//! writes keep working after the schema grows. Removed fields keep their
//! columns (SQLite column drops are expensive) but are no longer selected.
//!
//! ## Statement Safety
//!
//! Table and column names are derived exclusively from sanitized
//! identifiers and re-checked against a strict allowlist before they are
//! spliced (double-quoted) into any statement; every value travels as a
//! bound parameter. No caller-controlled string is ever interpolated raw.

use crate::column;
use crate::error::{Result, StoreError};
use crate::{limit_sql, order_sql, StorageStrategy};
use async_trait::async_trait;
use recordhouse_core::{
    sanitize_identifier, FetchOrder, RecordResult, SchemaError, StoredRecord, Topic,
};
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};

/// Fixed prefix for dedicated table names.
pub const TABLE_PREFIX: &str = "topic_";

/// Same per-row overhead constant the shared strategy uses.
const ROW_OVERHEAD_BYTES: i64 = 24;

pub struct DedicatedStore {
    pool: SqlitePool,
}

impl DedicatedStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Physical table name for a topic.
    pub fn table_name(topic: &Topic) -> String {
        format!("{TABLE_PREFIX}{}", sanitize_identifier(&topic.name))
    }

    /// Quoted, allowlist-checked identifier. The allowlist can only fire on
    /// an identifier that skipped sanitization, which would be a bug here —
    /// but a caller-controlled string must never reach a statement anyway.
    fn quote_ident(ident: &str) -> Result<String> {
        if ident.is_empty() || !ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(StoreError::Validation(SchemaError::InvalidIdentifier(
                ident.to_string(),
            )));
        }
        Ok(format!("\"{ident}\""))
    }

    /// Quoted column list in schema declaration order.
    fn column_list(topic: &Topic) -> Result<Vec<String>> {
        topic
            .schema
            .fields()
            .iter()
            .map(|f| Self::quote_ident(&f.column_name()))
            .collect()
    }
}

#[async_trait]
impl StorageStrategy for DedicatedStore {
    async fn ensure_unit(&self, topic: &Topic) -> Result<()> {
        let table = Self::quote_ident(&Self::table_name(topic))?;

        let mut columns = vec![
            "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            "received_at INTEGER NOT NULL".to_string(),
        ];
        for field in topic.schema.fields() {
            let column = Self::quote_ident(&field.column_name())?;
            let physical = column::PhysicalType::for_field(&field.field_type);
            columns.push(format!("{column} {}", physical.sql()));
        }

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} ({})",
            columns.join(", ")
        ))
        .execute(&self.pool)
        .await?;

        // A re-registration may have grown the schema since the table was
        // created. Add columns for fields the live table is missing.
        let live: Vec<String> = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| row.get("name"))
            .collect();

        for field in topic.schema.fields() {
            let name = field.column_name();
            if live.iter().any(|c| *c == name) {
                continue;
            }
            let column = Self::quote_ident(&name)?;
            let physical = column::PhysicalType::for_field(&field.field_type);
            sqlx::query(&format!(
                "ALTER TABLE {table} ADD COLUMN {column} {}",
                physical.sql()
            ))
            .execute(&self.pool)
            .await?;
            tracing::info!(topic = %topic.name, column = %name, "added column for re-registered schema field");
        }

        let index = Self::quote_ident(&format!(
            "idx_{}{}_received",
            TABLE_PREFIX,
            sanitize_identifier(&topic.name)
        ))?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {index} ON {table} (received_at, id)"
        ))
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
        let table = Self::quote_ident(&Self::table_name(topic))?;
        let columns = Self::column_list(topic)?;

        let placeholders = vec!["?"; columns.len() + 1];

        let sql = format!(
            "INSERT INTO {table} (received_at, {}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        // Encode everything before touching the database: a coercion
        // failure must store nothing.
        let mut values = Vec::with_capacity(topic.schema.len());
        for field in topic.schema.fields() {
            let value = payload.get(&field.name).unwrap_or(&Value::Null);
            values.push(column::encode(value, field)?);
        }

        let mut query = sqlx::query(&sql).bind(received_at);
        for value in values {
            query = value.bind(query);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.last_insert_rowid())
    }

    async fn query(
        &self,
        topic: &Topic,
        limit: Option<u32>,
        offset: u32,
        order: FetchOrder,
    ) -> Result<Vec<RecordResult>> {
        let table = Self::quote_ident(&Self::table_name(topic))?;
        let columns = Self::column_list(topic)?;

        let select = if columns.is_empty() {
            "id, received_at".to_string()
        } else {
            format!("id, received_at, {}", columns.join(", "))
        };

        let sql = format!(
            "SELECT {select} FROM {table} ORDER BY {} LIMIT ? OFFSET ?",
            order_sql(order)
        );

        let rows = sqlx::query(&sql)
            .bind(limit_sql(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get(0);
                let received_at: i64 = row.get(1);

                let mut fields = Map::new();
                for (i, field) in topic.schema.fields().iter().enumerate() {
                    let value = column::decode(&row, i + 2, field, id)?;
                    fields.insert(field.name.clone(), value);
                }

                Ok(StoredRecord {
                    id,
                    topic: topic.name.clone(),
                    received_at,
                    fields,
                })
            })
            .collect())
    }

    async fn drop_unit(&self, topic: &Topic) -> Result<()> {
        let table = Self::quote_ident(&Self::table_name(topic))?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&self.pool)
            .await?;

        tracing::debug!(topic = %topic.name, "dropped dedicated table");
        Ok(())
    }

    async fn footprint_kb(&self, topic: &Topic) -> Result<f64> {
        let table = Self::quote_ident(&Self::table_name(topic))?;
        let columns = Self::column_list(topic)?;

        let mut size_expr = format!("{ROW_OVERHEAD_BYTES}");
        for column in &columns {
            size_expr.push_str(&format!(" + COALESCE(LENGTH({column}), 0)"));
        }

        let bytes: i64 = sqlx::query(&format!(
            "SELECT COALESCE(SUM({size_expr}), 0) FROM {table}"
        ))
        .fetch_one(&self.pool)
        .await?
        .get(0);

        Ok(bytes as f64 / 1024.0)
    }

    async fn row_count(&self, topic: &Topic) -> Result<u64> {
        let table = Self::quote_ident(&Self::table_name(topic))?;
        let count: i64 = sqlx::query(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?
            .get(0);

        Ok(count as u64)
    }

    async fn evict_oldest(&self, topic: &Topic, rows: u64) -> Result<u64> {
        let table = Self::quote_ident(&Self::table_name(topic))?;
        let deleted = sqlx::query(&format!(
            "DELETE FROM {table} WHERE id IN ( \
                 SELECT id FROM {table} ORDER BY received_at ASC, id ASC LIMIT ?)"
        ))
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
