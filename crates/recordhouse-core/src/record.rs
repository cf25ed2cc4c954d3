//! Topics and Stored Records

use crate::error::DecodeError;
use crate::schema::{Schema, StorageMode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Definition passed to topic registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic name (unique key, immutable once created)
    pub name: String,

    /// Ordered field schema
    pub schema: Schema,

    /// Shared or dedicated storage
    pub mode: StorageMode,
}

/// An existing topic as held in the registry.
///
/// Re-registering the same name overwrites `schema` and `mode` in place
/// (last-write-wins, no versioning); `created_at` keeps the original
/// registration time. A mode change does **not** migrate previously stored
/// rows between backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Topic name
    pub name: String,

    /// Ordered field schema
    pub schema: Schema,

    /// Shared or dedicated storage
    pub mode: StorageMode,

    /// Registration timestamp (milliseconds since Unix epoch)
    pub created_at: i64,
}

/// One persisted record, decoded back into its logical form.
///
/// `fields` contains exactly the keys declared in the topic's schema at
/// write time; payload fields that were absent on write come back as
/// `Value::Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Monotonically increasing identifier within the storage unit
    pub id: i64,

    /// Owning topic name
    pub topic: String,

    /// Receipt timestamp (milliseconds since Unix epoch)
    pub received_at: i64,

    /// Field name -> decoded value
    pub fields: Map<String, Value>,
}

/// Per-record fetch outcome: a decode failure in one record does not abort
/// the page it was read with.
pub type RecordResult = Result<StoredRecord, DecodeError>;

/// Read order over `(received_at, id)`.
///
/// Ascending is the total order `(received_at ASC, id ASC)`; descending is
/// its exact reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchOrder {
    #[default]
    Ascending,
    Descending,
}

/// Pagination and ordering for a fetch.
///
/// `limit: None` means unbounded — return every matching row from `offset`
/// onward. This supports full exports and is a deliberate capacity trade-off
/// for very large topics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Maximum rows to return; `None` falls back to the configured default
    pub limit: Option<u32>,

    /// Rows to skip
    pub offset: u32,

    /// Read order; `None` falls back to the configured default
    pub order: Option<FetchOrder>,
}

impl FetchOptions {
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn order(mut self, order: FetchOrder) -> Self {
        self.order = Some(order);
        self
    }
}
