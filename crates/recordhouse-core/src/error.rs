//! Core Error Types
//!
//! Two error families live here:
//!
//! - [`SchemaError`]: a topic definition is malformed (empty, or its field
//!   names collide after sanitization). Raised at registration time.
//! - [`DecodeError`]: a stored value failed to parse back into its logical
//!   type on read. Only detectable lazily, so it is reported per record
//!   rather than failing the whole fetch.

use thiserror::Error;

/// A topic definition that cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Topic name is empty")]
    EmptyName,

    #[error("Schema has no fields")]
    EmptySchema,

    #[error("Field name is empty")]
    EmptyField,

    #[error("Fields '{first}' and '{second}' collide after sanitization ('{sanitized}')")]
    FieldCollision {
        first: String,
        second: String,
        sanitized: String,
    },

    #[error("Field '{field}' collides with the reserved column '{reserved}'")]
    ReservedField { field: String, reserved: String },

    #[error("'{0}' is not a storage-safe identifier")]
    InvalidIdentifier(String),

    #[error("Topic '{topic}' collides with existing topic '{existing}' after sanitization ('{sanitized}')")]
    TopicCollision {
        topic: String,
        existing: String,
        sanitized: String,
    },
}

/// A single record that could not be decoded on read.
///
/// Carries enough context (record id, field name) for the caller to report
/// or skip the record without losing the rest of the page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Record {record_id}, field '{field}': {reason}")]
pub struct DecodeError {
    /// Id of the record that failed to decode
    pub record_id: i64,

    /// The schema field (or `payload` for shared-table blobs)
    pub field: String,

    /// Parser message
    pub reason: String,
}
