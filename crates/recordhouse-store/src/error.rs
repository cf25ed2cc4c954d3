//! Store Error Types
//!
//! ## Error Categories
//!
//! - `Validation`: malformed topic definition (empty name/fields,
//!   sanitization collision). Raised before anything touches the database.
//! - `TopicNotFound`: unknown topic on put/fetch/delete.
//! - `Encode`: a payload value cannot be coerced to its declared field type
//!   at write time.
//! - `Database`: connection-pool or statement failure. The "no such table"
//!   sub-case is handled internally by the facade's single self-heal retry;
//!   everything else propagates untouched.
//! - `Serialization`: a schema or payload failed JSON (de)serialization.
//!
//! Per-record decode failures on read are *not* in this enum: they surface
//! as `recordhouse_core::DecodeError` entries inside the fetched page, so
//! one bad row never aborts a whole fetch.

use recordhouse_core::SchemaError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid topic definition: {0}")]
    Validation(#[from] SchemaError),

    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Cannot encode field '{field}' as {field_type}: {reason}")]
    Encode {
        field: String,
        field_type: String,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// The "storage unit missing" sub-case of a statement failure, which the
    /// facade self-heals with exactly one ensure-and-retry.
    pub fn is_missing_unit(&self) -> bool {
        match self {
            StoreError::Database(e) => e.to_string().contains("no such table"),
            _ => false,
        }
    }
}
