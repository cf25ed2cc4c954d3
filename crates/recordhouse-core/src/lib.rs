//! Recordhouse Core Types
//!
//! This crate holds the domain vocabulary shared by every recordhouse
//! component: topic schemas, storage modes, stored records, fetch options,
//! and the delimited-text export contract.
//!
//! ## What Lives Here?
//!
//! - **Schemas**: an ordered list of named, abstractly-typed fields
//!   ([`Schema`], [`FieldSpec`], [`FieldType`])
//! - **Topics**: a named stream of records sharing one schema
//!   ([`Topic`], [`TopicConfig`], [`StorageMode`])
//! - **Records**: one ingested payload with its assigned id and receipt
//!   time ([`StoredRecord`])
//! - **Export**: CSV rendering consumed by external spreadsheet tooling
//!   ([`export::render_csv`])
//!
//! ## What Does NOT Live Here?
//!
//! Anything that touches the database. The storage engine (registry,
//! shared/dedicated tables, retention) lives in `recordhouse-store` and
//! depends on this crate, not the other way around.
//!
//! ## Design Decisions
//!
//! - Timestamps are i64 milliseconds since epoch throughout
//! - Field values are `serde_json::Value`; payloads arrive as JSON objects
//! - Schemas preserve declaration order (a `Vec`, not a map)

pub mod error;
pub mod export;
pub mod record;
pub mod schema;

pub use error::{DecodeError, SchemaError};
pub use record::{FetchOptions, FetchOrder, RecordResult, StoredRecord, Topic, TopicConfig};
pub use schema::{sanitize_identifier, FieldSpec, FieldType, Schema, StorageMode};
