//! Topic Schemas
//!
//! A schema is an ordered mapping from field name to an abstract field type.
//! The abstract types are deliberately loose (they come from external
//! registrations, not from this codebase), so parsing is permissive:
//! anything we do not recognize is preserved verbatim and later stored as
//! text.
//!
//! ## Identifier Sanitization
//!
//! Field and topic names flow into physical table/column names. They are
//! sanitized by replacing every non-alphanumeric character with `_`, then
//! validated: two distinct names that collide after sanitization are a
//! registration-time error, not a silent overwrite. Sanitized identifiers
//! are the only strings ever spliced into a storage statement, and they are
//! always double-quoted there.

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};

/// Physical columns every dedicated table carries; schema fields may not
/// sanitize onto these.
pub const RESERVED_COLUMNS: &[&str] = &["id", "received_at"];

/// Abstract field type as registered for a topic.
///
/// Unrecognized type names are kept as [`FieldType::Other`] and map to text
/// storage. This is a permissive default, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Date,
    Timestamp,
    Array,
    Object,
    /// Anything else; stored as text
    Other(String),
}

impl FieldType {
    /// Parse a registered type name. Case-insensitive, never fails.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" => FieldType::String,
            "number" => FieldType::Number,
            "integer" => FieldType::Integer,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "timestamp" => FieldType::Timestamp,
            "array" => FieldType::Array,
            "object" => FieldType::Object,
            other => {
                tracing::debug!(field_type = other, "unrecognized field type, falling back to text");
                FieldType::Other(other.to_string())
            }
        }
    }

    /// The registered name of this type.
    pub fn name(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Other(name) => name,
        }
    }

    /// Structured types round-trip through a serialize-to-text step.
    pub fn is_structured(&self) -> bool {
        matches!(self, FieldType::Array | FieldType::Object)
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        FieldType::parse(&s)
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.name().to_string()
    }
}

/// One named, typed field of a topic schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as registered (unsanitized)
    pub name: String,

    /// Abstract field type
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Storage-safe column name for this field.
    pub fn column_name(&self) -> String {
        sanitize_identifier(&self.name)
    }
}

/// Ordered field list for one topic.
///
/// Declaration order is significant: dedicated-table columns, decoded
/// records, and CSV export all follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check that this schema can be registered: non-empty, no empty field
    /// names, and no two fields (or a field and a reserved column) sharing
    /// one sanitized identifier.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::EmptySchema);
        }

        let mut seen: Vec<(String, &str)> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(SchemaError::EmptyField);
            }

            let sanitized = field.column_name();
            if RESERVED_COLUMNS.contains(&sanitized.as_str()) {
                return Err(SchemaError::ReservedField {
                    field: field.name.clone(),
                    reserved: sanitized,
                });
            }

            if let Some((_, first)) = seen.iter().find(|(s, _)| *s == sanitized) {
                return Err(SchemaError::FieldCollision {
                    first: first.to_string(),
                    second: field.name.clone(),
                    sanitized,
                });
            }
            seen.push((sanitized, field.name.as_str()));
        }

        Ok(())
    }
}

/// Storage mode for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// All topics share one wide table, rows tagged by topic name.
    /// Payloads are stored opaquely: no per-field type coercion.
    Shared,

    /// One physical table per topic, one column per schema field.
    /// Values undergo per-field type coercion on both write and read.
    Dedicated,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Shared => "shared",
            StorageMode::Dedicated => "dedicated",
        }
    }
}

/// Replace every non-alphanumeric character with `_`.
///
/// Not injective: distinct names may collide after sanitization, which is
/// why [`Schema::validate`] and topic registration check for collisions.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
