//! Stored record types.
//!
//! This module defines the [`StoredRecord`] type, which wraps a record's
//! data fields with server-owned metadata: identity, generation, etag and
//! timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Keys owned by the server. They are stripped from every input document and
/// added back when a record is rendered.
pub const METADATA_FIELDS: [&str; 3] = ["id", "etag", "generation"];

/// A record with persistence metadata.
///
/// `content` holds only the record's data fields, always as a JSON object
/// with every field of the record type present. Metadata lives beside it:
///
/// - **Identity**: type name and ID
/// - **Generation**: `0` at creation, incremented on every replace
/// - **ETag**: `etag:` followed by the SHA-256 of the canonical content
/// - **Timestamps**: creation and last modification
///
/// # Examples
///
/// ```
/// use stowage_persistence::types::StoredRecord;
/// use serde_json::json;
///
/// let record = StoredRecord::new("testtype", "123", json!({"text": "foo", "num": 5}));
///
/// assert_eq!(record.type_name(), "testtype");
/// assert_eq!(record.generation(), 0);
/// assert!(record.etag().starts_with("etag:"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    type_name: String,
    id: String,
    generation: u64,
    etag: String,
    content: Value,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

impl StoredRecord {
    /// Creates a freshly created record at generation 0.
    pub fn new(type_name: impl Into<String>, id: impl Into<String>, content: Value) -> Self {
        let now = Utc::now();
        let etag = compute_etag(&content);

        Self {
            type_name: type_name.into(),
            id: id.into(),
            generation: 0,
            etag,
            content,
            created_at: now,
            last_modified: now,
        }
    }

    /// Creates a stored record from existing data (e.g., loaded from database).
    ///
    /// The etag is recomputed from the content.
    pub fn from_storage(
        type_name: impl Into<String>,
        id: impl Into<String>,
        generation: u64,
        content: Value,
        created_at: DateTime<Utc>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let etag = compute_etag(&content);

        Self {
            type_name: type_name.into(),
            id: id.into(),
            generation,
            etag,
            content,
            created_at,
            last_modified,
        }
    }

    /// Returns the record that results from replacing this record's content.
    ///
    /// Identity and creation time are kept, the generation advances by one.
    pub fn replaced(&self, content: Value) -> Self {
        let etag = compute_etag(&content);

        Self {
            type_name: self.type_name.clone(),
            id: self.id.clone(),
            generation: self.generation + 1,
            etag,
            content,
            created_at: self.created_at,
            last_modified: Utc::now(),
        }
    }

    /// Returns the record type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the record's ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the etag, e.g. `etag:3f2a...`.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Returns the data fields as JSON.
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Consumes self and returns the data fields.
    pub fn into_content(self) -> Value {
        self.content
    }

    /// Returns when the record was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the record was last modified.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Returns the record's path relative to the API root.
    pub fn url(&self) -> String {
        format!("{}/{}", self.type_name, self.id)
    }

    /// Looks up a field for filtering and sorting.
    ///
    /// `id` and `generation` resolve to metadata, anything else to the
    /// top-level data field of that name.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "generation" => Some(Value::from(self.generation)),
            "etag" => Some(Value::String(self.etag.clone())),
            _ => self.content.get(name).cloned(),
        }
    }

    /// Renders the record as seen by clients: data fields plus metadata.
    pub fn to_json(&self) -> Value {
        let mut obj = match &self.content {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        obj.insert("id".to_string(), Value::String(self.id.clone()));
        obj.insert("etag".to_string(), Value::String(self.etag.clone()));
        obj.insert("generation".to_string(), Value::from(self.generation));
        Value::Object(obj)
    }
}

/// Computes the etag of a record's content.
///
/// `serde_json` keeps object keys sorted, so equal content always serializes
/// to the same bytes.
pub fn compute_etag(content: &Value) -> String {
    format!("etag:{}", sha256_hex(content.to_string().as_bytes()))
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
