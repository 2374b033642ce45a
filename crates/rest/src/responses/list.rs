//! List response bodies.
//!
//! A list renders as a JSON array of records. Its ETag is the sha256 of the
//! rendered body, so any change to membership, order or content changes it.

use axum::body::Bytes;
use stowage_persistence::types::{StoredRecord, sha256_hex};

use crate::error::RestResult;

/// A rendered list and its entity tag.
#[derive(Debug)]
pub struct ListBody {
    /// Serialized JSON array.
    pub body: Bytes,
    /// Unquoted `etag:<hex>` of `body`.
    pub etag: String,
}

impl ListBody {
    /// Renders `records` in order.
    pub fn render(records: &[StoredRecord]) -> RestResult<Self> {
        let items: Vec<_> = records.iter().map(StoredRecord::to_json).collect();
        let body = serde_json::to_vec(&items)?;
        let etag = format!("etag:{}", sha256_hex(&body));

        Ok(Self {
            body: Bytes::from(body),
            etag,
        })
    }
}
