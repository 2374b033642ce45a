//! Response header generation.

use axum::http::{HeaderMap, HeaderValue, header};
use stowage_persistence::types::StoredRecord;

/// Builder for record response headers.
///
/// - `ETag` (quoted `"etag:<hex>"`)
/// - `Last-Modified`
/// - `Location` (for created records)
/// - `Content-Type`
#[derive(Debug, Default)]
pub struct RecordHeaders {
    etag: Option<String>,
    last_modified: Option<String>,
    location: Option<String>,
}

impl RecordHeaders {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates headers from a stored record.
    pub fn from_stored(stored: &StoredRecord) -> Self {
        Self {
            etag: Some(quote(stored.etag())),
            last_modified: Some(
                stored
                    .last_modified()
                    .format("%a, %d %b %Y %H:%M:%S GMT")
                    .to_string(),
            ),
            location: None,
        }
    }

    /// Sets the ETag from an unquoted entity tag.
    pub fn with_etag(mut self, etag: &str) -> Self {
        self.etag = Some(quote(etag));
        self
    }

    /// Sets the Location URL.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Converts to an Axum HeaderMap.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let optional = [
            (header::ETAG, &self.etag),
            (header::LAST_MODIFIED, &self.last_modified),
            (header::LOCATION, &self.location),
        ];
        for (name, value) in optional {
            if let Some(value) = value
                && let Ok(value) = HeaderValue::from_str(value)
            {
                headers.insert(name, value);
            }
        }

        headers
    }

    /// Returns the ETag value.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Returns the Location value.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

fn quote(etag: &str) -> String {
    format!("\"{}\"", etag)
}
