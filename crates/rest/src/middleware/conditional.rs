//! Conditional request header handling.
//!
//! - `If-Match`: precondition for replace and delete
//! - `If-None-Match`: conditional get and list (304 Not Modified)

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use stowage_persistence::core::{Precondition, normalize_etag};

use crate::error::{RestError, RestResult};

/// Extracted conditional headers from a request.
#[derive(Debug, Default)]
pub struct ConditionalHeaders {
    if_match: Option<String>,
    if_none_match: Option<String>,
}

impl ConditionalHeaders {
    /// Creates a new ConditionalHeaders from a HeaderMap.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        Self {
            if_match: get(header::IF_MATCH),
            if_none_match: get(header::IF_NONE_MATCH),
        }
    }

    /// Returns the raw If-Match header value.
    pub fn if_match(&self) -> Option<&str> {
        self.if_match.as_deref()
    }

    /// Returns the raw If-None-Match header value.
    pub fn if_none_match(&self) -> Option<&str> {
        self.if_none_match.as_deref()
    }

    /// Parses If-Match into a precondition.
    ///
    /// With `required` set, a missing header is a 428.
    pub fn precondition(&self, required: bool) -> RestResult<Option<Precondition>> {
        match self.if_match() {
            Some(value) => Ok(Some(Precondition::parse(value)?)),
            None if required => Err(RestError::PreconditionRequired {
                message: "If-Match header is required".to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Returns true if If-None-Match names `etag` (or is `*`).
    ///
    /// The header may list several comma-separated values.
    pub fn none_match(&self, etag: &str) -> bool {
        self.if_none_match().is_some_and(|header| {
            header
                .split(',')
                .map(str::trim)
                .any(|candidate| candidate == "*" || normalize_etag(candidate) == etag)
        })
    }
}

impl<S> FromRequestParts<S> for ConditionalHeaders
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ConditionalHeaders::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers(name: header::HeaderName, value: &'static str) -> ConditionalHeaders {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_static(value));
        ConditionalHeaders::from_headers(&map)
    }

    #[test]
    fn test_precondition_generation() {
        let conditional = headers(header::IF_MATCH, "\"generation:3\"");
        assert_eq!(
            conditional.precondition(false).unwrap(),
            Some(Precondition::Generation(3))
        );
    }

    #[test]
    fn test_precondition_invalid() {
        let conditional = headers(header::IF_MATCH, "W/\"1\"");
        let err = conditional.precondition(false).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_precondition_required() {
        let conditional = ConditionalHeaders::default();
        assert!(conditional.precondition(false).unwrap().is_none());

        let err = conditional.precondition(true).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::PRECONDITION_REQUIRED);
    }

    #[test]
    fn test_none_match() {
        let conditional = headers(header::IF_NONE_MATCH, "\"etag:aa\", \"etag:bb\"");
        assert!(conditional.none_match("etag:bb"));
        assert!(!conditional.none_match("etag:cc"));

        let star = headers(header::IF_NONE_MATCH, "*");
        assert!(star.none_match("etag:anything"));

        assert!(!ConditionalHeaders::default().none_match("etag:aa"));
    }
}
