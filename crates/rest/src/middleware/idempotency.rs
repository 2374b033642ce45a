//! `Idempotency-Key` handling.
//!
//! A mutating request carrying `Idempotency-Key: "<key>"` runs once. Its
//! response is saved under the key and replayed for every later request with
//! the same key, provided the method, URI, critical headers and body hash
//! match the first request. A repeat that arrives while the first request is
//! still running is rejected with 409.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::RestError;

/// The request header carrying the key.
pub const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("idempotency-key");

/// Request headers that must match between the first request and a replay.
const CRITICAL_HEADERS: [HeaderName; 2] = [header::ACCEPT, header::AUTHORIZATION];

/// Reasons an idempotent request is refused.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// The key is not a quoted string.
    #[error("invalid Idempotency-Key: {0}")]
    InvalidKey(String),

    /// The method differs from the first request.
    #[error("idempotency mismatch: HTTP method {0}")]
    MethodMismatch(Method),

    /// The URI differs from the first request.
    #[error("idempotency mismatch: URL {0}")]
    UrlMismatch(String),

    /// A critical header differs from the first request.
    #[error("idempotency mismatch: header {0}")]
    HeaderMismatch(HeaderName),

    /// The body hash differs from the first request.
    #[error("idempotency mismatch: request body {actual} vs {saved}")]
    BodyMismatch {
        /// Hash of the current body.
        actual: String,
        /// Hash of the first body.
        saved: String,
    },

    /// A request with this key is still running.
    #[error("request with Idempotency-Key {0} is in progress")]
    InProgress(String),

    /// The request body is larger than the configured limit.
    #[error("request body exceeds {0} bytes")]
    TooLarge(usize),

    /// The request body could not be buffered.
    #[error("failed to read request body: {0}")]
    Body(String),
}

impl From<IdempotencyError> for RestError {
    fn from(err: IdempotencyError) -> Self {
        match err {
            IdempotencyError::InProgress(_) => RestError::Conflict {
                message: err.to_string(),
            },
            IdempotencyError::TooLarge(_) => RestError::PayloadTooLarge {
                message: err.to_string(),
            },
            _ => RestError::BadRequest {
                message: err.to_string(),
            },
        }
    }
}

/// A response saved under an idempotency key.
#[derive(Debug, Clone)]
struct SavedResponse {
    method: Method,
    uri: String,
    critical_headers: Vec<Option<HeaderValue>>,
    body_sha256: String,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl SavedResponse {
    fn verify(
        &self,
        method: &Method,
        uri: &str,
        headers: &HeaderMap,
        body_sha256: &str,
    ) -> Result<(), IdempotencyError> {
        if *method != self.method {
            return Err(IdempotencyError::MethodMismatch(method.clone()));
        }

        if uri != self.uri {
            return Err(IdempotencyError::UrlMismatch(uri.to_string()));
        }

        for (name, saved) in CRITICAL_HEADERS.iter().zip(&self.critical_headers) {
            if headers.get(name) != saved.as_ref() {
                return Err(IdempotencyError::HeaderMismatch(name.clone()));
            }
        }

        if body_sha256 != self.body_sha256 {
            return Err(IdempotencyError::BodyMismatch {
                actual: body_sha256.to_string(),
                saved: self.body_sha256.clone(),
            });
        }

        Ok(())
    }

    fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

/// Saved responses and keys currently being executed.
///
/// Saved responses are never evicted; they live as long as the process.
#[derive(Debug)]
pub struct IdempotencyStore {
    saved: Mutex<HashMap<String, SavedResponse>>,
    in_progress: Mutex<HashSet<String>>,
    body_limit: usize,
}

/// Marks a key as in progress until dropped.
struct KeyGuard<'a> {
    store: &'a IdempotencyStore,
    key: String,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.store.in_progress.lock().remove(&self.key);
    }
}

impl IdempotencyStore {
    /// Creates an empty store that buffers bodies up to `body_limit` bytes.
    pub fn new(body_limit: usize) -> Self {
        Self {
            saved: Mutex::new(HashMap::new()),
            in_progress: Mutex::new(HashSet::new()),
            body_limit,
        }
    }

    /// Number of saved responses.
    pub fn len(&self) -> usize {
        self.saved.lock().len()
    }

    /// Returns true if no responses are saved.
    pub fn is_empty(&self) -> bool {
        self.saved.lock().is_empty()
    }

    fn lock_key(&self, key: &str) -> Result<KeyGuard<'_>, IdempotencyError> {
        let mut in_progress = self.in_progress.lock();
        if !in_progress.insert(key.to_string()) {
            return Err(IdempotencyError::InProgress(key.to_string()));
        }
        Ok(KeyGuard {
            store: self,
            key: key.to_string(),
        })
    }

    /// Runs `request` under `key`, or replays the response saved for it.
    async fn execute(
        &self,
        key: &str,
        request: Request,
        next: Next,
    ) -> Result<Response, IdempotencyError> {
        let _guard = self.lock_key(key)?;

        let (parts, body) = request.into_parts();
        if declared_length(&parts.headers).is_some_and(|len| len > self.body_limit) {
            return Err(IdempotencyError::TooLarge(self.body_limit));
        }
        let body = to_bytes(body, self.body_limit)
            .await
            .map_err(|e| body_error(e, self.body_limit))?;
        let body_sha256 = hex::encode(Sha256::digest(&body));
        let uri = parts.uri.to_string();

        let saved = self.saved.lock().get(key).cloned();
        if let Some(saved) = saved {
            saved.verify(&parts.method, &uri, &parts.headers, &body_sha256)?;
            debug!(key = %key, status = %saved.status, "Replaying saved response");
            return Ok(saved.to_response());
        }

        let method = parts.method.clone();
        let critical_headers = CRITICAL_HEADERS
            .iter()
            .map(|name| parts.headers.get(name).cloned())
            .collect();

        let response = next.run(Request::from_parts(parts, Body::from(body))).await;

        let (parts, body) = response.into_parts();
        let body = match to_bytes(body, usize::MAX).await {
            Ok(body) => body,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to buffer response; not saving");
                return Ok(RestError::internal("failed to buffer response body").into_response());
            }
        };

        let saved = SavedResponse {
            method,
            uri,
            critical_headers,
            body_sha256,
            status: parts.status,
            headers: parts.headers.clone(),
            body: body.clone(),
        };
        self.saved.lock().insert(key.to_string(), saved);
        debug!(key = %key, status = %parts.status, "Saved idempotent response");

        Ok(Response::from_parts(parts, Body::from(body)))
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn body_error(err: axum::Error, limit: usize) -> IdempotencyError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
    while let Some(cause) = source {
        if cause.to_string().contains("length limit exceeded") {
            return IdempotencyError::TooLarge(limit);
        }
        source = cause.source();
    }
    IdempotencyError::Body(err.to_string())
}

/// Extracts the key from a quoted header value.
pub fn parse_key(value: &HeaderValue) -> Result<String, IdempotencyError> {
    let raw = value.to_str().unwrap_or_default();
    raw.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|key| !key.is_empty())
        .map(String::from)
        .ok_or_else(|| IdempotencyError::InvalidKey(raw.to_string()))
}

/// Axum middleware applying [`IdempotencyStore`] to mutating requests.
pub async fn idempotency_middleware(
    State(store): State<Arc<IdempotencyStore>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method().is_safe() {
        return next.run(request).await;
    }

    let Some(value) = request.headers().get(&IDEMPOTENCY_KEY) else {
        return next.run(request).await;
    };

    let result = match parse_key(value) {
        Ok(key) => store.execute(&key, request, next).await,
        Err(e) => Err(e),
    };

    result.unwrap_or_else(|e| RestError::from(e).into_response())
}
