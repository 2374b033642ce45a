//! Application state for the REST API.
//!
//! Every handler receives an [`AppState`] holding the record service, the
//! server configuration and the idempotency key store.

use std::sync::Arc;

use stowage_persistence::core::RecordStorage;
use stowage_persistence::service::RecordService;

use crate::config::ServerConfig;
use crate::middleware::idempotency::IdempotencyStore;

/// Shared application state for the REST API.
///
/// # Type Parameters
///
/// * `S` - The storage backend type (must implement [`RecordStorage`])
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use stowage_persistence::backends::memory::MemoryBackend;
/// use stowage_rest::{AppState, ServerConfig};
///
/// let state = AppState::new(Arc::new(MemoryBackend::new()), ServerConfig::default());
/// assert_eq!(state.base_url(), "http://localhost:8080");
/// ```
pub struct AppState<S> {
    service: RecordService<S>,
    config: Arc<ServerConfig>,
    idempotency: Arc<IdempotencyStore>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            config: Arc::clone(&self.config),
            idempotency: Arc::clone(&self.idempotency),
        }
    }
}

impl<S: RecordStorage> AppState<S> {
    /// Creates state over `storage` with the built-in record types.
    pub fn new(storage: Arc<S>, config: ServerConfig) -> Self {
        Self::with_service(RecordService::new(storage), config)
    }

    /// Creates state around an existing service (custom registries).
    pub fn with_service(service: RecordService<S>, config: ServerConfig) -> Self {
        let idempotency = Arc::new(IdempotencyStore::new(config.max_body_size));
        Self {
            service,
            config: Arc::new(config),
            idempotency,
        }
    }

    /// Returns the record service.
    pub fn service(&self) -> &RecordService<S> {
        &self.service
    }

    /// Returns the storage backend.
    pub fn storage(&self) -> &S {
        self.service.storage()
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the idempotency key store.
    pub fn idempotency(&self) -> &Arc<IdempotencyStore> {
        &self.idempotency
    }

    /// Returns the base URL used in `Location` headers.
    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Returns whether replace and delete require `If-Match`.
    pub fn require_if_match(&self) -> bool {
        self.config.require_if_match
    }
}
