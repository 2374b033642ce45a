//! # stowage-rest - HTTP/JSON API for the Stowage record store
//!
//! This crate exposes a [`RecordService`](stowage_persistence::RecordService)
//! over HTTP with axum. Records are addressed by type name and ID; replace is
//! a full replace, so fields left out of a `PUT` body are reset to their zero
//! values.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stowage_persistence::backends::memory::MemoryBackend;
//! use stowage_rest::{ServerConfig, create_app_with_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default();
//!     let app = create_app_with_config(MemoryBackend::new(), config.clone());
//!
//!     let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Interaction | HTTP Method | URL Pattern | Success |
//! |------------|-------------|-------------|---------|
//! | create | POST | `/[type]` | 201 |
//! | get | GET | `/[type]/[id]` | 200 / 304 |
//! | replace | PUT | `/[type]/[id]` | 200 |
//! | delete | DELETE | `/[type]/[id]` | 204 |
//! | list | GET | `/[type]?params` | 200 / 304 |
//! | health | GET | `/_health` | 200 |
//!
//! ## Event Streams
//!
//! A get or list whose `Accept` header prefers `text/event-stream` over JSON
//! is answered with server-sent events instead: `initial`, `update` and
//! `delete` for a record, `list` for a list, and a `heartbeat` every
//! `stream_heartbeat` seconds. See [`handlers::stream`].
//!
//! ## HTTP Headers
//!
//! - `ETag` - `"etag:<sha256 hex>"` of the record's data fields
//! - `If-Match` - `"etag:<hex>"` or `"generation:<n>"` on replace and delete
//! - `If-None-Match` - conditional get and list
//! - `Idempotency-Key` - `"<key>"`; the first response is replayed for repeats
//! - `Accept` - `text/event-stream` opens an event stream on get and list
//!
//! ## Error Handling
//!
//! Errors are returned as `{"errors": ["<message>", ...]}`:
//!
//! | HTTP Status | Cause |
//! |-------------|-------|
//! | 400 | Invalid body, list option, `If-Match` or idempotency mismatch |
//! | 404 | Unknown record or type |
//! | 409 | Idempotency key in progress |
//! | 412 | `If-Match` does not hold |
//! | 413 | Body too large |
//! | 415 | Body is not JSON |
//! | 428 | `If-Match` required but missing |
//! | 500 | Storage failure |
//!
//! ## Architecture
//!
//! - [`error`] - Error types and JSON error bodies
//! - [`config`] - Server configuration
//! - [`state`] - Application state (service, configuration)
//! - [`handlers`] - HTTP request handlers for each interaction
//! - [`middleware`] - Conditional headers and idempotency keys
//! - [`extractors`] - Request body, list query and `Accept` extractors
//! - [`responses`] - Response headers and list bodies
//! - [`routing`] - Route configuration

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod routing;
pub mod state;

pub use config::{ServerConfig, StorageBackend};
pub use error::{RestError, RestResult};
pub use state::AppState;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use stowage_persistence::core::RecordStorage;
use stowage_persistence::service::RecordService;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates the Axum application with default configuration.
///
/// For more control, use [`create_app_with_config`].
pub fn create_app<S>(storage: S) -> Router
where
    S: RecordStorage + 'static,
{
    create_app_with_config(storage, ServerConfig::default())
}

/// Creates the Axum application with custom configuration.
///
/// # Example
///
/// ```rust
/// use stowage_persistence::backends::memory::MemoryBackend;
/// use stowage_rest::{ServerConfig, create_app_with_config};
///
/// let config = ServerConfig {
///     require_if_match: true,
///     ..Default::default()
/// };
/// let app = create_app_with_config(MemoryBackend::new(), config);
/// ```
pub fn create_app_with_config<S>(storage: S, config: ServerConfig) -> Router
where
    S: RecordStorage + 'static,
{
    create_app_with_service(RecordService::new(Arc::new(storage)), config)
}

/// Creates the Axum application around an existing service.
///
/// Use this to serve record types registered in a custom registry.
pub fn create_app_with_service<S>(service: RecordService<S>, config: ServerConfig) -> Router
where
    S: RecordStorage + 'static,
{
    info!(
        backend = service.storage().backend_name(),
        types = ?service.registry().type_names(),
        "Creating REST API server"
    );

    let state = AppState::with_service(service, config.clone());
    let idempotency = Arc::clone(state.idempotency());

    let router = routing::create_routes(state);

    let router = if config.enable_idempotency {
        router.layer(axum::middleware::from_fn_with_state(
            idempotency,
            middleware::idempotency_middleware,
        ))
    } else {
        router
    };

    let router = router.layer(DefaultBodyLimit::max(config.max_body_size));

    let router = if config.enable_cors {
        router.layer(build_cors_layer(&config))
    } else {
        router
    };

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::with_status_code(
                axum::http::StatusCode::REQUEST_TIMEOUT,
                std::time::Duration::from_secs(config.request_timeout),
            )),
    )
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors.expose_headers([
        axum::http::header::ETAG,
        axum::http::header::LOCATION,
    ])
}

/// Initializes the tracing subscriber for logging.
///
/// Call once at startup. `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "stowage_rest={level},stowage_persistence={level},stowage={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
