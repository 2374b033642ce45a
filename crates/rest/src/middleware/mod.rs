//! HTTP middleware for the REST API.
//!
//! - [`conditional`] - Conditional request headers (If-Match, If-None-Match)
//! - [`idempotency`] - Idempotency-Key replay

pub mod conditional;
pub mod idempotency;

pub use conditional::ConditionalHeaders;
pub use idempotency::{IdempotencyStore, idempotency_middleware};
