//! Route configuration for the REST API.

pub mod routes;

pub use routes::create_routes;
