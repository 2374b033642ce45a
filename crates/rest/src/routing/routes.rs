//! Route configuration.

use axum::{Router, routing::get};
use stowage_persistence::core::RecordStorage;

use crate::handlers;
use crate::state::AppState;

/// Creates all record routes.
///
/// # Routes
///
/// - `GET /_health` - Health check
/// - `GET /{type}` - List
/// - `POST /{type}` - Create
/// - `GET /{type}/{id}` - Get
/// - `PUT /{type}/{id}` - Replace
/// - `DELETE /{type}/{id}` - Delete
pub fn create_routes<S>(state: AppState<S>) -> Router
where
    S: RecordStorage + 'static,
{
    Router::new()
        .route("/_health", get(handlers::health_handler::<S>))
        .route(
            "/{type_name}",
            get(handlers::list_handler::<S>).post(handlers::create_handler::<S>),
        )
        .route(
            "/{type_name}/{id}",
            get(handlers::read_handler::<S>)
                .put(handlers::replace_handler::<S>)
                .delete(handlers::delete_handler::<S>),
        )
        .with_state(state)
}
