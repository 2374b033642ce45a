//! Axum extractors for record requests.
//!
//! - [`RecordBody`] - JSON request body
//! - [`ListParams`] - List filters, sort and paging
//! - [`AcceptsEventStream`] - Whether a `GET` should stream events

mod accept;
mod list_params;
mod record_body;

pub use accept::{AcceptsEventStream, prefers_event_stream};
pub use list_params::ListParams;
pub use record_body::RecordBody;
