//! Server-sent event streams.
//!
//! A `GET` whose `Accept` header prefers `text/event-stream` is answered with
//! a stream instead of a single JSON document.
//!
//! Record streams send:
//!
//! | Event | Data |
//! |-------|------|
//! | `initial` | the record when the stream opens |
//! | `update` | the record after each replace |
//! | `delete` | `{}`, then the stream ends |
//! | `heartbeat` | `{}`, every `stream_heartbeat` seconds |
//!
//! List streams send a `list` event carrying the JSON array whenever the
//! result of the list query changes, plus the same heartbeats.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt, stream};
use serde_json::Value;
use stowage_persistence::core::RecordStorage;
use stowage_persistence::types::{ListQuery, StoredRecord};
use stowage_persistence::watch::RecordUpdate;
use tracing::{debug, warn};

use crate::error::RestResult;
use crate::state::AppState;

fn json_event(name: &str, data: &Value) -> Event {
    Event::default().event(name).data(data.to_string())
}

fn empty_event(name: &str) -> Event {
    Event::default().event(name).data("{}")
}

fn record_event(name: &str, record: &StoredRecord) -> Event {
    json_event(name, &record.to_json())
}

fn list_event(records: &[StoredRecord]) -> Event {
    let list = Value::Array(records.iter().map(StoredRecord::to_json).collect());
    json_event("list", &list)
}

fn error_event(message: String) -> Event {
    json_event("error", &serde_json::json!({ "errors": [message] }))
}

fn into_sse<E>(events: E, heartbeat: u64) -> Response
where
    E: Stream<Item = Event> + Send + 'static,
{
    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(heartbeat))
        .event(empty_event("heartbeat"));

    Sse::new(events.map(Ok::<Event, Infallible>))
        .keep_alive(keep_alive)
        .into_response()
}

/// Streams one record: its current state, then every update until deleted.
///
/// Fails before streaming with 404 when the record or type doesn't exist.
pub async fn stream_record<S>(state: &AppState<S>, type_name: &str, id: &str) -> RestResult<Response>
where
    S: RecordStorage + 'static,
{
    let watch = state.service().watch_record(type_name, id).await?;
    debug!(type_name = %type_name, id = %id, "Opening record stream");

    let events = stream::unfold(Some(watch), |watch| async move {
        let mut watch = watch?;
        match watch.next().await {
            Ok(Some(RecordUpdate::Initial(record))) => {
                Some((record_event("initial", &record), Some(watch)))
            }
            Ok(Some(RecordUpdate::Updated(record))) => {
                Some((record_event("update", &record), Some(watch)))
            }
            Ok(Some(RecordUpdate::Deleted)) => Some((empty_event("delete"), None)),
            Ok(None) => None,
            Err(e) => {
                warn!(id = %watch.id(), error = %e, "Record stream failed");
                Some((error_event(e.to_string()), None))
            }
        }
    });

    Ok(into_sse(events, state.config().stream_heartbeat))
}

/// Streams the result of a list query each time it changes.
///
/// Fails before streaming with 404 for an unknown type and 400 for invalid
/// list options.
pub async fn stream_list<S>(
    state: &AppState<S>,
    type_name: &str,
    query: &ListQuery,
) -> RestResult<Response>
where
    S: RecordStorage + 'static,
{
    let watch = state.service().watch_list(type_name, query).await?;
    debug!(type_name = %type_name, limit = ?watch.options().limit, "Opening list stream");

    let events = stream::unfold(Some(watch), |watch| async move {
        let mut watch = watch?;
        match watch.next().await {
            Ok(Some(records)) => Some((list_event(&records), Some(watch))),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "List stream failed");
                Some((error_event(e.to_string()), None))
            }
        }
    });

    Ok(into_sse(events, state.config().stream_heartbeat))
}

