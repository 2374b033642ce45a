//! Get handler: `GET [base]/[type]/[id]`

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stowage_persistence::core::RecordStorage;
use tracing::debug;

use crate::error::RestResult;
use crate::extractors::AcceptsEventStream;
use crate::middleware::conditional::ConditionalHeaders;
use crate::responses::RecordHeaders;
use crate::state::AppState;

/// Handler for get.
///
/// # Headers
///
/// - `If-None-Match` - Return 304 Not Modified if the ETag matches
/// - `Accept: text/event-stream` - Stream the record instead (see
///   [`stream`](super::stream))
///
/// # Response
///
/// - `200 OK` - the current record, or the event stream
/// - `304 Not Modified` - record unchanged
/// - `404 Not Found` - no such record or type
pub async fn read_handler<S>(
    State(state): State<AppState<S>>,
    Path((type_name, id)): Path<(String, String)>,
    AcceptsEventStream(streaming): AcceptsEventStream,
    conditional: ConditionalHeaders,
) -> RestResult<Response>
where
    S: RecordStorage + 'static,
{
    debug!(type_name = %type_name, id = %id, streaming, "Processing get request");

    if streaming {
        return super::stream::stream_record(&state, &type_name, &id).await;
    }

    let stored = state.service().get_record(&type_name, &id).await?;
    let headers = RecordHeaders::from_stored(&stored);

    if conditional.none_match(stored.etag()) {
        debug!(etag = %stored.etag(), "Returning 304 Not Modified");
        return Ok((StatusCode::NOT_MODIFIED, headers.to_header_map()).into_response());
    }

    Ok((StatusCode::OK, headers.to_header_map(), Json(stored.to_json())).into_response())
}
