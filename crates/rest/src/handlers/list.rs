//! List handler: `GET [base]/[type]`

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stowage_persistence::core::RecordStorage;
use tracing::debug;

use crate::error::RestResult;
use crate::extractors::{AcceptsEventStream, ListParams};
use crate::middleware::conditional::ConditionalHeaders;
use crate::responses::{ListBody, RecordHeaders};
use crate::state::AppState;

/// Handler for list.
///
/// # Query Parameters
///
/// - `field=value`, `field[op]=value` - filters (`eq`, `gt`, `gte`, `lt`,
///   `lte`, `hp`, `in`)
/// - `_sort=a,-b` - sort keys, `-` for descending
/// - `_limit`, `_offset` - window; `_limit` defaults to and is capped by the
///   configured page sizes
///
/// With `Accept: text/event-stream` the list is streamed as `list` events
/// each time it changes (see [`stream`](super::stream)).
///
/// # Response
///
/// - `200 OK` - JSON array of records, with a list `ETag`
/// - `304 Not Modified` - list unchanged
/// - `400 Bad Request` - unknown field, bad value or bad operator
pub async fn list_handler<S>(
    State(state): State<AppState<S>>,
    Path(type_name): Path<String>,
    AcceptsEventStream(streaming): AcceptsEventStream,
    conditional: ConditionalHeaders,
    ListParams(mut query): ListParams,
) -> RestResult<Response>
where
    S: RecordStorage + 'static,
{
    query.limit = Some(state.config().page_size(query.limit));

    debug!(
        type_name = %type_name,
        filters = query.filters.len(),
        limit = ?query.limit,
        offset = ?query.offset,
        streaming,
        "Processing list request"
    );

    if streaming {
        return super::stream::stream_list(&state, &type_name, &query).await;
    }

    let records = state.service().list_records(&type_name, &query).await?;
    let list = ListBody::render(&records)?;
    let headers = RecordHeaders::new().with_etag(&list.etag).to_header_map();

    if conditional.none_match(&list.etag) {
        return Ok((StatusCode::NOT_MODIFIED, headers).into_response());
    }

    Ok((StatusCode::OK, headers, list.body).into_response())
}
