//! Create handler: `POST [base]/[type]`

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stowage_persistence::core::RecordStorage;
use tracing::debug;

use crate::error::RestResult;
use crate::extractors::RecordBody;
use crate::responses::RecordHeaders;
use crate::state::AppState;

/// Handler for create.
///
/// The server assigns the ID. Fields missing from the body get their zero
/// values; `id`, `etag` and `generation` in the body are ignored.
///
/// # Response
///
/// - `201 Created` - record created, with `Location` and `ETag`
/// - `400 Bad Request` - body is not a valid record
/// - `404 Not Found` - unknown type
///
/// # Example
///
/// ```http
/// POST /testtype HTTP/1.1
/// Content-Type: application/json
///
/// {"text": "foo", "num": 5}
/// ```
pub async fn create_handler<S>(
    State(state): State<AppState<S>>,
    Path(type_name): Path<String>,
    RecordBody(input): RecordBody,
) -> RestResult<Response>
where
    S: RecordStorage,
{
    debug!(type_name = %type_name, "Processing create request");

    let stored = state.service().create_record(&type_name, input).await?;

    let location = format!("{}/{}", state.base_url(), stored.url());
    let headers = RecordHeaders::from_stored(&stored).with_location(location);

    Ok((
        StatusCode::CREATED,
        headers.to_header_map(),
        Json(stored.to_json()),
    )
        .into_response())
}
