//! Replace handler: `PUT [base]/[type]/[id]`

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
use crate::middleware::conditional::ConditionalHeaders;
use crate::responses::RecordHeaders;
use crate::state::AppState;

/// Handler for replace.
///
/// The body becomes the complete new field set: every field it omits is
/// reset to its zero value. Send the full record to keep existing values.
///
/// # Headers
///
/// - `If-Match` - `"etag:<hex>"` or `"generation:<n>"`
///
/// # Response
///
/// - `200 OK` - the replaced record
/// - `400 Bad Request` - invalid body or `If-Match`
/// - `404 Not Found` - no such record or type
/// - `412 Precondition Failed` - `If-Match` does not hold
/// - `428 Precondition Required` - `If-Match` is required and missing
///
/// # Example
///
/// ```http
/// PUT /testtype/4b8c... HTTP/1.1
/// Content-Type: application/json
/// If-Match: "generation:0"
///
/// {"text": "bar"}
/// ```
pub async fn replace_handler<S>(
    State(state): State<AppState<S>>,
    Path((type_name, id)): Path<(String, String)>,
    conditional: ConditionalHeaders,
    RecordBody(input): RecordBody,
) -> RestResult<Response>
where
    S: RecordStorage,
{
    debug!(
        type_name = %type_name,
        id = %id,
        if_match = ?conditional.if_match(),
        "Processing replace request"
    );

    let precondition = conditional.precondition(state.require_if_match())?;

    let stored = state
        .service()
        .replace_record(&type_name, &id, input, precondition.as_ref())
        .await?;

    debug!(
        type_name = %type_name,
        id = %id,
        generation = stored.generation(),
        "Record replaced"
    );

    let headers = RecordHeaders::from_stored(&stored);
    Ok((StatusCode::OK, headers.to_header_map(), Json(stored.to_json())).into_response())
}
