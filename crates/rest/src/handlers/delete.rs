//! Delete handler: `DELETE [base]/[type]/[id]`

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stowage_persistence::core::RecordStorage;
use tracing::debug;

use crate::error::RestResult;
use crate::middleware::conditional::ConditionalHeaders;
use crate::state::AppState;

/// Handler for delete.
///
/// Deletes are hard: the ID behaves as if it never existed afterwards.
///
/// # Response
///
/// - `204 No Content` - record deleted
/// - `404 Not Found` - no such record or type
/// - `412 Precondition Failed` - `If-Match` does not hold
pub async fn delete_handler<S>(
    State(state): State<AppState<S>>,
    Path((type_name, id)): Path<(String, String)>,
    conditional: ConditionalHeaders,
) -> RestResult<Response>
where
    S: RecordStorage,
{
    debug!(type_name = %type_name, id = %id, "Processing delete request");

    let precondition = conditional.precondition(state.require_if_match())?;

    state
        .service()
        .delete_record(&type_name, &id, precondition.as_ref())
        .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
