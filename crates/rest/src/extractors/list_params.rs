//! List query extractor.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use stowage_persistence::types::ListQuery;

use crate::error::RestError;

/// Axum extractor for list query parameters.
///
/// Parses `_limit`, `_offset`, `_sort` and `field[op]=value` filters. Field
/// names and values are checked later against the record's kind.
///
/// # Example
///
/// ```rust,ignore
/// use stowage_rest::extractors::ListParams;
///
/// async fn list_handler(ListParams(query): ListParams) {
///     let offset = query.offset.unwrap_or(0);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ListParams(pub ListQuery);

impl<S> FromRequestParts<S> for ListParams
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|e| RestError::bad_request(e.body_text()))?;

        Ok(ListParams(ListQuery::from_pairs(pairs)?))
    }
}
