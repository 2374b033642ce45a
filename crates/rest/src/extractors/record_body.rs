//! Record body extractor.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{StatusCode, header},
};
use serde_json::Value;

use crate::error::RestError;

/// Axum extractor for a JSON request body.
///
/// Rejects non-JSON content types with 415, oversized bodies with 413 and
/// unparsable JSON with 400. Whether the document is a valid record is
/// decided later by the record's kind.
#[derive(Debug)]
pub struct RecordBody(pub Value);

fn is_json(content_type: &str) -> bool {
    let Ok(media) = content_type.parse::<mime::Mime>() else {
        return false;
    };
    media.type_() == mime::APPLICATION
        && (media.subtype() == mime::JSON || media.suffix() == Some(mime::JSON))
}

impl<S> FromRequest<S> for RecordBody
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(content_type) = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            && !is_json(content_type)
        {
            return Err(RestError::UnsupportedMediaType {
                content_type: content_type.to_string(),
            });
        }

        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                RestError::PayloadTooLarge {
                    message: e.body_text(),
                }
            } else {
                RestError::bad_request(e.body_text())
            }
        })?;

        Ok(RecordBody(serde_json::from_slice(&bytes)?))
    }
}
