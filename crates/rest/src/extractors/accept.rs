//! `Accept` negotiation between JSON and server-sent events.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use mime::Mime;

/// True when the client prefers `text/event-stream` over JSON.
///
/// Quality values decide; on a tie JSON wins. `*/*` and `application/*`
/// count towards JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptsEventStream(pub bool);

fn quality(media: &Mime) -> f32 {
    media
        .get_param("q")
        .and_then(|q| q.as_str().parse::<f32>().ok())
        .unwrap_or(1.0)
}

/// Decides from a raw `Accept` value.
pub fn prefers_event_stream(accept: &str) -> bool {
    let mut stream_q: f32 = 0.0;
    let mut json_q: f32 = 0.0;

    for part in accept.split(',') {
        let Ok(media) = part.trim().parse::<Mime>() else {
            continue;
        };
        let q = quality(&media);

        if media.essence_str() == mime::TEXT_EVENT_STREAM.essence_str() {
            stream_q = stream_q.max(q);
        } else if media.essence_str() == mime::APPLICATION_JSON.essence_str()
            || media.essence_str() == mime::STAR_STAR.essence_str()
            || (media.type_() == mime::APPLICATION && media.subtype() == mime::STAR)
        {
            json_q = json_q.max(q);
        }
    }

    stream_q > json_q
}

impl<S> FromRequestParts<S> for AcceptsEventStream
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let accepts = parts
            .headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(prefers_event_stream);
        Ok(AcceptsEventStream(accepts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_accept_values() {
        assert!(prefers_event_stream("text/event-stream"));
        assert!(!prefers_event_stream("application/json"));
        assert!(!prefers_event_stream("*/*"));
        assert!(!prefers_event_stream(""));
    }

    #[test]
    fn test_quality_values_decide() {
        assert!(!prefers_event_stream(
            "text/event-stream;q=0.3, text/xml;q=0.1, application/json;q=0.5"
        ));
        assert!(prefers_event_stream(
            "text/event-stream;q=0.7, text/xml;q=0.1, application/json;q=0.5"
        ));
        assert!(!prefers_event_stream("text/event-stream, application/json"));
        assert!(!prefers_event_stream("text/event-stream;q=0"));
        assert!(prefers_event_stream("text/event-stream, */*;q=0.1"));
    }

    #[tokio::test]
    async fn test_extractor_reads_accept_header() {
        let request = axum::http::Request::builder()
            .header(header::ACCEPT, "text/event-stream")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let AcceptsEventStream(accepts) =
            AcceptsEventStream::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(accepts);
    }
}
