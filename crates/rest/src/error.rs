//! Error types for the REST API.
//!
//! Every handler returns [`RestResult`]. Errors render as a JSON body of the
//! form `{"errors": ["<message>", "<cause>", ...]}` with the matching HTTP
//! status code.

use std::error::Error as StdError;
use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stowage_persistence::error::{
    BackendError, ConcurrencyError, ResourceError, StorageError, ValidationError,
};

/// REST API error type.
#[derive(Debug)]
pub enum RestError {
    /// No record with this ID exists (404).
    NotFound {
        /// The record type.
        type_name: String,
        /// The record ID.
        id: String,
    },

    /// The type in the path is not registered (404).
    UnknownType {
        /// The requested type name.
        type_name: String,
    },

    /// Malformed request (400).
    BadRequest {
        /// Error message.
        message: String,
    },

    /// An `If-Match` precondition does not hold (412).
    PreconditionFailed {
        /// Error message.
        message: String,
    },

    /// `If-Match` is required but absent (428).
    PreconditionRequired {
        /// Error message.
        message: String,
    },

    /// The request conflicts with one still in flight (409).
    Conflict {
        /// Error message.
        message: String,
    },

    /// Request body exceeds the configured limit (413).
    PayloadTooLarge {
        /// Error message.
        message: String,
    },

    /// Request body is not JSON (415).
    UnsupportedMediaType {
        /// The rejected content type.
        content_type: String,
    },

    /// Storage or server failure (500).
    InternalError {
        /// Error message.
        message: String,
        /// Messages of the underlying error chain.
        causes: Vec<String>,
    },
}

impl RestError {
    /// Shorthand for a [`RestError::BadRequest`].
    pub fn bad_request(message: impl Into<String>) -> Self {
        RestError::BadRequest {
            message: message.into(),
        }
    }

    /// Shorthand for a [`RestError::InternalError`] without causes.
    pub fn internal(message: impl Into<String>) -> Self {
        RestError::InternalError {
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::NotFound { .. } | RestError::UnknownType { .. } => StatusCode::NOT_FOUND,
            RestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            RestError::PreconditionRequired { .. } => StatusCode::PRECONDITION_REQUIRED,
            RestError::Conflict { .. } => StatusCode::CONFLICT,
            RestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RestError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the messages rendered in the response body.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        if let RestError::InternalError { causes, .. } = self {
            messages.extend(causes.iter().cloned());
        }
        messages
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::NotFound { type_name, id } => write!(f, "not found: {}/{}", type_name, id),
            RestError::UnknownType { type_name } => write!(f, "unknown type: {}", type_name),
            RestError::BadRequest { message } => write!(f, "{}", message),
            RestError::PreconditionFailed { message } => write!(f, "{}", message),
            RestError::PreconditionRequired { message } => write!(f, "{}", message),
            RestError::Conflict { message } => write!(f, "conflict: {}", message),
            RestError::PayloadTooLarge { message } => write!(f, "{}", message),
            RestError::UnsupportedMediaType { content_type } => {
                write!(f, "unsupported media type: {}", content_type)
            }
            RestError::InternalError { message, .. } => write!(f, "{}", message),
        }
    }
}

impl StdError for RestError {}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        let body = serde_json::json!({ "errors": self.messages() });
        (status, Json(body)).into_response()
    }
}

/// Collects the messages of an error's source chain, excluding the error itself.
fn source_chain(err: &dyn StdError) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes
}

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Resource(e) => e.into(),
            StorageError::Concurrency(e) => e.into(),
            StorageError::Validation(e) => e.into(),
            StorageError::Backend(e) => e.into(),
        }
    }
}

impl From<ResourceError> for RestError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::NotFound { type_name, id } => RestError::NotFound { type_name, id },
            ResourceError::Ambiguous { .. } => RestError::BadRequest {
                message: err.to_string(),
            },
        }
    }
}

impl From<ConcurrencyError> for RestError {
    fn from(err: ConcurrencyError) -> Self {
        RestError::PreconditionFailed {
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for RestError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnknownType { type_name } => RestError::UnknownType { type_name },
            ValidationError::InvalidRecord { .. }
            | ValidationError::InvalidListOption { .. }
            | ValidationError::InvalidPrecondition { .. } => RestError::BadRequest {
                message: err.to_string(),
            },
        }
    }
}

impl From<BackendError> for RestError {
    fn from(err: BackendError) -> Self {
        RestError::InternalError {
            message: err.to_string(),
            causes: source_chain(&err),
        }
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::BadRequest {
            message: format!("invalid JSON: {}", err),
        }
    }
}

/// Result type alias for REST operations.
pub type RestResult<T> = Result<T, RestError>;
