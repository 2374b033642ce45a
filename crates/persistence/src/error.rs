//! Error types for the persistence layer.
//!
//! Errors are grouped by category: resource state, concurrency
//! (preconditions), validation of caller input, and backend failures.
//! [`StorageError`] wraps all of them so every storage operation can return
//! a single error type.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Record state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Precondition errors
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// Caller input errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors related to record state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested record was not found.
    #[error("not found: {type_name}/{id}")]
    NotFound { type_name: String, id: String },

    /// A short ID prefix matches more than one record.
    #[error("ambiguous ID prefix {prefix:?} for {type_name}")]
    Ambiguous { type_name: String, prefix: String },
}

/// Errors raised when an `If-Match` precondition does not hold.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    #[error("etag mismatch: expected {expected}, found {actual}")]
    EtagMismatch {
        type_name: String,
        id: String,
        expected: String,
        actual: String,
    },

    #[error("generation mismatch: expected {expected}, found {actual}")]
    GenerationMismatch {
        type_name: String,
        id: String,
        expected: u64,
        actual: u64,
    },
}

/// Errors caused by malformed caller input.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The record body is malformed (not an object, wrong field types).
    #[error("invalid {type_name}: {message}")]
    InvalidRecord { type_name: String, message: String },

    /// The type name is not registered.
    #[error("unknown type: {type_name}")]
    UnknownType { type_name: String },

    /// A list filter or sort option is malformed.
    #[error("invalid list option {option}: {message}")]
    InvalidListOption { option: String, message: String },

    /// The `If-Match` value is neither an etag nor a generation.
    #[error("invalid If-Match: {value}")]
    InvalidPrecondition { value: String },
}

/// Errors originating from the storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// No pooled connection became available in time.
    #[error("connection pool exhausted for {backend_name}: {message}")]
    PoolExhausted {
        backend_name: String,
        message: String,
    },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

impl StorageError {
    /// Shorthand for a [`ResourceError::NotFound`].
    pub fn not_found(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        StorageError::Resource(ResourceError::NotFound {
            type_name: type_name.into(),
            id: id.into(),
        })
    }

    /// Shorthand for a [`ValidationError::InvalidRecord`].
    pub fn invalid_record(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::Validation(ValidationError::InvalidRecord {
            type_name: type_name.into(),
            message: message.into(),
        })
    }

    /// Returns true if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Resource(ResourceError::NotFound { .. }))
    }

    /// Returns true if a short ID prefix matched several records.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, StorageError::Resource(ResourceError::Ambiguous { .. }))
    }

    /// Returns true if this error was caused by caller input.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            StorageError::Validation(
                ValidationError::InvalidRecord { .. }
                    | ValidationError::InvalidListOption { .. }
                    | ValidationError::InvalidPrecondition { .. }
            )
        )
    }

    /// Returns true if this is a failed `If-Match` precondition.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, StorageError::Concurrency(_))
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// Implement conversions from common error types

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
        })
    }
}
