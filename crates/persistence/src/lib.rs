//! Stowage Persistence Layer
//!
//! This crate stores typed records addressed by type name and ID. Its one
//! non-obvious rule is **full replace**: replacing a record with a document
//! that carries only some fields resets every other field to its zero value.
//! There is no merge or patch operation; callers that want merge semantics
//! read the record first and send the complete field set.
//!
//! # Features
//!
//! - **Typed records**: any serde struct implementing [`Record`](types::Record)
//! - **Metadata**: server-assigned ID, generation counter and content etag
//! - **Preconditions**: `If-Match` by etag or generation on replace and delete
//! - **Listing**: filters, multi-key sort, limit and offset
//! - **Short IDs**: find a record by a unique ID prefix
//! - **Change feed**: subscribe to committed creates, replaces and deletes
//! - **Backends**: in-memory map, and SQLite behind the `sqlite` feature
//!
//! # Architecture
//!
//! - [`types`] - Stored records, record types, list options
//! - [`error`] - Error types for all operations
//! - [`core`] - The storage trait and preconditions
//! - [`registry`] - Type name to record kind mapping and input normalization
//! - [`service`] - The record store used by callers
//! - [`watch`] - Following records and list results as they change
//! - [`backends`] - Backend implementations
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use stowage_persistence::backends::memory::MemoryBackend;
//! use stowage_persistence::service::RecordService;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let service = RecordService::new(Arc::new(MemoryBackend::new()));
//!
//! let created = service
//!     .create_record("testtype", json!({"text": "foo", "num": 5}))
//!     .await?;
//! assert_eq!(created.generation(), 0);
//!
//! let replaced = service
//!     .replace_record("testtype", created.id(), json!({"text": "bar"}), None)
//!     .await?;
//! assert_eq!(replaced.content(), &json!({"text": "bar", "num": 0}));
//! assert_eq!(replaced.generation(), 1);
//! # Ok::<(), stowage_persistence::StorageError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod registry;
pub mod service;
pub mod types;
pub mod watch;

// Re-export commonly used types at crate root
pub use error::{StorageError, StorageResult};
pub use registry::{RecordKind, RecordRegistry};
pub use service::{RecordService, Stored};
pub use types::{ListOptions, ListQuery, Record, StoredRecord};
pub use watch::{ListWatch, RecordUpdate, RecordWatch};

// Re-export core traits
pub use core::{ChangeFeed, Precondition, RecordEvent, RecordStorage};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
