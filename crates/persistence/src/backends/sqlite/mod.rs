//! SQLite backend implementation.
//!
//! Supports in-memory databases (for tests and throwaway servers) and
//! file-based databases.
//!
//! # Example
//!
//! ```no_run
//! use stowage_persistence::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/stowage.db")?;
//! backend.init_schema()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE records (
//!     type_name TEXT NOT NULL,
//!     id TEXT NOT NULL,
//!     generation INTEGER NOT NULL DEFAULT 0,
//!     data TEXT NOT NULL,       -- data fields as JSON
//!     created_at TEXT NOT NULL,
//!     last_modified TEXT NOT NULL,
//!     PRIMARY KEY (type_name, id)
//! );
//! ```
//!
//! Replace and delete run in an immediate transaction: the precondition check
//! and the write see the same row.

mod backend;
mod schema;
mod storage;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use schema::SCHEMA_VERSION;
