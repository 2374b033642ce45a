//! Storage backend implementations.
//!
//! # Available Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | (always) | Process-local map, lost on restart |
//! | SQLite | `sqlite` | Embedded database, in-memory or file-based |
//!
//! # Example
//!
//! ```no_run
//! use stowage_persistence::backends::memory::MemoryBackend;
//! # #[cfg(feature = "sqlite")]
//! use stowage_persistence::backends::sqlite::SqliteBackend;
//!
//! # #[cfg(feature = "sqlite")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let memory = MemoryBackend::new();
//!
//! let sqlite = SqliteBackend::open("./data/stowage.db")?;
//! sqlite.init_schema()?;
//! # Ok(())
//! # }
//! ```

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;
