//! SQLite backend implementation.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{ChangeFeed, RecordEvent};
use crate::error::{BackendError, StorageError, StorageResult};

use super::schema;

/// SQLite backend for record storage.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
    changes: ChangeFeed,
    // Held from commit to publish so events leave in commit order.
    publish_lock: Mutex<()>,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    ///
    /// Ignored for in-memory databases, which always use one connection so
    /// every caller sees the same database.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for better concurrency.
    #[serde(default = "default_true")]
    pub enable_wal: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    ///
    /// Pass `":memory:"` as the path for a private in-memory database.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> StorageResult<Self> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms as u64);
        let enable_wal = config.enable_wal && !is_memory;

        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path.as_ref())
        }
        .with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if enable_wal {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            }
            Ok(())
        });

        let max_size = if is_memory { 1 } else { config.max_connections };

        // Recycling the only connection of an in-memory database would drop its data.
        let (max_lifetime, idle_timeout) = if is_memory {
            (None, None)
        } else {
            (Some(Duration::from_secs(30 * 60)), Some(Duration::from_secs(10 * 60)))
        };

        let pool = Pool::builder()
            .max_size(max_size)
            .max_lifetime(max_lifetime)
            .idle_timeout(idle_timeout)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| {
                StorageError::Backend(BackendError::ConnectionFailed {
                    backend_name: "sqlite".to_string(),
                    message: e.to_string(),
                })
            })?;

        info!(
            path = %path.as_ref().display(),
            max_connections = max_size,
            "Opened SQLite database"
        );

        Ok(Self {
            pool,
            config,
            is_memory,
            changes: ChangeFeed::default(),
            publish_lock: Mutex::new(()),
        })
    }

    /// Initialize the database schema.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(
        &self,
    ) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Commits a write transaction and publishes its event.
    pub(crate) fn commit_and_publish(
        &self,
        tx: Transaction<'_>,
        event: RecordEvent,
    ) -> StorageResult<()> {
        let _order = self.publish_lock.lock();
        tx.commit().map_err(|e| {
            StorageError::Backend(BackendError::Internal {
                backend_name: "sqlite".to_string(),
                message: format!("Failed to commit transaction: {}", e),
                source: Some(Box::new(e)),
            })
        })?;
        self.changes.publish(event);
        Ok(())
    }

    /// Returns the backend's change feed.
    pub(crate) fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_uses_single_connection() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert!(backend.is_memory());
        assert!(backend.get_connection().is_ok());
    }

    #[test]
    fn test_pool_timeout_is_pool_exhausted() {
        let config = SqliteBackendConfig {
            connection_timeout_ms: 50,
            ..Default::default()
        };
        let backend = SqliteBackend::with_config(":memory:", config).unwrap();

        let _held = backend.get_connection().unwrap();
        let err = backend.get_connection().unwrap_err();

        assert!(matches!(
            err,
            StorageError::Backend(BackendError::PoolExhausted { .. })
        ));
        assert!(err.to_string().starts_with("connection pool exhausted for sqlite"));
    }
}
