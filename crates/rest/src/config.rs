//! Server configuration for the Stowage REST API.
//!
//! Configuration comes from command line arguments, environment variables,
//! or code.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STOWAGE_PORT` | 8080 | Server port |
//! | `STOWAGE_HOST` | 127.0.0.1 | Host to bind |
//! | `STOWAGE_LOG_LEVEL` | info | Log level |
//! | `STOWAGE_MAX_BODY_SIZE` | 1048576 | Max request body (bytes) |
//! | `STOWAGE_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `STOWAGE_ENABLE_CORS` | true | Enable CORS |
//! | `STOWAGE_CORS_ORIGINS` | * | Allowed origins |
//! | `STOWAGE_CORS_METHODS` | GET,POST,PUT,DELETE,OPTIONS | Allowed methods |
//! | `STOWAGE_CORS_HEADERS` | Content-Type,Accept,If-Match,... | Allowed headers |
//! | `STOWAGE_BASE_URL` | http://localhost:8080 | Base URL for `Location` headers |
//! | `STOWAGE_STORAGE_BACKEND` | memory | `memory` or `sqlite` |
//! | `STOWAGE_DATABASE_URL` | stowage.db | SQLite path (`:memory:` allowed) |
//! | `STOWAGE_REQUIRE_IF_MATCH` | false | Reject replace/delete without `If-Match` |
//! | `STOWAGE_DEFAULT_PAGE_SIZE` | 100 | List size when `_limit` is absent |
//! | `STOWAGE_MAX_PAGE_SIZE` | 1000 | Upper bound for `_limit` |
//! | `STOWAGE_ENABLE_IDEMPOTENCY` | true | Honor `Idempotency-Key` |
//! | `STOWAGE_STREAM_HEARTBEAT` | 5 | Seconds between event stream heartbeats |
//!
//! # Example
//!
//! ```rust
//! use stowage_rest::ServerConfig;
//!
//! let config = ServerConfig {
//!     port: 3000,
//!     host: "0.0.0.0".to_string(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::fmt;

use clap::{Parser, ValueEnum};

/// Which storage backend the server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StorageBackend {
    /// Process-local map; everything is lost on restart.
    #[default]
    Memory,
    /// SQLite database at `database_url`.
    Sqlite,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Server configuration for the REST API.
#[derive(Debug, Clone, Parser)]
#[command(name = "stowage")]
#[command(about = "Typed record store over HTTP/JSON")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "STOWAGE_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "STOWAGE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "STOWAGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Maximum request body size in bytes.
    #[arg(long, env = "STOWAGE_MAX_BODY_SIZE", default_value = "1048576")]
    pub max_body_size: usize,

    /// Request timeout in seconds.
    #[arg(long, env = "STOWAGE_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "STOWAGE_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "STOWAGE_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(
        long,
        env = "STOWAGE_CORS_METHODS",
        default_value = "GET,POST,PUT,DELETE,OPTIONS"
    )]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "STOWAGE_CORS_HEADERS",
        default_value = "Content-Type,Authorization,Accept,If-Match,If-None-Match,Idempotency-Key"
    )]
    pub cors_headers: String,

    /// Base URL for the server (used in Location headers).
    #[arg(long, env = "STOWAGE_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Storage backend.
    #[arg(long, env = "STOWAGE_STORAGE_BACKEND", value_enum, default_value_t = StorageBackend::Memory)]
    pub storage_backend: StorageBackend,

    /// Database path for the sqlite backend.
    #[arg(long, env = "STOWAGE_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Reject replace and delete requests that carry no If-Match header.
    #[arg(long, env = "STOWAGE_REQUIRE_IF_MATCH", default_value = "false")]
    pub require_if_match: bool,

    /// Number of records a list returns when `_limit` is absent.
    #[arg(long, env = "STOWAGE_DEFAULT_PAGE_SIZE", default_value = "100")]
    pub default_page_size: usize,

    /// Upper bound applied to `_limit`.
    #[arg(long, env = "STOWAGE_MAX_PAGE_SIZE", default_value = "1000")]
    pub max_page_size: usize,

    /// Honor the Idempotency-Key request header.
    #[arg(long, env = "STOWAGE_ENABLE_IDEMPOTENCY", default_value = "true")]
    pub enable_idempotency: bool,

    /// Seconds between heartbeat events on record and list streams.
    #[arg(long, env = "STOWAGE_STREAM_HEARTBEAT", default_value = "5")]
    pub stream_heartbeat: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            max_body_size: 1024 * 1024, // 1MB
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,PUT,DELETE,OPTIONS".to_string(),
            cors_headers: "Content-Type,Authorization,Accept,If-Match,If-None-Match,Idempotency-Key"
                .to_string(),
            base_url: "http://localhost:8080".to_string(),
            storage_backend: StorageBackend::Memory,
            database_url: None,
            require_if_match: false,
            default_page_size: 100,
            max_page_size: 1000,
            enable_idempotency: true,
            stream_heartbeat: 5,
        }
    }
}

impl ServerConfig {
    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the SQLite database path.
    pub fn database_path(&self) -> &str {
        self.database_url.as_deref().unwrap_or("stowage.db")
    }

    /// Clamps a requested list size to the configured bounds.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if self.stream_heartbeat == 0 {
            errors.push("Stream heartbeat cannot be 0".to_string());
        }

        if url::Url::parse(&self.base_url).is_err() {
            errors.push(format!("Base URL is not a valid URL: {}", self.base_url));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// This uses ephemeral port 0 and disables CORS.
    pub fn for_testing() -> Self {
        Self {
            port: 0, // Let OS assign port
            log_level: "debug".to_string(),
            request_timeout: 5, // Shorter timeout for tests
            enable_cors: false,
            base_url: "http://localhost:0".to_string(),
            default_page_size: 10,
            max_page_size: 100,
            ..Default::default()
        }
    }
}
