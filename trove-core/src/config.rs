//! Centralized configuration for Trove.
//!
//! Built once at startup (defaults, then environment, then CLI flags) and
//! shared read-only afterwards.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::filter::DEFAULT_LIMIT;
use crate::source::catalog::DEFAULT_LIST_LIMIT;
use crate::source_kind::SourceKind;

/// Central configuration for all Trove components.
#[derive(Debug, Clone, Default)]
pub struct TroveConfig {
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub query: QueryConfig,
    pub streaming: StreamingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind, 0 for an ephemeral port
    pub port: u16,
    /// Add CORS headers to every response
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 41596,
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    /// Socket address to bind.
    ///
    /// # Errors
    /// - `TroveError::Configuration` - Host is not an IP address
    pub fn bind_addr(&self) -> crate::Result<SocketAddr> {
        let host = match self.host.as_str() {
            "localhost" => "127.0.0.1",
            other => other,
        };
        format!("{host}:{}", self.port)
            .parse::<SocketAddr>()
            .or_else(|_| format!("[{host}]:{}", self.port).parse::<SocketAddr>())
            .map_err(|_| crate::TroveError::Configuration {
                reason: format!("invalid bind address {}:{}", self.host, self.port),
            })
    }
}

/// Where library items come from.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Which source implementation to use
    pub source: SourceKind,
    /// Library root directory. Required for the directory source, optional
    /// for the catalog source (fetched from the catalog when absent).
    pub path: Option<PathBuf>,
    /// Base URL of the remote catalog
    pub catalog_url: Option<String>,
    /// Access token sent to the remote catalog
    pub catalog_token: Option<String>,
    /// Maximum items requested per catalog listing
    pub catalog_list_limit: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Directory,
            path: None,
            catalog_url: None,
            catalog_token: None,
            catalog_list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Query defaults.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Page size when a request gives no valid `limit`
    pub default_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
        }
    }
}

/// Payload streaming settings.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Read buffer size for payload streams
    pub chunk_size: usize,
    /// `Cache-Control` value sent with payloads
    pub cache_control: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024, // 64 KiB
            cache_control: "public, max-age=3600".to_string(),
        }
    }
}

impl TroveConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparsable values are ignored and leave the default in place.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(host) = env_value("TROVE_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_value("TROVE_PORT").and_then(|port| port.parse().ok()) {
            config.server.port = port;
        }
        if let Some(cors) = env_value("TROVE_CORS").and_then(|cors| parse_flag(&cors)) {
            config.server.enable_cors = cors;
        }

        if let Some(kind) = env_value("TROVE_SOURCE").and_then(|kind| kind.parse().ok()) {
            config.library.source = kind;
        }
        if let Some(path) = env_value("TROVE_LIBRARY") {
            config.library.path = Some(PathBuf::from(path));
        }
        if let Some(url) = env_value("TROVE_CATALOG_URL") {
            config.library.catalog_url = Some(url);
        }
        if let Some(token) = env_value("TROVE_CATALOG_TOKEN") {
            config.library.catalog_token = Some(token);
        }
        if let Some(limit) = env_value("TROVE_CATALOG_LIMIT").and_then(|limit| limit.parse().ok()) {
            config.library.catalog_list_limit = limit;
        }

        config
    }

    /// Configuration for tests: ephemeral port, given library directory.
    pub fn for_testing(library: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.server.port = 0;
        config.library.path = Some(library.into());
        config
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
