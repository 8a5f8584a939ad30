//! Configuration for the supply chain service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// HTTP listen address
    pub http_listen_addr: String,

    /// Base URL encoded into trace links (what the QR collaborator renders)
    pub trace_base_url: String,

    /// Mock blockchain configuration
    pub mockchain: MockChainConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/farmchain"),
            service_name: "farmchain".to_string(),
            http_listen_addr: "0.0.0.0:4000".to_string(),
            trace_base_url: "http://localhost:3000/trace".to_string(),
            mockchain: MockChainConfig::default(),
            auth: AuthConfig::default(),
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// Mock blockchain confirmation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockChainConfig {
    /// Minimum confirmation delay (milliseconds, inclusive)
    pub min_delay_ms: u64,

    /// Maximum confirmation delay (milliseconds, exclusive)
    pub max_delay_ms: u64,

    /// Probability a pending transaction confirms (rest fail)
    pub confirm_probability: f64,

    /// Explorer base URL for submitted transactions
    pub explorer_base_url: String,
}

impl Default for MockChainConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 5_000,
            max_delay_ms: 15_000,
            confirm_probability: 0.9,
            explorer_base_url: "https://mockchain.local/tx".to_string(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens
    pub jwt_secret: String,

    /// Token lifetime in seconds (default: 7 days)
    pub token_expiry_secs: u64,

    /// Admin token gating force-confirm and transaction listing
    pub admin_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-mode-secret-not-for-production-use-123456".to_string(),
            token_expiry_secs: 7 * 24 * 3600,
            admin_token: None,
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 2,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults with environment variable overrides
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("FARMCHAIN_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(addr) = std::env::var("FARMCHAIN_HTTP_ADDR") {
            config.http_listen_addr = addr;
        }

        if let Ok(url) = std::env::var("FARMCHAIN_TRACE_BASE_URL") {
            config.trace_base_url = url;
        }

        if let Ok(secret) = std::env::var("FARMCHAIN_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }

        if let Ok(token) = std::env::var("FARMCHAIN_ADMIN_TOKEN") {
            config.auth.admin_token = Some(token);
        }

        Ok(config)
    }
}
