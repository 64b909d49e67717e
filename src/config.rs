//! Application configuration, read from the environment at startup.
//!
//! The completion-service credential is the one setting checked per request
//! rather than at startup: its absence is a configuration failure for that
//! request, never a cached global outage.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Wardchat";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default OpenAI-compatible endpoint.
const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1";

/// Model used for SQL generation and result formatting.
const DEFAULT_GENERATION_MODEL: &str = "o4-mini";

/// Model used for classification and subject-id extraction.
const DEFAULT_DETECTION_MODEL: &str = "gpt-4o-mini";

/// Runtime configuration. Built once in `main` and shared through
/// `ApiContext`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Completion-service credential. `None` is legal at startup; every
    /// request that needs the service re-checks it via `require_api_key`.
    pub api_key: Option<String>,
    /// Main hospital database (executes generated SQL).
    pub database_path: PathBuf,
    /// Reference discharge-records database (parameterized lookups only).
    pub reference_db_path: PathBuf,
    /// Optional override for the schema description file. `None` uses the
    /// built-in schema text.
    pub schema_path: Option<PathBuf>,
    /// Base URL of the OpenAI-compatible completion endpoint.
    pub completion_url: String,
    /// Model for SQL generation and result formatting.
    pub generation_model: String,
    /// Model for classification and subject-id extraction.
    pub detection_model: String,
    /// HTTP bind address.
    pub bind_addr: SocketAddr,
}

/// Configuration errors surfaced at request time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OpenAI API key is not configured")]
    MissingApiKey,
    #[error("Invalid bind address: {0}")]
    InvalidBindAddr(String),
}

impl AppConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind = std::env::var("WARDCHAT_BIND").unwrap_or_else(|_| "127.0.0.1:3000".into());
        let bind_addr: SocketAddr = bind
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr(bind))?;

        Ok(Self {
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            database_path: std::env::var("WARDCHAT_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("db/data.db")),
            reference_db_path: std::env::var("WARDCHAT_REFERENCE_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("db/dc_data.db")),
            schema_path: std::env::var("WARDCHAT_SCHEMA").ok().map(PathBuf::from),
            completion_url: std::env::var("WARDCHAT_OPENAI_URL")
                .unwrap_or_else(|_| DEFAULT_COMPLETION_URL.into()),
            generation_model: std::env::var("WARDCHAT_GENERATION_MODEL")
                .unwrap_or_else(|_| DEFAULT_GENERATION_MODEL.into()),
            detection_model: std::env::var("WARDCHAT_DETECTION_MODEL")
                .unwrap_or_else(|_| DEFAULT_DETECTION_MODEL.into()),
            bind_addr,
        })
    }

    /// Per-request credential check. Absence is a fixed configuration
    /// failure for the request, not a cached outage flag.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            database_path: PathBuf::from("db/data.db"),
            reference_db_path: PathBuf::from("db/dc_data.db"),
            schema_path: None,
            completion_url: DEFAULT_COMPLETION_URL.into(),
            generation_model: DEFAULT_GENERATION_MODEL.into(),
            detection_model: DEFAULT_DETECTION_MODEL.into(),
            bind_addr: "127.0.0.1:3000".parse().unwrap(),
        }
    }
}
