//! Configuration management for query-chat.
//!
//! Handles loading configuration from TOML files and environment variables.
//! Precedence, highest first: CLI flags, environment, config file, defaults.

use crate::conversation::DEFAULT_GREETING;
use crate::error::{ChatError, Result};
use crate::gateway::http::{HttpGatewayConfig, DEFAULT_TIMEOUT_SECS};
use crate::schema::SchemaDescriptor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the backend base URL.
pub const ENV_API_URL: &str = "QUERY_CHAT_API_URL";

/// Environment variable overriding the security token.
pub const ENV_TOKEN: &str = "QUERY_CHAT_TOKEN";

/// Main configuration structure for query-chat.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backend gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Backend gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL hosting the `ai.php` and `db.php` endpoints.
    pub base_url: Option<String>,

    /// Shared security token (not recommended to store in config).
    pub security_token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            security_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    /// Applies `QUERY_CHAT_API_URL` and `QUERY_CHAT_TOKEN`, which win over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.base_url = Some(url);
            }
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            if !token.trim().is_empty() {
                self.security_token = Some(token);
            }
        }
    }

    /// Applies explicitly given overrides; unset fields keep the current value.
    pub fn merge(&mut self, overrides: &GatewayOverrides) {
        if let Some(url) = &overrides.base_url {
            self.base_url = Some(url.clone());
        }
        if let Some(token) = &overrides.security_token {
            self.security_token = Some(token.clone());
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.timeout_secs = timeout;
        }
    }

    /// Validates the settings and builds the HTTP gateway config.
    pub fn to_http_config(&self) -> Result<HttpGatewayConfig> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            ChatError::config(format!(
                "Backend URL is required (set [gateway].base_url, {ENV_API_URL}, or --api-url)"
            ))
        })?;
        let token = self.security_token.as_deref().ok_or_else(|| {
            ChatError::config(format!(
                "Security token is required (set [gateway].security_token, {ENV_TOKEN}, or --token)"
            ))
        })?;

        if self.timeout_secs == 0 {
            return Err(ChatError::config("timeout_secs must be greater than zero"));
        }

        Ok(HttpGatewayConfig::new(base_url, token)?.with_timeout(self.timeout_secs))
    }

    /// Returns a display-safe string (no token) for UI purposes.
    pub fn display_string(&self) -> String {
        let url = self.base_url.as_deref().unwrap_or("(no backend URL)");
        let token = if self.security_token.is_some() {
            "token set"
        } else {
            "no token"
        };
        format!("{url} ({token})")
    }
}

/// Gateway settings given explicitly, e.g. on the command line.
///
/// `None` means "not given", so a value equal to the default still wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayOverrides {
    pub base_url: Option<String>,
    pub security_token: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bootstrap greeting shown as the first assistant turn.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Path to a schema description file; the built-in schema is used if unset.
    pub schema_path: Option<PathBuf>,
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            schema_path: None,
        }
    }
}

impl SessionConfig {
    /// Loads the configured schema, or the built-in one.
    pub fn load_schema(&self) -> Result<SchemaDescriptor> {
        match &self.schema_path {
            Some(path) => SchemaDescriptor::from_file(path),
            None => Ok(SchemaDescriptor::default()),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("query-chat")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ChatError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ChatError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }
}
