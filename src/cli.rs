//! Command-line argument parsing for query-chat.

use clap::Parser;
use query_chat::config::{Config, GatewayOverrides, ENV_API_URL, ENV_TOKEN};
use std::path::PathBuf;

/// Ask questions about your data in plain language.
#[derive(Parser, Debug)]
#[command(name = "query-chat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL hosting ai.php and db.php
    #[arg(long, value_name = "URL", env = ENV_API_URL)]
    pub api_url: Option<String>,

    /// Security token sent in the X-Security-Token header
    #[arg(long, value_name = "TOKEN", env = ENV_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Schema description file (overrides the config file)
    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use in-process mock gateways instead of the backend
    #[arg(long)]
    pub mock: bool,

    /// Check connectivity to both gateways and exit
    #[arg(long)]
    pub check: bool,

    /// Write logs to the state directory instead of stderr
    #[arg(long)]
    pub log_file: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Collects the gateway flags that were actually given.
    pub fn to_gateway_overrides(&self) -> GatewayOverrides {
        GatewayOverrides {
            base_url: self.api_url.clone(),
            security_token: self.token.clone(),
            timeout_secs: self.timeout,
        }
    }

    /// Applies CLI overrides to a loaded config.
    pub fn apply_to(&self, config: &mut Config) {
        config.gateway.merge(&self.to_gateway_overrides());
        if let Some(schema) = &self.schema {
            config.session.schema_path = Some(schema.clone());
        }
    }
}
