//! Error types for query-chat.
//!
//! Defines the main error enum used throughout the library.

use thiserror::Error;

/// Main error type for query-chat operations.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Model gateway failures (transport errors, non-2xx status, bad payloads).
    #[error("Model gateway error: {0}")]
    ModelGateway(String),

    /// Data gateway failures (transport errors, SQL errors surfaced as non-2xx, bad payloads).
    #[error("Data gateway error: {0}")]
    DataGateway(String),

    /// Configuration errors (invalid config file, bad base URL, missing token, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Creates a model gateway error with the given message.
    pub fn model(msg: impl Into<String>) -> Self {
        Self::ModelGateway(msg.into())
    }

    /// Creates a data gateway error with the given message.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::DataGateway(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true for failures reported by either gateway.
    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::ModelGateway(_) | Self::DataGateway(_))
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ModelGateway(_) => "Model Gateway Error",
            Self::DataGateway(_) => "Data Gateway Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using ChatError.
pub type Result<T> = std::result::Result<T, ChatError>;
