//! HTTP gateways for the remote agent backend.
//!
//! The backend exposes two JSON endpoints under a common base URL:
//! `ai.php` for model completions and `db.php` for query execution. Every
//! request carries the shared security token in an `X-Security-Token` header.
//! Failed requests are not retried.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::conversation::Turn;
use crate::error::{ChatError, Result};
use crate::gateway::{DataGateway, ModelGateway};
use crate::results::{Row, Scalar};

/// Default timeout for backend requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Header carrying the shared security token.
pub const SECURITY_TOKEN_HEADER: &str = "X-Security-Token";

/// Model completion endpoint, relative to the base URL.
const MODEL_ENDPOINT: &str = "ai.php";

/// Query execution endpoint, relative to the base URL.
const DATA_ENDPOINT: &str = "db.php";

/// Connection settings shared by both HTTP gateways.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Base URL of the backend (e.g. `https://example.com/agent/api`).
    pub base_url: Url,
    /// Token sent in the `X-Security-Token` header.
    pub security_token: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl HttpGatewayConfig {
    /// Creates a config from a base URL string and token.
    pub fn new(base_url: &str, security_token: impl Into<String>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ChatError::config(format!("Invalid backend URL '{base_url}': {e}")))?;

        if base_url.cannot_be_a_base() {
            return Err(ChatError::config(format!(
                "Backend URL '{base_url}' cannot be used as a base URL"
            )));
        }

        // Url::join replaces the last path segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            security_token: security_token.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Resolves an endpoint against the base URL.
    pub fn endpoint(&self, name: &str) -> Result<Url> {
        self.base_url
            .join(name)
            .map_err(|e| ChatError::config(format!("Invalid endpoint '{name}': {e}")))
    }

    fn build_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ChatError::internal(format!("Failed to create HTTP client: {e}")))
    }
}

/// Posts a JSON payload and returns the status and body text.
///
/// Transport failures are mapped through `to_error`.
async fn post_json<T: Serialize + ?Sized>(
    client: &Client,
    url: &Url,
    token: &str,
    payload: &T,
    to_error: fn(String) -> ChatError,
) -> Result<(StatusCode, String)> {
    let response = client
        .post(url.clone())
        .header("Content-Type", "application/json")
        .header(SECURITY_TOKEN_HEADER, token)
        .json(payload)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                to_error("Request timed out".to_string())
            } else if e.is_connect() {
                to_error(format!("Failed to connect to {url}"))
            } else {
                to_error(format!("Request failed: {e}"))
            }
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| to_error(format!("Failed to read response: {e}")))?;

    debug!(url = %url, status = status.as_u16(), body_len = body.len(), "Backend responded");
    Ok((status, body))
}

/// Builds an error for a non-2xx response, preferring the backend's own message.
fn status_error(status: StatusCode, body: &str, to_error: fn(String) -> ChatError) -> ChatError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return to_error(format!(
            "Backend rejected the security token ({})",
            status.as_u16()
        ));
    }

    if let Ok(error_body) = serde_json::from_str::<BackendErrorBody>(body) {
        let message = match &error_body.error {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| error_body.error.to_string()),
            other => other.to_string(),
        };
        return to_error(format!("Backend error ({}): {}", status.as_u16(), message));
    }

    to_error(format!("Backend error ({}): {}", status.as_u16(), body.trim()))
}

/// Model gateway backed by the `ai.php` endpoint.
#[derive(Debug, Clone)]
pub struct HttpModelGateway {
    client: Client,
    url: Url,
    token: String,
}

impl HttpModelGateway {
    /// Creates a model gateway from the shared config.
    pub fn new(config: &HttpGatewayConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            url: config.endpoint(MODEL_ENDPOINT)?,
            token: config.security_token.clone(),
        })
    }

    /// Returns the endpoint this gateway posts to.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ModelGateway for HttpModelGateway {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        last_message: &str,
    ) -> Result<String> {
        let request = ModelRequest {
            system_prompt,
            history,
            last_message,
        };

        let (status, body) =
            post_json(&self.client, &self.url, &self.token, &request, ChatError::ModelGateway)
                .await?;

        if !status.is_success() {
            return Err(status_error(status, &body, ChatError::ModelGateway));
        }

        parse_model_response(&body)
    }
}

/// Data gateway backed by the `db.php` endpoint.
#[derive(Debug, Clone)]
pub struct HttpDataGateway {
    client: Client,
    url: Url,
    token: String,
}

impl HttpDataGateway {
    /// Creates a data gateway from the shared config.
    pub fn new(config: &HttpGatewayConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            url: config.endpoint(DATA_ENDPOINT)?,
            token: config.security_token.clone(),
        })
    }

    /// Returns the endpoint this gateway posts to.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl DataGateway for HttpDataGateway {
    async fn execute(&self, sql: &str, params: &[Scalar]) -> Result<Vec<Row>> {
        let request = DataRequest { query: sql, params };

        let (status, body) =
            post_json(&self.client, &self.url, &self.token, &request, ChatError::DataGateway)
                .await?;

        if !status.is_success() {
            return Err(status_error(status, &body, ChatError::DataGateway));
        }

        parse_rows(&body)
    }
}

/// Extracts the reply text from an `ai.php` response body.
fn parse_model_response(body: &str) -> Result<String> {
    let response: ModelResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::model(format!("Failed to parse response: {e}")))?;
    Ok(response.response)
}

/// Extracts rows from a `db.php` response body.
fn parse_rows(body: &str) -> Result<Vec<Row>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ChatError::data(format!("Failed to parse response: {e}")))?;

    let Value::Array(items) = value else {
        return Err(ChatError::data(
            "Unexpected response shape: expected a JSON array of rows",
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(row) => Ok(row),
            other => Err(ChatError::data(format!(
                "Unexpected row {i}: expected an object, got {other}"
            ))),
        })
        .collect()
}

// Backend wire types

#[derive(Debug, Serialize)]
struct ModelRequest<'a> {
    system_prompt: &'a str,
    history: &'a [Turn],
    last_message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct DataRequest<'a> {
    query: &'a str,
    params: &'a [Scalar],
}

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    error: Value,
}
