//! Gateways to the remote model and data services.
//!
//! The orchestrator only sees the two traits below; the HTTP implementations
//! talk to the backend and the mocks serve tests and offline runs.

pub mod http;
pub mod mock;

pub use http::{HttpDataGateway, HttpGatewayConfig, HttpModelGateway};
pub use mock::{FailingDataGateway, FailingModelGateway, MockDataGateway, MockModelGateway};

use async_trait::async_trait;

use crate::conversation::Turn;
use crate::error::Result;
use crate::results::{Row, Scalar};

/// Language-model backend.
///
/// Implementations must be thread-safe (Send + Sync) to support async operations.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Sends a system prompt, prior history and the final user message.
    ///
    /// Returns the model's free-form reply text.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        last_message: &str,
    ) -> Result<String>;
}

/// Data-query backend.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Executes a SQL statement with positional parameters and returns its rows.
    async fn execute(&self, sql: &str, params: &[Scalar]) -> Result<Vec<Row>>;
}

/// SQL used by the connectivity check.
pub const CHECK_QUERY: &str = "SELECT 1 AS ok";

/// Outcome of a connectivity check against both gateways.
#[derive(Debug)]
pub struct ConnectivityReport {
    /// Model gateway result: the reply length on success.
    pub model: Result<usize>,
    /// Data gateway result: the number of rows returned on success.
    pub data: Result<usize>,
}

impl ConnectivityReport {
    /// Returns true if both gateways answered.
    pub fn is_ok(&self) -> bool {
        self.model.is_ok() && self.data.is_ok()
    }
}

/// Makes one trivial call to each gateway.
///
/// Both calls run concurrently and neither failure short-circuits the other.
pub async fn check_connectivity(
    model: &dyn ModelGateway,
    data: &dyn DataGateway,
) -> ConnectivityReport {
    let (model_result, data_result) = tokio::join!(
        model.complete("You are a connectivity check. Reply with OK.", &[], "ping"),
        data.execute(CHECK_QUERY, &[]),
    );

    tracing::info!(
        model_ok = model_result.is_ok(),
        data_ok = data_result.is_ok(),
        "Connectivity check complete"
    );

    ConnectivityReport {
        model: model_result.map(|reply| reply.len()),
        data: data_result.map(|rows| rows.len()),
    }
}
