//! Mock gateways for testing.
//!
//! Provides deterministic, in-process stand-ins for the model and data
//! services. Every call is recorded so tests can assert on what was sent.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::conversation::Turn;
use crate::error::{ChatError, Result};
use crate::gateway::{DataGateway, ModelGateway};
use crate::prompt::ANALYSIS_INSTRUCTION;
use crate::results::{Row, Scalar};

/// A model call as seen by a mock gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedModelCall {
    pub system_prompt: String,
    pub history: Vec<Turn>,
    pub last_message: String,
}

/// A data call as seen by a mock gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDataCall {
    pub sql: String,
    pub params: Vec<Scalar>,
}

/// Mock model gateway that returns canned replies.
///
/// Scripted replies are consumed first, in order. After that the reply is
/// picked from pattern mappings matched against the last message, and finally
/// from a small built-in set. Clones share the call log and script.
#[derive(Debug, Clone, Default)]
pub struct MockModelGateway {
    /// Replies returned in order before any pattern matching.
    script: Arc<Mutex<VecDeque<Result<String>>>>,
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    calls: Arc<Mutex<Vec<RecordedModelCall>>>,
}

impl MockModelGateway {
    /// Creates a new mock gateway with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply to be returned by the next unscripted call.
    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        self.push_script(Ok(reply.into()));
        self
    }

    /// Queues a failure to be returned by the next unscripted call.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push_script(Err(ChatError::model(message)));
        self
    }

    /// Adds a custom response mapping.
    ///
    /// When the last message contains `pattern`, the mock will return `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<RecordedModelCall> {
        lock(&self.calls).clone()
    }

    /// Returns the number of calls made so far.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn push_script(&self, reply: Result<String>) {
        lock(&self.script).push_back(reply);
    }

    /// Generates a mock response based on the input.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if input == ANALYSIS_INSTRUCTION {
            return "Here is a summary of the results shown in the table.".to_string();
        }

        if input_lower.contains("how many") && input_lower.contains("applicant") {
            return "SELECT COUNT(*) AS applicant_count FROM applicant;".to_string();
        }

        if input_lower.contains("applicant") {
            return "SELECT applicantNumber, applicant_first, applicant_last FROM applicant LIMIT 5;"
                .to_string();
        }

        if input_lower.contains("countr") {
            return "SELECT id, name FROM country;".to_string();
        }

        "I can answer questions about applicants and countries. What would you like to know?"
            .to_string()
    }
}

#[async_trait]
impl ModelGateway for MockModelGateway {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        last_message: &str,
    ) -> Result<String> {
        lock(&self.calls).push(RecordedModelCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            last_message: last_message.to_string(),
        });

        if let Some(scripted) = lock(&self.script).pop_front() {
            return scripted;
        }

        Ok(self.mock_response(last_message))
    }
}

/// Mock data gateway that returns fixed rows for every query.
///
/// Clones share the call log.
#[derive(Debug, Clone, Default)]
pub struct MockDataGateway {
    rows: Vec<Row>,
    calls: Arc<Mutex<Vec<RecordedDataCall>>>,
}

impl MockDataGateway {
    /// Creates a mock that returns no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that returns the given rows.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            calls: Arc::default(),
        }
    }

    /// Creates a mock with a few sample applicant rows.
    pub fn with_sample_rows() -> Self {
        let rows = [
            json!({"applicantNumber": 1001, "applicant_first": "Maria", "applicant_last": "Santos"}),
            json!({"applicantNumber": 1002, "applicant_first": "Jose", "applicant_last": "Reyes"}),
            json!({"applicantNumber": 1003, "applicant_first": "Ana", "applicant_last": "Cruz"}),
        ]
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::Object(row) => Some(row),
            _ => None,
        })
        .collect();
        Self::with_rows(rows)
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<RecordedDataCall> {
        lock(&self.calls).clone()
    }

    /// Returns the number of calls made so far.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl DataGateway for MockDataGateway {
    async fn execute(&self, sql: &str, params: &[Scalar]) -> Result<Vec<Row>> {
        lock(&self.calls).push(RecordedDataCall {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(self.rows.clone())
    }
}

/// A model gateway that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingModelGateway {
    calls: Arc<Mutex<usize>>,
}

impl FailingModelGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        *lock(&self.calls)
    }
}

#[async_trait]
impl ModelGateway for FailingModelGateway {
    async fn complete(&self, _: &str, _: &[Turn], _: &str) -> Result<String> {
        *lock(&self.calls) += 1;
        Err(ChatError::model("Model service unavailable"))
    }
}

/// A data gateway that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingDataGateway {
    calls: Arc<Mutex<usize>>,
}

impl FailingDataGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        *lock(&self.calls)
    }
}

#[async_trait]
impl DataGateway for FailingDataGateway {
    async fn execute(&self, _: &str, _: &[Scalar]) -> Result<Vec<Row>> {
        *lock(&self.calls) += 1;
        Err(ChatError::data("Backend error (500): query failed"))
    }
}

/// Locks a mock's shared state, recovering from poisoning.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
