//! Chat-to-query orchestration.
//!
//! The orchestrator drives one chain per user message:
//!
//! ```text
//! Idle -> AwaitingModelReply -> Idle                       (conversational reply, or model failure)
//!                            -> AwaitingQueryExecution -> Idle                   (query failure)
//!                                                      -> AwaitingExplanation -> Idle
//! ```
//!
//! Gateway failures never escape a chain. Each one returns the session to
//! `Idle`, raises the error flag, and appends a fixed assistant turn, so the
//! conversation stays usable.
//!
//! Presentation layers either pull a [`SessionSnapshot`] or subscribe to the
//! [`SessionEvent`] stream, which reports every transition in order.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::conversation::{ConversationStore, Turn, DEFAULT_GREETING};
use crate::extractor::{extract_query, Extraction};
use crate::gateway::{DataGateway, ModelGateway};
use crate::prompt::{build_analysis_prompt, build_system_prompt, ANALYSIS_INSTRUCTION};
use crate::results::ResultSet;
use crate::schema::SchemaDescriptor;

/// Assistant turn appended when the model call fails.
pub const MODEL_FAILURE_REPLY: &str =
    "Sorry, I'm having trouble communicating with the assistant right now. Please try again.";

/// Assistant turn appended when the query fails to execute.
pub const QUERY_FAILURE_REPLY: &str =
    "Sorry, I couldn't run the query for that question. Please try rephrasing it.";

/// Assistant turn appended when the results were fetched but could not be explained.
pub const EXPLANATION_FAILURE_REPLY: &str =
    "I fetched the results, but couldn't summarize them. The table shows the raw data.";

/// Error flag text for a failed model call.
pub const MODEL_ERROR_STATUS: &str = "Failed to reach the model service.";

/// Error flag text for a failed query.
pub const QUERY_ERROR_STATUS: &str = "Failed to execute the query.";

/// Error flag text for a failed explanation call.
pub const EXPLANATION_ERROR_STATUS: &str = "Failed to explain the query results.";

/// Stage of the current request chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationPhase {
    /// No chain in flight; input is accepted.
    #[default]
    Idle,
    /// Waiting for the model to answer the user's message.
    AwaitingModelReply,
    /// Waiting for the data service to run the extracted query.
    AwaitingQueryExecution,
    /// Waiting for the model to explain the fetched results.
    AwaitingExplanation,
}

impl ConversationPhase {
    /// Returns true while any gateway call is outstanding.
    pub fn is_loading(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Returns a short status label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingModelReply => "thinking",
            Self::AwaitingQueryExecution => "running query",
            Self::AwaitingExplanation => "explaining results",
        }
    }
}

impl fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a call to `send_message` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty or whitespace-only input; nothing happened.
    Ignored,
    /// Another chain was in flight; the input was rejected.
    Busy,
    /// The model replied conversationally.
    Replied,
    /// A query ran and its results were explained.
    Answered { row_count: usize },
    /// The model call failed.
    ModelFailed,
    /// The extracted query failed to execute.
    QueryFailed,
    /// The query ran but the explanation call failed.
    ExplanationFailed,
}

/// A state change reported to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A turn was appended to the conversation.
    TurnAppended(Turn),
    /// The phase changed.
    PhaseChanged(ConversationPhase),
    /// A query succeeded and its results are now visible.
    ResultsReady(ResultSet),
    /// The visible results were cleared after a failed query.
    ResultsCleared,
    /// The error flag was raised with this message.
    ErrorRaised(String),
    /// The error flag was cleared by a new message.
    ErrorCleared,
}

/// Per-conversation state owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct Session {
    store: ConversationStore,
    phase: ConversationPhase,
    error: Option<String>,
    results: Option<ResultSet>,
}

impl Session {
    /// Creates a session whose conversation opens with the given greeting.
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            store: ConversationStore::new(greeting),
            phase: ConversationPhase::Idle,
            error: None,
            results: None,
        }
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.store
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    /// Returns the error flag's message, if raised.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the most recent successful result set, if visible.
    pub fn results(&self) -> Option<&ResultSet> {
        self.results.as_ref()
    }

    pub fn results_visible(&self) -> bool {
        self.results.is_some()
    }

    /// Returns the result table headers (empty when no results or no rows).
    pub fn results_table_headers(&self) -> &[String] {
        self.results.as_ref().map(ResultSet::columns).unwrap_or(&[])
    }

    /// Returns an owned copy of the session for presentation.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            turns: self.store.turns().to_vec(),
            phase: self.phase,
            error: self.error.clone(),
            results: self.results.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}

/// Owned copy of a session's visible state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub turns: Vec<Turn>,
    pub phase: ConversationPhase,
    pub error: Option<String>,
    pub results: Option<ResultSet>,
}

impl SessionSnapshot {
    pub fn is_loading(&self) -> bool {
        self.phase.is_loading()
    }

    pub fn results_table_headers(&self) -> &[String] {
        self.results.as_ref().map(ResultSet::columns).unwrap_or(&[])
    }
}

/// Drives the conversation through the model and data gateways.
pub struct Orchestrator {
    model: Box<dyn ModelGateway>,
    data: Box<dyn DataGateway>,
    schema: SchemaDescriptor,
    session: Session,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl Orchestrator {
    /// Creates an orchestrator with a fresh session using the default greeting.
    pub fn new(
        model: Box<dyn ModelGateway>,
        data: Box<dyn DataGateway>,
        schema: SchemaDescriptor,
    ) -> Self {
        Self {
            model,
            data,
            schema,
            session: Session::default(),
            events: None,
        }
    }

    /// Replaces the bootstrap greeting.
    ///
    /// Only meaningful before the first message; the existing session is discarded.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.session = Session::new(greeting);
        self
    }

    /// Subscribes to session events.
    ///
    /// Only one subscriber is supported; subscribing again replaces it.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Processes one user message through the full chain.
    ///
    /// The user turn is appended before any gateway call is made. Exclusive
    /// access (`&mut self`) guarantees chains never interleave.
    pub async fn send_message(&mut self, input: &str) -> SendOutcome {
        let message = input.trim();
        if message.is_empty() {
            debug!("Ignoring empty message");
            return SendOutcome::Ignored;
        }

        let start = Instant::now();
        debug!(input_len = message.len(), "Starting chat chain");

        if self.session.error.take().is_some() {
            self.emit(SessionEvent::ErrorCleared);
        }
        self.append(Turn::user(message));
        self.set_phase(ConversationPhase::AwaitingModelReply);

        let system_prompt = build_system_prompt(&self.schema);
        let history = self.session.store.history_excluding_bootstrap_and_last();
        debug!(history_len = history.len(), "Sending message to model");

        let model_start = Instant::now();
        let result = self.model.complete(&system_prompt, history, message).await;
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Model call failed");
                self.fail(MODEL_ERROR_STATUS, MODEL_FAILURE_REPLY);
                return SendOutcome::ModelFailed;
            }
        };
        debug!(
            duration_ms = model_start.elapsed().as_millis(),
            reply_len = reply.len(),
            "Received model reply"
        );

        let candidate = match extract_query(&reply) {
            Extraction::Query(candidate) => candidate,
            Extraction::Conversational(text) => {
                self.append(Turn::assistant(text));
                self.set_phase(ConversationPhase::Idle);
                info!(
                    total_duration_ms = start.elapsed().as_millis(),
                    "Chat chain complete: conversational reply"
                );
                return SendOutcome::Replied;
            }
        };

        self.set_phase(ConversationPhase::AwaitingQueryExecution);
        debug!(
            sql = %candidate.sql,
            param_count = candidate.params.len(),
            "Executing extracted query"
        );

        let query_start = Instant::now();
        let result = self.data.execute(&candidate.sql, &candidate.params).await;
        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, sql = %candidate.sql, "Query execution failed");
                if self.session.results.take().is_some() {
                    self.emit(SessionEvent::ResultsCleared);
                }
                self.fail(QUERY_ERROR_STATUS, QUERY_FAILURE_REPLY);
                return SendOutcome::QueryFailed;
            }
        };

        let results = ResultSet::new(rows);
        let row_count = results.row_count();
        debug!(
            duration_ms = query_start.elapsed().as_millis(),
            row_count,
            column_count = results.columns().len(),
            "Query executed"
        );

        let analysis_prompt = build_analysis_prompt(&self.schema, message, &candidate, &results);
        self.emit(SessionEvent::ResultsReady(results.clone()));
        self.session.results = Some(results);
        self.set_phase(ConversationPhase::AwaitingExplanation);

        let result = self
            .model
            .complete(&analysis_prompt, &[], ANALYSIS_INSTRUCTION)
            .await;
        match result {
            Ok(explanation) => {
                self.append(Turn::assistant(explanation.trim()));
                self.set_phase(ConversationPhase::Idle);
                info!(
                    total_duration_ms = start.elapsed().as_millis(),
                    row_count,
                    "Chat chain complete: query answered"
                );
                SendOutcome::Answered { row_count }
            }
            Err(e) => {
                warn!(error = %e, "Explanation call failed");
                self.fail(EXPLANATION_ERROR_STATUS, EXPLANATION_FAILURE_REPLY);
                SendOutcome::ExplanationFailed
            }
        }
    }

    fn append(&mut self, turn: Turn) {
        self.session.store.append(turn.clone());
        self.emit(SessionEvent::TurnAppended(turn));
    }

    fn set_phase(&mut self, phase: ConversationPhase) {
        self.session.phase = phase;
        self.emit(SessionEvent::PhaseChanged(phase));
    }

    /// Ends the chain on a gateway failure.
    fn fail(&mut self, status: &str, reply: &str) {
        self.set_phase(ConversationPhase::Idle);
        self.session.error = Some(status.to_string());
        self.emit(SessionEvent::ErrorRaised(status.to_string()));
        self.append(Turn::assistant(reply));
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is watching.
            let _ = tx.send(event);
        }
    }
}

/// Shared handle that serializes chains across tasks.
///
/// A message sent while another chain is in flight is rejected with
/// [`SendOutcome::Busy`] rather than queued.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Orchestrator>>,
}

impl SessionHandle {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(orchestrator)),
        }
    }

    /// Sends a message unless a chain is already running.
    pub async fn send_message(&self, input: &str) -> SendOutcome {
        if input.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        let Ok(mut orchestrator) = self.inner.try_lock() else {
            debug!("Rejecting message: a chain is already in flight");
            return SendOutcome::Busy;
        };

        orchestrator.send_message(input).await
    }

    /// Returns a snapshot, waiting for any in-flight chain to finish first.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Returns true while a chain is running.
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
