//! Query extraction from model replies.
//!
//! The model is told to answer with a bare SQL statement, but replies also
//! arrive wrapped in a JSON instruction or embedded in prose. Each format is
//! handled by a pure strategy; strategies are tried in order and the first
//! match wins. Anything no strategy recognizes is treated as conversation.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::results::Scalar;

/// A SQL statement extracted from a model reply, pending execution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCandidate {
    /// The SQL text to execute.
    pub sql: String,
    /// Positional parameters for the statement.
    pub params: Vec<Scalar>,
}

impl QueryCandidate {
    /// Creates a candidate with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a candidate with the given parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<Scalar>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Classification of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The reply encodes a query to execute.
    Query(QueryCandidate),
    /// The reply is conversational text, shown to the user as-is.
    Conversational(String),
}

/// A named classification strategy.
pub struct Strategy {
    /// Name used in logs.
    pub name: &'static str,
    /// Returns a candidate if the reply matches this strategy's format.
    pub detect: fn(&str) -> Option<QueryCandidate>,
}

/// Strategies in precedence order.
pub const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "direct_sql",
        detect: detect_direct_sql,
    },
    Strategy {
        name: "structured_json",
        detect: detect_structured_json,
    },
    Strategy {
        name: "embedded_statement",
        detect: detect_embedded_statement,
    },
];

/// Classifies a model reply.
pub fn extract_query(response: &str) -> Extraction {
    let text = response.trim();

    for strategy in STRATEGIES {
        if let Some(candidate) = (strategy.detect)(text) {
            tracing::debug!(
                strategy = strategy.name,
                sql_len = candidate.sql.len(),
                param_count = candidate.params.len(),
                "Extracted query from model reply"
            );
            return Extraction::Query(candidate);
        }
    }

    tracing::debug!(reply_len = text.len(), "Model reply is conversational");
    Extraction::Conversational(text.to_string())
}

/// Matches replies that start with `SELECT` (any case). The whole reply is the SQL.
pub fn detect_direct_sql(text: &str) -> Option<QueryCandidate> {
    let text = text.trim();
    let prefix = text.get(..6)?;
    if prefix.eq_ignore_ascii_case("SELECT") {
        Some(QueryCandidate::new(text))
    } else {
        None
    }
}

/// Matches `{"type": "query", "query": "...", "params": [...]}`.
///
/// Malformed JSON is a miss, not an error.
pub fn detect_structured_json(text: &str) -> Option<QueryCandidate> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    let object = value.as_object()?;

    if object.get("type").and_then(Value::as_str) != Some("query") {
        return None;
    }

    let sql = object.get("query").and_then(Value::as_str)?;
    if sql.trim().is_empty() {
        return None;
    }

    let params = object
        .get("params")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Some(QueryCandidate::with_params(sql, params))
}

/// Finds a `SELECT ... ;` statement anywhere in the reply.
///
/// Only semicolon-terminated statements match; the matched span runs from
/// `SELECT` through the first semicolon.
pub fn detect_embedded_statement(text: &str) -> Option<QueryCandidate> {
    static EMBEDDED_SELECT: OnceLock<Regex> = OnceLock::new();
    let re = EMBEDDED_SELECT
        .get_or_init(|| Regex::new(r"(?i)\bSELECT\b[^;]*;").expect("valid embedded SELECT regex"));

    re.find(text).map(|m| QueryCandidate::new(m.as_str()))
}
