//! query-chat - a conversational front-end that turns questions into SQL.
//!
//! This library exposes the core modules for use by the CLI and integration tests.

pub mod config;
pub mod conversation;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod logging;
pub mod orchestrator;
pub mod prompt;
pub mod results;
pub mod schema;
