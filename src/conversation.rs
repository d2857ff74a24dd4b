//! Conversation log types.
//!
//! A session's conversation is an append-only list of turns. The first turn is
//! always the assistant's bootstrap greeting, which is shown to the user but
//! never sent to the model.

use serde::{Deserialize, Serialize};

/// Greeting used when no custom greeting is configured.
pub const DEFAULT_GREETING: &str =
    "Hello! Ask me a question about your data and I'll look it up for you.";

/// Role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message (human input).
    User,
    /// Assistant message (model reply or fixed status text).
    Assistant,
}

impl Role {
    /// Returns the role as a string for API requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// The role of the message sender.
    pub role: Role,
    /// The content of the message.
    pub content: String,
}

impl Turn {
    /// Creates a new turn with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered, append-only log of turns.
///
/// Turns are never edited or removed once appended. Index 0 holds the
/// bootstrap greeting.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    turns: Vec<Turn>,
}

impl ConversationStore {
    /// Creates a store seeded with the given bootstrap greeting.
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::assistant(greeting)],
        }
    }

    /// Appends a turn to the end of the log.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Appends a user turn.
    pub fn append_user(&mut self, content: impl Into<String>) {
        self.append(Turn::user(content));
    }

    /// Appends an assistant turn.
    pub fn append_assistant(&mut self, content: impl Into<String>) {
        self.append(Turn::assistant(content));
    }

    /// Returns every turn except the bootstrap greeting and the most recent turn.
    ///
    /// This is the model-facing history: the greeting is fixed text the model
    /// never needs, and the most recent turn is the pending user message, which
    /// travels separately as the "last message".
    pub fn history_excluding_bootstrap_and_last(&self) -> &[Turn] {
        if self.turns.len() <= 2 {
            return &[];
        }
        &self.turns[1..self.turns.len() - 1]
    }

    /// Returns all turns in chronological order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the most recently appended turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Returns the number of turns, including the greeting.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if the store holds no turns.
    ///
    /// A store built with [`ConversationStore::new`] always holds the greeting.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}
