//! Conversation turn types.
//!
//! A [`Turn`] is one message exchanged in a conversation, tagged with the
//! speaker [`Role`]. Turns are immutable once created; rendering into the
//! prompt is dispatched on the role tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a turn's speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    /// Label used when a turn is rendered into the generation prompt.
    pub fn prompt_label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "AI",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who said it
    pub role: Role,

    /// The text content
    pub text: String,

    /// Embedding of `text`, when one was computed while handling the turn
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,

    /// When the turn was recorded
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a new user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            embedding: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            embedding: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the embedding of this turn's text.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Render as a single prompt line, e.g. `User: What is FAISS?`.
    pub fn render(&self) -> String {
        format!("{}: {}", self.role.prompt_label(), self.text)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
