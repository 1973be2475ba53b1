//! Session chat manager
//!
//! Keeps a bounded conversation history per user, prefixes the fixed tutor
//! instructions on every outbound call, and records each completed exchange
//! as an immutable [`Interaction`].
//!
//! ```text
//! handle_query(user, query)
//!   -> session store (append user message, apply budget policy)
//!   -> completion client (instructions + history)
//!   -> session store (append assistant reply)
//!   -> interaction log
//! ```

pub mod budget;
mod manager;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

pub use budget::{BudgetPolicy, TruncateToTail, count_tokens, estimate_tokens};
pub use manager::{ChatManager, DEFAULT_COMPLETION_TIMEOUT};
pub use store::{MemorySessionStore, SessionStore};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
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

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One completed query/reply exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interaction {
    pub id: Uuid,
    pub user_id: String,
    pub query: String,
    pub reply: String,
    pub timestamp: DateTime<Utc>,
}

impl Interaction {
    /// Create a record with a fresh id and the current time
    #[must_use]
    pub fn new(user_id: &str, query: &str, reply: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            query: query.to_string(),
            reply: reply.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Durable, append-only sink for completed interactions
pub trait InteractionLog: Send + Sync {
    /// Persist one interaction
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be written
    fn append(&self, interaction: &Interaction) -> Result<()>;
}
