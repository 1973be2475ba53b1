//! Tutor Gateway - conversational backend for a data-structures and algorithms tutor
//!
//! Each learner gets a bounded, in-memory conversation with an LLM tutor.
//! Every completed exchange is also written to a durable interaction log.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     HTTP API                          │
//! │  /chat  │  /articles  │  /questions  │  /users/...   │
//! └────────────────────┬─────────────────────────────────┘
//!                      │ bearer token -> IdentityProvider
//! ┌────────────────────▼─────────────────────────────────┐
//! │                  ChatManager                          │
//! │  SessionStore  │  BudgetPolicy  │  CompletionClient  │
//! └────────────────────┬─────────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────────┐
//! │                SQLite (r2d2 pool)                     │
//! │  users │ articles │ questions │ progress │ chat log  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod chat;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod prompt;
pub mod security;

pub use chat::{ChatManager, Interaction, InteractionLog, Message, Role};
pub use completion::{CompletionClient, OpenAiCompatClient};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use security::{IdentityProvider, JwtIdentityProvider};
