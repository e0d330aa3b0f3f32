//! Per-user sessions
//!
//! A [`Session`] binds one customer to an agent handle and the conversation
//! that handle works on. Sessions live in a [`SessionRegistry`] and are
//! shared as [`SessionHandle`]s; holding a handle's lock serializes that
//! customer's turns.

pub mod eviction;
pub mod registry;

pub use eviction::{EvictionPolicy, IdleLru, Unbounded};
pub use registry::{SessionRegistry, SessionSummary};

use crate::agent::{ChatAgent, Conversation};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared, lockable session
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// One customer's ongoing conversation
pub struct Session {
    user_id: String,
    agent: Arc<dyn ChatAgent>,
    conversation: Conversation,
    created_at: DateTime<Utc>,
    turns: u64,
}

impl Session {
    /// Creates a session with a fresh conversation from `agent`
    pub fn new(user_id: impl Into<String>, agent: Arc<dyn ChatAgent>) -> Self {
        let conversation = agent.new_conversation();
        Self {
            user_id: user_id.into(),
            agent,
            conversation,
            created_at: Utc::now(),
            turns: 0,
        }
    }

    /// Owner of the session
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Agent handle bound to the session
    pub fn agent(&self) -> Arc<dyn ChatAgent> {
        self.agent.clone()
    }

    /// Committed conversation state
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Replaces the conversation with the outcome of a successful turn
    pub fn commit(&mut self, conversation: Conversation) {
        self.conversation = conversation;
        self.turns += 1;
    }

    /// Number of committed turns
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// When the session was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("messages", &self.conversation.len())
            .field("created_at", &self.created_at)
            .field("turns", &self.turns)
            .finish()
    }
}
