//! Agent module for Rentaldesk
//!
//! This module contains conversation management, the tool-calling agent and
//! the traits the session layer uses to create agents and run turns.

pub mod conversation;
pub mod core;

pub use conversation::Conversation;
pub use core::{Agent, AssistantFactory};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// One agent handle, driving complete turns over a conversation
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Empty conversation state for a new session
    fn new_conversation(&self) -> Conversation;

    /// Runs one complete turn for `message` and returns the final answer
    ///
    /// The conversation absorbs the exchange. On error it may be left
    /// partially updated; callers that need all-or-nothing updates run the
    /// turn on a copy.
    ///
    /// # Errors
    ///
    /// Returns the provider or tool failure that ended the turn
    async fn run_turn(&self, conversation: &mut Conversation, message: &str) -> Result<String>;
}

/// Creates agent handles for new sessions
pub trait AgentFactory: Send + Sync {
    /// Builds a fresh agent handle
    ///
    /// # Errors
    ///
    /// Returns error if the agent cannot be configured
    fn create(&self) -> Result<Arc<dyn ChatAgent>>;
}
