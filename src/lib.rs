//! Rentaldesk - DVD rental assistant backend library
//!
//! This library provides the pieces of a conversational assistant for a DVD
//! rental store: an LLM agent that answers customer messages by calling
//! parameterized database tools, per-customer sessions, a request handler
//! that paces and retries agent turns, and the HTTP API in front of it.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `agent`: Agent turn loop and conversation management
//! - `providers`: Model provider abstraction and implementations (Gemini, Ollama)
//! - `tools`: Tool descriptors, manifests, the tool server client and registry
//! - `session`: Per-customer sessions and their registry
//! - `handler`: Pacing, retry and outcome classification for agent turns
//! - `server`: HTTP routes
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use rentaldesk::cli::Cli;
//! use rentaldesk::Config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let cli = Cli::parse_args();
//!     let config = Config::load("config/config.yaml", &cli)?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod prompts;
pub mod providers;
pub mod server;
pub mod session;
pub mod tools;

// Re-export commonly used types
pub use agent::{Agent, AgentFactory, AssistantFactory, ChatAgent, Conversation};
pub use config::Config;
pub use error::{RentaldeskError, Result};
pub use handler::{Failure, FailureKind, RequestHandler, RequestOutcome};
pub use session::{Session, SessionHandle, SessionRegistry};
