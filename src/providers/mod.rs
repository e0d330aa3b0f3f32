//! Provider module for Rentaldesk
//!
//! This module contains the model provider abstraction and implementations
//! for Google Gemini and Ollama.

pub mod base;
pub mod gemini;
pub mod ollama;

pub use base::{
    tool_name_for_call, validate_message_sequence, CompletionResponse, FunctionCall, Message,
    Provider, Role, TokenUsage, ToolCall,
};
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

use crate::config::ProviderConfig;
use crate::error::{Result, RentaldeskError};
use reqwest::StatusCode;
use std::sync::Arc;

/// Create a provider instance based on configuration
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    match config.provider_type.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config.gemini.clone())?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config.ollama.clone())?)),
        other => {
            Err(RentaldeskError::Provider(format!("Unknown provider type: {}", other)).into())
        }
    }
}

/// Maps a non-success upstream status to an error
///
/// HTTP 429 and bodies reporting `RESOURCE_EXHAUSTED` are throttling
/// signals; everything else is a plain provider failure.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> RentaldeskError {
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        RentaldeskError::RateLimited(format!("{} returned {}: {}", provider, status, body))
    } else {
        RentaldeskError::Provider(format!("{} returned error {}: {}", provider, status, body))
    }
}
