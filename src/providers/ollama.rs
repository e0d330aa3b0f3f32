//! Ollama provider
//!
//! Uses the non-streaming `POST /api/chat` endpoint. Tool definitions are
//! wrapped as `{"type": "function", "function": {...}}`; tool call arguments
//! travel as JSON objects rather than strings.

use crate::config::OllamaConfig;
use crate::error::{Result, RentaldeskError};
use crate::providers::{
    status_error, validate_message_sequence, CompletionResponse, Message, Provider, TokenUsage,
    ToolCall,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local model server provider
///
/// Ollama reports no throttling, so every failure is terminal unless the
/// upstream answers 429.
///
/// # Examples
///
/// ```no_run
/// use rentaldesk::config::OllamaConfig;
/// use rentaldesk::providers::{Message, OllamaProvider, Provider};
///
/// # async fn example() -> rentaldesk::error::Result<()> {
/// let provider = OllamaProvider::new(OllamaConfig::default())?;
/// let reply = provider.complete(&[Message::user("Any horror films?")], &[]).await?;
/// # Ok(())
/// # }
/// ```
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireTool {
    r#type: &'static str,
    function: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    message: WireMessage,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let tool_calls = message
            .tool_calls
            .iter()
            .flatten()
            .map(|call| WireToolCall {
                id: Some(call.id.clone()),
                function: WireFunction {
                    name: call.function.name.clone(),
                    arguments: serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|_| serde_json::json!({})),
                },
            })
            .collect();

        Self {
            role: message.role.to_string(),
            content: message.content.clone().unwrap_or_default(),
            tool_calls,
        }
    }
}

impl From<WireMessage> for Message {
    fn from(reply: WireMessage) -> Self {
        if reply.tool_calls.is_empty() {
            return Message::assistant(reply.content);
        }

        let calls = reply
            .tool_calls
            .into_iter()
            .map(|wire| {
                let mut call =
                    ToolCall::generated(wire.function.name, wire.function.arguments.to_string());
                if let Some(id) = wire.id.filter(|id| !id.is_empty()) {
                    call.id = id;
                }
                call
            })
            .collect();
        Message::assistant_with_tools(calls)
    }
}

/// Wraps complete `{name, description, parameters}` definitions
fn wire_tools(tools: &[serde_json::Value]) -> Vec<WireTool> {
    tools
        .iter()
        .filter(|t| {
            ["name", "description", "parameters"]
                .iter()
                .all(|key| t.get(key).is_some())
        })
        .map(|t| WireTool {
            r#type: "function",
            function: t.clone(),
        })
        .collect()
}

impl OllamaProvider {
    /// Create a provider for the configured host and model
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Provider` if the HTTP client cannot be built
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("rentaldesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                RentaldeskError::Provider(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            host = %config.host,
            model = %config.model,
            "Initialized Ollama provider"
        );

        Ok(Self { client, config })
    }

    /// Configured model name
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn body<'a>(&'a self, messages: &[Message], tools: &[serde_json::Value]) -> ChatBody<'a> {
        ChatBody {
            model: &self.config.model,
            messages: validate_message_sequence(messages)
                .iter()
                .filter(|m| m.content.is_some() || m.has_tool_calls())
                .map(WireMessage::from)
                .collect(),
            tools: wire_tools(tools),
            stream: false,
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));
        let body = self.body(messages, tools);
        tracing::debug!(
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending Ollama request"
        );

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            RentaldeskError::Provider(format!("Ollama request to {} failed: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "Ollama returned an error");
            return Err(status_error("Ollama", status, &text).into());
        }

        let reply: ChatReply = response.json().await.map_err(|e| {
            RentaldeskError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        let message = Message::from(reply.message);
        Ok(match (reply.prompt_eval_count, reply.eval_count) {
            (0, 0) => CompletionResponse::new(message),
            (prompt, completion) => {
                CompletionResponse::with_usage(message, TokenUsage::new(prompt, completion))
            }
        })
    }
}
