//! Provider-neutral conversation types and the [`Provider`] trait
//!
//! The agent loop speaks only these types; each adapter translates them to
//! its own wire format.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Who authored a [`Message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions and pruning summaries
    System,
    /// The customer
    User,
    /// The model, either answering or requesting tool calls
    Assistant,
    /// Output of one tool call
    Tool,
}

impl Role {
    /// Wire name shared by the chat-style provider APIs
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<&str> for Role {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// One entry of the conversation sent to a provider
///
/// Assistant messages carry either text, tool calls, or both. Tool messages
/// point back at the call they answer through `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author
    pub role: Role,
    /// Text, absent for pure tool-call messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Calls requested by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Call answered by a tool message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// A customer message
    ///
    /// # Examples
    ///
    /// ```
    /// use rentaldesk::providers::{Message, Role};
    ///
    /// let msg = Message::user("Show me action movies from 2005");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// A final assistant answer
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// A system instruction
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// The output of the tool call `tool_call_id`
    ///
    /// # Examples
    ///
    /// ```
    /// use rentaldesk::providers::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "[{\"title\":\"ACADEMY DINOSAUR\"}]");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id.as_deref(), Some("call_123"));
    /// ```
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::text(Role::Tool, content)
        }
    }

    /// An assistant message requesting tool calls
    pub fn assistant_with_tools(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Whether the message requests at least one tool call
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}

/// Tool name plus JSON-encoded arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name as registered
    pub name: String,
    /// Arguments as a JSON object string
    pub arguments: String,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier the tool result must echo
    pub id: String,
    /// What to call
    pub function: FunctionCall,
}

impl ToolCall {
    /// Builds a call with a freshly generated id
    pub fn generated(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Provider-reported token counts for one completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens
    pub prompt_tokens: usize,
    /// Output tokens
    pub completion_tokens: usize,
    /// Sum of both
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Usage with the total filled in
    ///
    /// # Examples
    ///
    /// ```
    /// use rentaldesk::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// One model reply
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Assistant message, text or tool calls
    pub message: Message,
    /// Token counts, when the provider reports them
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Reply without usage data
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
        }
    }

    /// Reply with usage data
    pub fn with_usage(message: Message, usage: TokenUsage) -> Self {
        Self {
            message,
            usage: Some(usage),
        }
    }
}

/// A chat model able to call tools
///
/// Implementations must report upstream throttling as
/// [`crate::error::RentaldeskError::RateLimited`] so the request handler can
/// retry it.
///
/// # Examples
///
/// ```no_run
/// use rentaldesk::providers::{Provider, Message, CompletionResponse};
/// use rentaldesk::error::Result;
/// use async_trait::async_trait;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     async fn complete(
///         &self,
///         messages: &[Message],
///         _tools: &[serde_json::Value],
///     ) -> Result<CompletionResponse> {
///         let last = messages.last().and_then(|m| m.content.clone()).unwrap_or_default();
///         Ok(CompletionResponse::new(Message::assistant(last)))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider identifier used in logs
    fn name(&self) -> &str;

    /// Produces the next assistant message for `messages`
    ///
    /// `tools` holds definitions shaped `{name, description, parameters}`.
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::RateLimited` on throttling and
    /// `RentaldeskError::Provider` for every other upstream failure
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse>;
}

/// Drops tool result messages that have no matching assistant tool call
///
/// Pruning can remove the assistant message that issued a call while keeping
/// its result; providers reject such sequences.
pub fn validate_message_sequence(messages: &[Message]) -> Vec<Message> {
    let issued: HashSet<&str> = messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .filter_map(|m| m.tool_calls.as_ref())
        .flatten()
        .map(|call| call.id.as_str())
        .collect();

    messages
        .iter()
        .filter(|message| {
            if message.role != Role::Tool {
                return true;
            }
            let answered = message
                .tool_call_id
                .as_deref()
                .is_some_and(|id| issued.contains(id));
            if !answered {
                tracing::warn!(
                    tool_call_id = message.tool_call_id.as_deref().unwrap_or("<none>"),
                    "Dropping tool result without a matching call"
                );
            }
            answered
        })
        .cloned()
        .collect()
}

/// Finds the function name of the tool call with the given id
pub fn tool_name_for_call<'a>(messages: &'a [Message], tool_call_id: &str) -> Option<&'a str> {
    messages
        .iter()
        .filter_map(|m| m.tool_calls.as_ref())
        .flatten()
        .find(|call| call.id == tool_call_id)
        .map(|call| call.function.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: "{}".to_string(),
            },
        }
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("hi").role, Role::Assistant);
        assert_eq!(Message::system("hi").role, "system");
        assert!(!Message::assistant("hi").has_tool_calls());

        let with_tools = Message::assistant_with_tools(vec![call("c1", "get-film-details")]);
        assert!(with_tools.content.is_none());
        assert!(with_tools.has_tool_calls());
        assert!(!Message::assistant_with_tools(Vec::new()).has_tool_calls());
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json = serde_json::to_value(Message::user("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(Message::tool_result("c1", "[]")).unwrap();
        assert_eq!(json["role"], "tool");
        let role: Role = serde_json::from_value(serde_json::json!("assistant")).unwrap();
        assert_eq!(role, Role::Assistant);
        assert_eq!(Role::System.to_string(), "system");
    }

    #[test]
    fn test_generated_tool_call_ids_are_unique() {
        let a = ToolCall::generated("films-by-year", "{}");
        let b = ToolCall::generated("films-by-year", "{}");
        assert!(a.id.starts_with("call_"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_completion_response_with_usage() {
        let response =
            CompletionResponse::with_usage(Message::assistant("ok"), TokenUsage::new(10, 5));
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(15));
        assert!(CompletionResponse::new(Message::assistant("ok")).usage.is_none());
    }

    #[test]
    fn test_validate_message_sequence_drops_orphans() {
        let messages = vec![
            Message::user("find ACADEMY DINOSAUR"),
            Message::tool_result("orphan", "stale"),
            Message::assistant_with_tools(vec![call("c1", "search-films-by-title")]),
            Message::tool_result("c1", "[...]"),
            Message {
                role: Role::Tool,
                content: Some("no id".to_string()),
                tool_calls: None,
                tool_call_id: None,
            },
        ];

        let validated = validate_message_sequence(&messages);
        assert_eq!(validated.len(), 3);
        assert_eq!(validated[2].tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_tool_name_for_call() {
        let messages = vec![
            Message::assistant_with_tools(vec![call("c1", "films-by-year")]),
            Message::tool_result("c1", "[]"),
        ];
        assert_eq!(tool_name_for_call(&messages, "c1"), Some("films-by-year"));
        assert_eq!(tool_name_for_call(&messages, "missing"), None);
    }
}
