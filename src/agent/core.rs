//! Agent core implementation with the tool-calling loop
//!
//! One turn of the agent:
//! - sends the conversation and the tool definitions to the provider
//! - executes every tool call the provider requests and feeds results back
//! - stops at the first answer without tool calls, or at `max_turns`

use crate::config::AgentConfig;
use crate::error::{Result, RentaldeskError};
use crate::prompts;
use crate::providers::{Provider, ToolCall};
use crate::tools::{ToolRegistry, ToolResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{AgentFactory, ChatAgent, Conversation};

/// Tool-calling DVD rental assistant bound to one provider and tool set
///
/// # Examples
///
/// ```ignore
/// use rentaldesk::agent::{Agent, ChatAgent};
/// use rentaldesk::config::AgentConfig;
///
/// # async fn example() -> rentaldesk::error::Result<()> {
/// # let provider = unimplemented!();
/// # let tools = unimplemented!();
/// let agent = Agent::new(provider, tools, AgentConfig::default())?;
/// let mut conversation = agent.new_conversation();
/// let answer = agent.run_turn(&mut conversation, "Show me action movies from 2005").await?;
/// # Ok(())
/// # }
/// ```
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Creates a new agent instance
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Config` if `max_turns` is zero
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Result<Self> {
        if config.max_turns == 0 {
            return Err(
                RentaldeskError::Config("max_turns must be greater than 0".to_string()).into(),
            );
        }

        Ok(Self {
            provider,
            tools,
            config,
        })
    }

    /// Returns the number of registered tools
    pub fn num_tools(&self) -> usize {
        self.tools.len()
    }

    /// Executes a single tool call
    ///
    /// Unknown tools and unparsable arguments are reported back to the model
    /// as failed results.
    ///
    /// # Errors
    ///
    /// Returns error only when the tool itself cannot run
    async fn execute_tool_call(&self, tool_call: &ToolCall) -> Result<ToolResult> {
        let tool_name = &tool_call.function.name;
        debug!(tool = %tool_name, "Executing tool");

        let Some(tool_executor) = self.tools.get(tool_name) else {
            warn!(tool = %tool_name, "Model requested an unknown tool");
            return Ok(ToolResult::error(format!("Tool not found: {}", tool_name)));
        };

        let args: serde_json::Value = if tool_call.function.arguments.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            match serde_json::from_str(&tool_call.function.arguments) {
                Ok(args) => args,
                Err(e) => {
                    return Ok(ToolResult::error(format!(
                        "Failed to parse tool arguments for '{}': {}",
                        tool_name, e
                    )))
                }
            }
        };

        let result = tool_executor.execute(args).await?;

        let original_len = result.output.len();
        let result = result.truncate_if_needed(self.config.max_output_size);
        if result.truncated {
            debug!(
                "Tool output truncated from {} to {} bytes",
                original_len, self.config.max_output_size
            );
        }

        Ok(result)
    }
}

#[async_trait]
impl ChatAgent for Agent {
    fn new_conversation(&self) -> Conversation {
        Conversation::new(&self.config.conversation)
            .with_system_prompt(prompts::system_prompt(self.config.prompt_style))
    }

    async fn run_turn(&self, conversation: &mut Conversation, message: &str) -> Result<String> {
        let start_time = Instant::now();
        conversation.add_user_message(message);

        let tool_definitions = self.tools.all_definitions();

        for iteration in 1..=self.config.max_turns {
            debug!(
                "Iteration {}/{}, tokens: {}",
                iteration,
                self.config.max_turns,
                conversation.token_count()
            );

            let response = self
                .provider
                .complete(&conversation.request_messages(), &tool_definitions)
                .await?;
            if let Some(usage) = &response.usage {
                conversation.record_usage(usage);
            }

            let message = response.message;
            match message.tool_calls {
                Some(tool_calls) if !tool_calls.is_empty() => {
                    debug!("Executing {} tool calls", tool_calls.len());
                    conversation.add_tool_calls(message.content, tool_calls.clone());

                    for tool_call in &tool_calls {
                        let result = self.execute_tool_call(tool_call).await?;
                        conversation.add_tool_result(&tool_call.id, result.to_message());
                    }
                }
                _ => {
                    let Some(content) = message.content.filter(|c| !c.trim().is_empty()) else {
                        warn!("Provider returned neither content nor tool calls");
                        return Err(RentaldeskError::Provider(
                            "Provider returned invalid response (no content or tool calls)"
                                .to_string(),
                        )
                        .into());
                    };

                    conversation.add_assistant_message(content.clone());
                    info!(
                        provider = self.provider.name(),
                        iterations = iteration,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Agent turn completed"
                    );
                    return Ok(content);
                }
            }
        }

        warn!("Maximum iterations ({}) exceeded", self.config.max_turns);
        Err(RentaldeskError::MaxIterationsExceeded {
            limit: self.config.max_turns,
            message: format!(
                "Agent exceeded maximum iteration limit of {}",
                self.config.max_turns
            ),
        }
        .into())
    }
}

/// Builds a fresh [`Agent`] for every new session
///
/// All agents share the same provider connection and tool registry.
pub struct AssistantFactory {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl AssistantFactory {
    /// Create a factory
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }
}

impl AgentFactory for AssistantFactory {
    fn create(&self) -> Result<Arc<dyn ChatAgent>> {
        let agent = Agent::new(self.provider.clone(), self.tools.clone(), self.config.clone())?;
        Ok(Arc::new(agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionResponse, FunctionCall, Message, TokenUsage};
    use crate::tools::ToolExecutor;

    /// Mock provider for testing
    struct MockProvider {
        responses: Vec<Message>,
        call_count: std::sync::Mutex<usize>,
        seen: std::sync::Mutex<Vec<Vec<Message>>>,
    }

    impl MockProvider {
        fn new(responses: Vec<Message>) -> Arc<Self> {
            Arc::new(Self {
                responses,
                call_count: std::sync::Mutex::new(0),
                seen: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[serde_json::Value],
        ) -> Result<CompletionResponse> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let mut count = self.call_count.lock().unwrap();
            let index = *count;
            *count += 1;

            let message = self
                .responses
                .get(index)
                .cloned()
                .unwrap_or_else(|| Message::assistant("Done"));
            Ok(CompletionResponse::with_usage(message, TokenUsage::new(10, 2)))
        }
    }

    struct AvailabilityTool;

    #[async_trait]
    impl ToolExecutor for AvailabilityTool {
        fn tool_definition(&self) -> serde_json::Value {
            serde_json::json!({
                "name": "get-film-availability",
                "description": "Copies in stock",
                "parameters": {"type": "object", "properties": {"film_id": {"type": "integer"}}}
            })
        }

        async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
            Ok(ToolResult::success(format!("film {} has 4 copies", args["film_id"])))
        }
    }

    fn tools() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register("get-film-availability", Arc::new(AvailabilityTool))
            .unwrap();
        Arc::new(registry)
    }

    fn call(name: &str, arguments: &str) -> Message {
        Message::assistant_with_tools(vec![ToolCall {
            id: "call_1".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }])
    }

    #[test]
    fn test_agent_creation_with_zero_max_turns_fails() {
        let config = AgentConfig {
            max_turns: 0,
            ..Default::default()
        };
        assert!(Agent::new(MockProvider::new(vec![]), tools(), config).is_err());
    }

    #[tokio::test]
    async fn test_run_turn_plain_answer() {
        let provider = MockProvider::new(vec![Message::assistant("🎬 Found 3 action movies")]);
        let agent = Agent::new(provider.clone(), tools(), AgentConfig::default()).unwrap();
        let mut conversation = agent.new_conversation();

        let answer = agent
            .run_turn(&mut conversation, "Show me action movies from 2005")
            .await
            .unwrap();

        assert_eq!(answer, "🎬 Found 3 action movies");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.provider_usage().unwrap().total_tokens, 12);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0][0].role, "system");
    }

    #[tokio::test]
    async fn test_run_turn_executes_tools_and_keeps_calls_in_history() {
        let provider = MockProvider::new(vec![
            call("get-film-availability", r#"{"film_id": 1}"#),
            Message::assistant("📦 4 copies in stock"),
        ]);
        let agent = Agent::new(provider.clone(), tools(), AgentConfig::default()).unwrap();
        let mut conversation = agent.new_conversation();

        let answer = agent
            .run_turn(&mut conversation, "Is film 1 available?")
            .await
            .unwrap();

        assert_eq!(answer, "📦 4 copies in stock");
        assert_eq!(provider.call_count(), 2);
        let roles: Vec<&str> = conversation.messages().iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "tool", "assistant"]);
        assert_eq!(
            conversation.messages()[2].content.as_deref(),
            Some("film 1 has 4 copies")
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let provider = MockProvider::new(vec![
            call("drop-table", "{}"),
            Message::assistant("Sorry, I cannot do that"),
        ]);
        let agent = Agent::new(provider, tools(), AgentConfig::default()).unwrap();
        let mut conversation = agent.new_conversation();

        agent.run_turn(&mut conversation, "Delete everything").await.unwrap();

        let tool_message = &conversation.messages()[2];
        assert!(tool_message.content.as_deref().unwrap().contains("Tool not found"));
    }

    #[tokio::test]
    async fn test_max_turns_exceeded() {
        let responses = (0..5)
            .map(|_| call("get-film-availability", r#"{"film_id": 1}"#))
            .collect();
        let config = AgentConfig {
            max_turns: 3,
            ..Default::default()
        };
        let agent = Agent::new(MockProvider::new(responses), tools(), config).unwrap();
        let mut conversation = agent.new_conversation();

        let err = agent.run_turn(&mut conversation, "loop").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RentaldeskError>(),
            Some(RentaldeskError::MaxIterationsExceeded { limit: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_response_is_an_error() {
        let agent = Agent::new(
            MockProvider::new(vec![Message::assistant("  ")]),
            tools(),
            AgentConfig::default(),
        )
        .unwrap();
        let mut conversation = agent.new_conversation();
        assert!(agent.run_turn(&mut conversation, "hello").await.is_err());
    }

    #[test]
    fn test_factory_creates_independent_agents() {
        let factory = AssistantFactory::new(
            MockProvider::new(vec![]),
            tools(),
            AgentConfig::default(),
        );
        let first = factory.create().unwrap();
        let second = factory.create().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(first.new_conversation().is_empty());
    }
}
