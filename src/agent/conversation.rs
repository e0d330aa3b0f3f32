//! Per-session conversation history
//!
//! A [`Conversation`] holds the system prompt and the exchange history of one
//! customer. History is pruned at turn boundaries once the estimated token
//! count crosses a threshold; pruned turns are replaced by a short summary of
//! what the customer asked so far.

use crate::config::ConversationConfig;
use crate::providers::{Message, Role, TokenUsage, ToolCall};

/// Conversation history with token tracking and pruning
///
/// Token counts use a characters / 4 heuristic. Provider-reported usage is
/// accumulated separately and only reported, never used for pruning.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    system_prompt: Option<String>,
    messages: Vec<Message>,
    token_count: usize,
    max_tokens: usize,
    min_retain_turns: usize,
    prune_threshold: f32,
    provider_usage: Option<TokenUsage>,
}

impl Conversation {
    /// Creates an empty conversation with the configured limits
    ///
    /// # Examples
    ///
    /// ```
    /// use rentaldesk::agent::Conversation;
    /// use rentaldesk::config::ConversationConfig;
    ///
    /// let conversation = Conversation::new(&ConversationConfig::default());
    /// assert!(conversation.is_empty());
    /// assert_eq!(conversation.token_count(), 0);
    /// ```
    pub fn new(config: &ConversationConfig) -> Self {
        Self {
            system_prompt: None,
            messages: Vec::new(),
            token_count: 0,
            max_tokens: config.max_tokens,
            min_retain_turns: config.min_retain_turns.max(1),
            prune_threshold: config.prune_threshold.clamp(0.0, 1.0),
            provider_usage: None,
        }
    }

    /// Sets the system prompt sent ahead of every request
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Adds a customer message, pruning older turns first when needed
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.prune_if_needed();
        self.push(Message::user(content));
    }

    /// Adds a final assistant answer
    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// Adds an assistant message that requests tool calls
    pub fn add_tool_calls(&mut self, content: Option<String>, tool_calls: Vec<ToolCall>) {
        let mut message = Message::assistant_with_tools(tool_calls);
        message.content = content.filter(|c| !c.is_empty());
        self.push(message);
    }

    /// Adds the result of one tool call
    pub fn add_tool_result(&mut self, tool_call_id: impl Into<String>, content: impl Into<String>) {
        self.push(Message::tool_result(tool_call_id, content));
    }

    fn push(&mut self, message: Message) {
        self.token_count += message_tokens(&message);
        self.messages.push(message);
    }

    /// Messages to send to the provider, system prompt first
    pub fn request_messages(&self) -> Vec<Message> {
        self.system_prompt
            .iter()
            .map(Message::system)
            .chain(self.messages.iter().cloned())
            .collect()
    }

    /// History without the system prompt
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of customer messages in the retained history
    pub fn turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    /// Estimated token count of the retained history
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Returns the number of tokens remaining before hitting the maximum
    pub fn remaining_tokens(&self) -> usize {
        self.max_tokens.saturating_sub(self.token_count)
    }

    /// Returns the number of messages in the history
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the history has no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Accumulates provider-reported token usage
    pub fn record_usage(&mut self, usage: &TokenUsage) {
        self.provider_usage = Some(match self.provider_usage {
            Some(existing) => TokenUsage::new(
                existing.prompt_tokens + usage.prompt_tokens,
                existing.completion_tokens + usage.completion_tokens,
            ),
            None => *usage,
        });
    }

    /// Accumulated provider-reported token usage
    pub fn provider_usage(&self) -> Option<TokenUsage> {
        self.provider_usage
    }

    /// Drops whole turns from the front while keeping `min_retain_turns`
    ///
    /// Cuts only happen right before a customer message, so tool calls always
    /// stay next to their results.
    fn prune_if_needed(&mut self) {
        let threshold = (self.max_tokens as f64 * f64::from(self.prune_threshold)) as usize;
        if self.token_count <= threshold {
            return;
        }

        let user_positions: Vec<usize> = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::User)
            .map(|(i, _)| i)
            .collect();

        // Room for the incoming turn.
        let keep = self.min_retain_turns.saturating_sub(1);
        if user_positions.len() <= keep {
            return;
        }
        let cut = user_positions[user_positions.len() - keep.max(1)];
        let cut = if keep == 0 { self.messages.len() } else { cut };
        if cut == 0 {
            return;
        }

        let pruned: Vec<Message> = self.messages.drain(..cut).collect();
        let mut kept = vec![Message::system(summarize(&pruned))];
        kept.append(&mut self.messages);
        self.messages = kept;
        self.token_count = self.messages.iter().map(message_tokens).sum();

        tracing::debug!(
            pruned = pruned.len(),
            retained = self.messages.len(),
            "Pruned conversation history"
        );
    }
}

/// Questions listed in a pruning summary, most recent last
const SUMMARY_QUESTIONS: usize = 10;

fn summarize(pruned: &[Message]) -> String {
    let mut questions: Vec<String> = Vec::new();
    for message in pruned {
        let Some(content) = &message.content else {
            continue;
        };
        match message.role {
            Role::User => questions.push(format!("- {}", truncate_string(content, 100))),
            // A previous summary already lists older questions.
            Role::System => questions.extend(
                content
                    .lines()
                    .filter(|l| l.starts_with("- "))
                    .map(str::to_string),
            ),
            _ => {}
        }
    }

    let skip = questions.len().saturating_sub(SUMMARY_QUESTIONS);
    let mut summary = String::from("Earlier in this conversation the customer asked:\n");
    for question in &questions[skip..] {
        summary.push_str(question);
        summary.push('\n');
    }
    summary
}

fn message_tokens(message: &Message) -> usize {
    let content = message.content.as_deref().map(estimate_tokens).unwrap_or(0);
    let calls: usize = message
        .tool_calls
        .iter()
        .flatten()
        .map(|call| {
            estimate_tokens(&call.function.name) + estimate_tokens(&call.function.arguments)
        })
        .sum();
    content + calls
}

/// Estimates token count for a string using characters / 4
fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

/// Truncates a string to a maximum number of characters, adding an ellipsis
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let mut truncated = s.chars().take(max_len.saturating_sub(3)).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}
