use async_trait::async_trait;
use rentaldesk::agent::{AgentFactory, ChatAgent, Conversation};
use rentaldesk::config::ConversationConfig;
use rentaldesk::handler::{NoPacing, Pacer, RequestHandler, RetryPolicy};
use rentaldesk::server::AppState;
use rentaldesk::session::SessionRegistry;
use rentaldesk::tools::ConnectivityCheck;
use rentaldesk::{RentaldeskError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Answers every message with the same text
#[allow(dead_code)]
pub struct FixedAgent {
    pub text: String,
}

#[allow(dead_code)]
impl FixedAgent {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl ChatAgent for FixedAgent {
    fn new_conversation(&self) -> Conversation {
        Conversation::new(&ConversationConfig::default())
    }

    async fn run_turn(&self, conversation: &mut Conversation, message: &str) -> Result<String> {
        conversation.add_user_message(message);
        conversation.add_assistant_message(self.text.clone());
        Ok(self.text.clone())
    }
}

/// Counts turns and records whether two turns ever overlapped
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingAgent {
    pub turns: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

#[async_trait]
impl ChatAgent for CountingAgent {
    fn new_conversation(&self) -> Conversation {
        Conversation::new(&ConversationConfig::default())
    }

    async fn run_turn(&self, conversation: &mut Conversation, message: &str) -> Result<String> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        conversation.add_user_message(message);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let n = self.turns.fetch_add(1, Ordering::SeqCst) + 1;
        conversation.add_assistant_message(format!("turn {}", n));

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("turn {}", n))
    }
}

/// Fails with a rate limit for the first `failures` attempts, then answers
#[allow(dead_code)]
pub struct ThrottledAgent {
    failures: usize,
    pub attempts: AtomicUsize,
}

#[allow(dead_code)]
impl ThrottledAgent {
    pub fn failing_times(failures: usize) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn always() -> Self {
        Self::failing_times(usize::MAX)
    }
}

#[async_trait]
impl ChatAgent for ThrottledAgent {
    fn new_conversation(&self) -> Conversation {
        Conversation::new(&ConversationConfig::default())
    }

    async fn run_turn(&self, conversation: &mut Conversation, message: &str) -> Result<String> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        conversation.add_user_message(message);
        if attempt <= self.failures {
            return Err(RentaldeskError::RateLimited(
                "429 Too Many Requests: quota exceeded".to_string(),
            )
            .into());
        }
        conversation.add_assistant_message("recovered");
        Ok("recovered".to_string())
    }
}

/// Fails every turn with a non-throttling error after touching the history
#[allow(dead_code)]
#[derive(Default)]
pub struct BrokenAgent {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl ChatAgent for BrokenAgent {
    fn new_conversation(&self) -> Conversation {
        Conversation::new(&ConversationConfig::default())
    }

    async fn run_turn(&self, conversation: &mut Conversation, message: &str) -> Result<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        conversation.add_user_message(message);
        Err(RentaldeskError::Provider("Gemini returned 400 Bad Request".to_string()).into())
    }
}

/// Never finishes within any reasonable deadline
#[allow(dead_code)]
pub struct SlowAgent;

#[async_trait]
impl ChatAgent for SlowAgent {
    fn new_conversation(&self) -> Conversation {
        Conversation::new(&ConversationConfig::default())
    }

    async fn run_turn(&self, _conversation: &mut Conversation, _message: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("too late".to_string())
    }
}

/// Hands out one shared agent and counts how many sessions asked for it
pub struct SharedAgentFactory {
    agent: Arc<dyn ChatAgent>,
    pub created: AtomicUsize,
}

#[allow(dead_code)]
impl SharedAgentFactory {
    pub fn new(agent: Arc<dyn ChatAgent>) -> Self {
        Self {
            agent,
            created: AtomicUsize::new(0),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl AgentFactory for SharedAgentFactory {
    fn create(&self) -> Result<Arc<dyn ChatAgent>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.agent.clone())
    }
}

/// Tool server probe with a fixed answer
#[allow(dead_code)]
pub struct StubToolbox {
    pub reachable: bool,
}

#[async_trait]
impl ConnectivityCheck for StubToolbox {
    async fn check(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(RentaldeskError::Toolbox("Cannot reach tool server".to_string()).into())
        }
    }
}

/// Dispatches immediately and counts how often it was asked to wait
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingPacer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Pacer for CountingPacer {
    async fn pace(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handler over a shared stub agent with the given pacing and retry policy
#[allow(dead_code)]
pub fn handler_with(
    agent: Arc<dyn ChatAgent>,
    pacer: Arc<dyn Pacer>,
    retry: RetryPolicy,
) -> (Arc<RequestHandler>, Arc<SharedAgentFactory>) {
    let factory = Arc::new(SharedAgentFactory::new(agent));
    let registry = Arc::new(SessionRegistry::new(factory.clone()));
    let handler = RequestHandler::new(registry, pacer, retry);
    (Arc::new(handler), factory)
}

/// Handler without pacing and with three immediate attempts
#[allow(dead_code)]
pub fn test_handler(agent: Arc<dyn ChatAgent>) -> (Arc<RequestHandler>, Arc<SharedAgentFactory>) {
    handler_with(
        agent,
        Arc::new(NoPacing),
        RetryPolicy::new(3, Duration::ZERO),
    )
}

#[allow(dead_code)]
pub fn test_state(agent: Arc<dyn ChatAgent>, reachable: bool) -> AppState {
    let (handler, _) = test_handler(agent);
    AppState::new(handler, Arc::new(StubToolbox { reachable }))
}
