//! Orchestrated request handling
//!
//! [`RequestHandler::handle`] turns one `(user_id, message)` pair into
//! exactly one [`RequestOutcome`]:
//!
//! 1. empty fields are rejected before any session is touched
//! 2. the customer's session is fetched or created and locked for the turn
//! 3. the pacer runs before every attempt
//! 4. the agent runs a full turn on a copy of the conversation, which is
//!    committed only when the turn succeeds
//! 5. throttling failures are retried with backoff until the attempt budget
//!    runs out; everything else fails at once
//!
//! An optional deadline bounds the whole call.

pub mod pacing;
pub mod retry;

pub use pacing::{FixedDelay, MinInterval, NoPacing, Pacer};
pub use retry::{classify, FailureClass, RetryPolicy};

use crate::config::HandlerConfig;
use crate::session::{Session, SessionRegistry};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Why a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing or empty request fields
    Validation,
    /// Upstream throttling
    RateLimited,
    /// Throttling persisted through every attempt
    RetriesExhausted,
    /// Any other provider, tool or session failure
    Upstream,
    /// The request deadline passed
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Validation => "validation",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::RetriesExhausted => "retries_exhausted",
            FailureKind::Upstream => "upstream",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// A classified failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Category
    pub kind: FailureKind,
    /// Underlying cause
    pub message: String,
    /// Attempts made before giving up
    pub attempts: u32,
}

impl Failure {
    fn new(kind: FailureKind, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts,
        }
    }

    /// Whether the caller sent a malformed request
    pub fn is_validation(&self) -> bool {
        self.kind == FailureKind::Validation
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} attempt(s): {}",
            self.kind, self.attempts, self.message
        )
    }
}

/// Result of one orchestrated turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The agent's final answer, unchanged
    Success(String),
    /// A throttled attempt; only seen inside the retry loop
    RetryableFailure(Failure),
    /// A failure surfaced to the caller
    TerminalFailure(Failure),
}

impl RequestOutcome {
    /// Whether the outcome carries an answer
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success(_))
    }

    /// The failure, if any
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            RequestOutcome::Success(_) => None,
            RequestOutcome::RetryableFailure(f) | RequestOutcome::TerminalFailure(f) => Some(f),
        }
    }
}

/// Drives agent turns for incoming messages
pub struct RequestHandler {
    registry: Arc<SessionRegistry>,
    pacer: Arc<dyn Pacer>,
    retry: RetryPolicy,
    deadline: Option<Duration>,
}

impl RequestHandler {
    /// Create a handler without a deadline
    pub fn new(registry: Arc<SessionRegistry>, pacer: Arc<dyn Pacer>, retry: RetryPolicy) -> Self {
        Self {
            registry,
            pacer,
            retry,
            deadline: None,
        }
    }

    /// Create a handler from configuration
    pub fn from_config(registry: Arc<SessionRegistry>, config: &HandlerConfig) -> Self {
        Self::new(
            registry,
            pacing::from_config(&config.pacing),
            RetryPolicy::from_config(&config.retry),
        )
        .with_deadline(config.request_deadline())
    }

    /// Bounds the total time of every `handle` call
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline).filter(|d| !d.is_zero());
        self
    }

    /// Session registry the handler works on
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handles one message for one customer
    ///
    /// Never returns [`RequestOutcome::RetryableFailure`]; an exhausted
    /// retry budget becomes a terminal failure.
    pub async fn handle(&self, user_id: &str, message: &str) -> RequestOutcome {
        if user_id.trim().is_empty() {
            return RequestOutcome::TerminalFailure(Failure::new(
                FailureKind::Validation,
                "user_id must not be empty",
                0,
            ));
        }
        if message.trim().is_empty() {
            return RequestOutcome::TerminalFailure(Failure::new(
                FailureKind::Validation,
                "message must not be empty",
                0,
            ));
        }

        info!(user_id, "Received message");

        match self.deadline {
            None => self.run(user_id, message).await,
            Some(deadline) => tokio::time::timeout(deadline, self.run(user_id, message))
                .await
                .unwrap_or_else(|_| {
                    error!(user_id, deadline_ms = deadline.as_millis() as u64, "Request timed out");
                    RequestOutcome::TerminalFailure(Failure::new(
                        FailureKind::Timeout,
                        format!("request exceeded {} ms", deadline.as_millis()),
                        0,
                    ))
                }),
        }
    }

    async fn run(&self, user_id: &str, message: &str) -> RequestOutcome {
        let handle = match self.registry.get_or_create(user_id).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(user_id, error = %format!("{:#}", e), "Cannot create session");
                return RequestOutcome::TerminalFailure(Failure::new(
                    FailureKind::Upstream,
                    e.to_string(),
                    0,
                ));
            }
        };
        let mut session = handle.lock().await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&mut session, message, attempt).await {
                RequestOutcome::RetryableFailure(failure) => {
                    if !self.retry.allows_retry_after(attempt) {
                        error!(
                            user_id,
                            attempts = attempt,
                            cause = %failure.message,
                            "Rate limit persisted, giving up"
                        );
                        return RequestOutcome::TerminalFailure(Failure::new(
                            FailureKind::RetriesExhausted,
                            failure.message,
                            attempt,
                        ));
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        user_id,
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Rate limit hit, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn attempt(&self, session: &mut Session, message: &str, attempt: u32) -> RequestOutcome {
        self.pacer.pace().await;

        let agent = session.agent();
        let mut conversation = session.conversation().clone();

        match agent.run_turn(&mut conversation, message).await {
            Ok(text) => {
                session.commit(conversation);
                if attempt > 1 {
                    info!(user_id = session.user_id(), attempt, "Recovered after retries");
                }
                RequestOutcome::Success(text)
            }
            Err(e) => {
                let cause = format!("{:#}", e);
                match classify(&e) {
                    FailureClass::Retryable => RequestOutcome::RetryableFailure(Failure::new(
                        FailureKind::RateLimited,
                        cause,
                        attempt,
                    )),
                    FailureClass::Terminal => {
                        error!(user_id = session.user_id(), attempt, cause = %cause, "Turn failed");
                        RequestOutcome::TerminalFailure(Failure::new(
                            FailureKind::Upstream,
                            cause,
                            attempt,
                        ))
                    }
                }
            }
        }
    }
}
