//! Session registry
//!
//! Maps user ids to sessions. Lookups take a read lock; creation takes the
//! write lock and re-checks, so concurrent first messages from one customer
//! still produce a single session. Sessions are created lazily, removed on
//! reset, and otherwise only dropped by the configured eviction policy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::{EvictionPolicy, Session, SessionHandle, Unbounded};
use crate::agent::AgentFactory;
use crate::error::Result;

struct Slot {
    session: SessionHandle,
    last_used_ms: AtomicU64,
}

impl Slot {
    /// A handle held outside the registry means a turn is queued or running.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }
}

/// Point-in-time view of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Owner of the session
    pub user_id: String,
    /// Time since the session was last handed out
    pub idle_for: Duration,
    /// Whether a turn currently holds the session
    pub in_use: bool,
}

/// Owns every live session
pub struct SessionRegistry {
    factory: Arc<dyn AgentFactory>,
    policy: Arc<dyn EvictionPolicy>,
    sessions: RwLock<HashMap<String, Slot>>,
    epoch: Instant,
}

impl SessionRegistry {
    /// Creates a registry that keeps sessions until reset
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self::with_policy(factory, Arc::new(Unbounded))
    }

    /// Creates a registry with an eviction policy
    pub fn with_policy(factory: Arc<dyn AgentFactory>, policy: Arc<dyn EvictionPolicy>) -> Self {
        Self {
            factory,
            policy,
            sessions: RwLock::new(HashMap::new()),
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Returns the session for `user_id`, creating it on first use
    ///
    /// # Errors
    ///
    /// Returns error if the agent factory cannot build a handle
    pub async fn get_or_create(&self, user_id: &str) -> Result<SessionHandle> {
        {
            let sessions = self.sessions.read().await;
            if let Some(slot) = sessions.get(user_id) {
                slot.last_used_ms.store(self.now_ms(), Ordering::Relaxed);
                return Ok(slot.session.clone());
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(slot) = sessions.get(user_id) {
            slot.last_used_ms.store(self.now_ms(), Ordering::Relaxed);
            return Ok(slot.session.clone());
        }

        let agent = self.factory.create()?;
        let session: SessionHandle =
            Arc::new(tokio::sync::Mutex::new(Session::new(user_id, agent)));
        sessions.insert(
            user_id.to_string(),
            Slot {
                session: session.clone(),
                last_used_ms: AtomicU64::new(self.now_ms()),
            },
        );
        tracing::info!(user_id, sessions = sessions.len(), "Created session");

        if let Some(capacity) = self.policy.capacity() {
            self.enforce_capacity(&mut sessions, capacity, user_id);
        }

        Ok(session)
    }

    /// Removes the session for `user_id`, reporting whether one existed
    pub async fn reset(&self, user_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(user_id).is_some();
        if removed {
            tracing::info!(user_id, "Reset session");
        } else {
            tracing::debug!(user_id, "Reset requested for unknown session");
        }
        removed
    }

    /// Whether a session exists for `user_id`
    pub async fn contains(&self, user_id: &str) -> bool {
        self.sessions.read().await.contains_key(user_id)
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Summaries of every live session, most recently used first
    pub async fn snapshot(&self) -> Vec<SessionSummary> {
        let now = self.now_ms();
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .iter()
            .map(|(user_id, slot)| SessionSummary {
                user_id: user_id.clone(),
                idle_for: Duration::from_millis(
                    now.saturating_sub(slot.last_used_ms.load(Ordering::Relaxed)),
                ),
                in_use: slot.in_use(),
            })
            .collect();
        summaries.sort_by_key(|s| s.idle_for);
        summaries
    }

    /// Drops sessions the policy considers expired
    ///
    /// Returns how many sessions were removed.
    pub async fn evict_idle(&self) -> usize {
        let now = self.now_ms();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|user_id, slot| {
            let idle = Duration::from_millis(
                now.saturating_sub(slot.last_used_ms.load(Ordering::Relaxed)),
            );
            let keep = slot.in_use() || !self.policy.is_expired(idle);
            if !keep {
                tracing::debug!(
                    user_id = %user_id,
                    idle_ms = idle.as_millis() as u64,
                    "Evicting idle session"
                );
            }
            keep
        });
        before - sessions.len()
    }

    fn enforce_capacity(&self, sessions: &mut HashMap<String, Slot>, capacity: usize, keep: &str) {
        if sessions.len() <= capacity {
            return;
        }

        let mut candidates: Vec<(String, u64)> = sessions
            .iter()
            .filter(|(user_id, slot)| user_id.as_str() != keep && !slot.in_use())
            .map(|(user_id, slot)| (user_id.clone(), slot.last_used_ms.load(Ordering::Relaxed)))
            .collect();
        candidates.sort_by_key(|(_, last_used)| *last_used);

        let excess = sessions.len() - capacity;
        for (user_id, _) in candidates.into_iter().take(excess) {
            sessions.remove(&user_id);
            tracing::info!(
                user_id = %user_id,
                policy = self.policy.name(),
                "Evicted least recently used session"
            );
        }
    }

    /// Runs [`evict_idle`](Self::evict_idle) every `interval`
    ///
    /// The task ends once the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    let remaining = registry.len().await;
                    tracing::info!(evicted, remaining, "Swept idle sessions");
                }
            }
        })
    }
}
