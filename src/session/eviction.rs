//! Session eviction policies
//!
//! The registry asks its policy two questions: whether a session that has
//! been idle for a while should go, and how many sessions it may hold at
//! most. Sessions with a turn in flight are never evicted.

use crate::config::{EvictionKind, SessionConfig};
use std::sync::Arc;
use std::time::Duration;

/// Decides which idle sessions the registry drops
pub trait EvictionPolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether a session idle for `idle_for` should be dropped
    fn is_expired(&self, idle_for: Duration) -> bool;

    /// Maximum number of sessions, if bounded
    fn capacity(&self) -> Option<usize>;
}

/// Keeps every session until it is explicitly reset
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl EvictionPolicy for Unbounded {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_expired(&self, _idle_for: Duration) -> bool {
        false
    }

    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// Drops sessions idle for longer than `ttl` and, when `max_sessions` is
/// set, the least recently used ones beyond that count
#[derive(Debug, Clone, Copy)]
pub struct IdleLru {
    /// Idle time after which a session expires
    pub ttl: Duration,
    /// Upper bound on live sessions, `None` for no bound
    pub max_sessions: Option<usize>,
}

impl EvictionPolicy for IdleLru {
    fn name(&self) -> &'static str {
        "idle_lru"
    }

    fn is_expired(&self, idle_for: Duration) -> bool {
        idle_for >= self.ttl
    }

    fn capacity(&self) -> Option<usize> {
        self.max_sessions
    }
}

/// Builds the configured policy
pub fn from_config(config: &SessionConfig) -> Arc<dyn EvictionPolicy> {
    match config.eviction {
        EvictionKind::None => Arc::new(Unbounded),
        EvictionKind::IdleLru => Arc::new(IdleLru {
            ttl: Duration::from_secs(config.idle_ttl_seconds),
            max_sessions: (config.max_sessions > 0).then_some(config.max_sessions),
        }),
    }
}
