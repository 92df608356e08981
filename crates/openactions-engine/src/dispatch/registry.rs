//! Engine registry: name -> capability lookup
//!
//! The set of governance engines is open-ended and selected by name at run
//! time. Anything that can accept an engine action and eventually report
//! completion qualifies; there is no inheritance relationship between
//! engines.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::EngineActionRequest;

/// Error type for engine execution attempts
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine endpoint is temporarily unreachable; dispatch may retry
    #[error("engine temporarily unavailable: {0}")]
    Unavailable(String),

    /// The engine refused the request; retrying cannot help
    #[error("engine rejected the request: {0}")]
    Rejected(String),
}

impl EngineError {
    /// Whether dispatch should retry after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Unavailable(_))
    }
}

/// Capability interface for a governance engine
///
/// `execute` returning `Ok(())` is the engine's acknowledgment that it has
/// accepted the action; the scheduler then moves the record to in-progress.
/// The actual work happens afterwards, on the engine's own schedule, and
/// ends with a call to the request's [`CompletionReporter`].
#[async_trait]
pub trait GovernanceEngine: Send + Sync + 'static {
    /// Accept an engine action for execution
    async fn execute(&self, request: EngineActionRequest) -> Result<(), EngineError>;

    /// Advisory cancellation signal, best effort
    ///
    /// The record's cancelled status is authoritative regardless of whether
    /// the engine honors this.
    async fn cancel(&self, _action_id: Uuid) {}
}

/// Registry of governance engines, keyed by engine name
pub struct EngineRegistry {
    engines: DashMap<String, Arc<dyn GovernanceEngine>>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            engines: DashMap::new(),
        }
    }

    /// Register an engine under a name, replacing any previous registration
    pub fn register(&self, name: impl Into<String>, engine: Arc<dyn GovernanceEngine>) {
        self.engines.insert(name.into(), engine);
    }

    /// Remove an engine
    pub fn deregister(&self, name: &str) -> bool {
        self.engines.remove(name).is_some()
    }

    /// Look up an engine by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn GovernanceEngine>> {
        self.engines.get(name).map(|e| Arc::clone(&e))
    }

    /// Whether an engine is registered under the name
    pub fn contains(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    /// Names of all registered engines
    pub fn engine_names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of registered engines
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engine_names", &self.engine_names())
            .finish()
    }
}
