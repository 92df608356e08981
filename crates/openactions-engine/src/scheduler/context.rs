//! Per-server runtime context
//!
//! Everything the scheduler and dispatcher need is carried explicitly in
//! one context object constructed once per logical server. There is no
//! ambient global state.

use std::sync::Arc;

use crate::dispatch::EngineRegistry;
use crate::persistence::GovernanceStore;
use crate::reliability::RetryPolicy;

/// Dependencies of one scheduler instance
#[derive(Clone)]
pub struct RuntimeContext {
    /// Name of the logical server, used in log output only
    pub server_name: String,

    /// Handle to the metadata tier
    pub store: Arc<dyn GovernanceStore>,

    /// Governance engines available for dispatch
    pub registry: Arc<EngineRegistry>,

    /// Retry behavior for transient dispatch failures
    pub retry_policy: RetryPolicy,
}

impl RuntimeContext {
    /// Create a context with the default retry policy
    pub fn new(
        server_name: impl Into<String>,
        store: Arc<dyn GovernanceStore>,
        registry: Arc<EngineRegistry>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            store,
            registry,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the dispatch retry policy
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("server_name", &self.server_name)
            .field("engines", &self.registry.engine_names())
            .finish()
    }
}
