//! Engine dispatcher with bounded retry
//!
//! Routes an engine action to the named governance engine. Transient
//! delivery failures are retried with backoff; an unknown engine name or a
//! rejection is surfaced immediately, since retrying cannot help.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::reliability::RetryPolicy;

use super::registry::{EngineError, EngineRegistry};
use super::EngineActionRequest;

/// Errors from a dispatch attempt
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No engine is registered under the name; a configuration problem
    #[error("unknown governance engine: {0}")]
    UnknownEngine(String),

    /// The engine refused the request outright
    #[error("engine rejected the request: {0}")]
    Rejected(String),

    /// All delivery attempts failed with transient errors
    #[error("dispatch failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Routes engine actions to registered engines
///
/// Holds no per-action state beyond the retry counter of an in-flight
/// dispatch; cloning is cheap.
#[derive(Clone)]
pub struct EngineDispatcher {
    registry: Arc<EngineRegistry>,
    retry_policy: RetryPolicy,
}

impl EngineDispatcher {
    /// Create a dispatcher with the default retry policy
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Create a dispatcher with a specific retry policy
    pub fn with_retry_policy(registry: Arc<EngineRegistry>, retry_policy: RetryPolicy) -> Self {
        Self {
            registry,
            retry_policy,
        }
    }

    /// Deliver a request to the named engine
    ///
    /// Returns once the engine has acknowledged the action. The completion
    /// itself arrives later through the request's reporter.
    #[instrument(skip(self, request), fields(action_id = %request.action_id))]
    pub async fn dispatch(
        &self,
        engine_name: &str,
        request: EngineActionRequest,
    ) -> Result<(), DispatchError> {
        let engine = self
            .registry
            .get(engine_name)
            .ok_or_else(|| DispatchError::UnknownEngine(engine_name.to_string()))?;

        let mut attempt: u32 = 1;
        loop {
            match engine.execute(request.clone()).await {
                Ok(()) => {
                    debug!(engine_name, attempt, "engine acknowledged action");
                    return Ok(());
                }
                Err(EngineError::Rejected(msg)) => {
                    return Err(DispatchError::Rejected(msg));
                }
                Err(EngineError::Unavailable(msg)) => {
                    if !self.retry_policy.has_attempts_remaining(attempt) {
                        return Err(DispatchError::Exhausted {
                            attempts: attempt,
                            last_error: msg,
                        });
                    }
                    attempt += 1;
                    let delay = self.retry_policy.delay_for_attempt(attempt);
                    warn!(
                        engine_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %msg,
                        "engine unavailable, retrying dispatch"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Best-effort delivery of a cancellation signal
    pub async fn notify_cancel(&self, engine_name: &str, action_id: Uuid) {
        if let Some(engine) = self.registry.get(engine_name) {
            engine.cancel(action_id).await;
        }
    }
}
