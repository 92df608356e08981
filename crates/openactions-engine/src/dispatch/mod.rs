//! Dispatch protocol between the scheduler and governance engines
//!
//! Engines are capability objects registered by name. The scheduler hands an
//! engine a request carrying a [`CompletionReporter`]; the engine performs
//! the work and eventually reports a terminal status plus the guards it
//! emitted. Completion reports travel over a channel back to the scheduler
//! rather than re-entering caller stacks.

mod dispatcher;
mod registry;

use std::collections::{BTreeSet, HashMap};

use tokio::sync::mpsc;
use uuid::Uuid;

use openactions_contracts::{ActionTarget, EngineActionStatus};

pub use dispatcher::{DispatchError, EngineDispatcher};
pub use registry::{EngineError, EngineRegistry, GovernanceEngine};

/// A completion report travelling from an engine back to the scheduler
#[derive(Debug, Clone)]
pub struct CompletionMessage {
    pub action_id: Uuid,
    pub status: EngineActionStatus,
    pub completion_guards: BTreeSet<String>,
    pub target_outcomes: Vec<ActionTarget>,
    pub completion_message: Option<String>,
}

/// Error returned when a completion report cannot be delivered
#[derive(Debug, thiserror::Error)]
#[error("scheduler is no longer running, completion for action {action_id} dropped")]
pub struct CompletionSendError {
    pub action_id: Uuid,
}

/// Handle an engine uses to report the outcome of an action
///
/// Cheap to clone; each in-flight request carries its own copy.
#[derive(Debug, Clone)]
pub struct CompletionReporter {
    tx: mpsc::UnboundedSender<CompletionMessage>,
}

impl CompletionReporter {
    pub(crate) fn new(tx: mpsc::UnboundedSender<CompletionMessage>) -> Self {
        Self { tx }
    }

    /// Report a terminal status for an action
    ///
    /// Duplicate and late reports are tolerated; the scheduler treats them
    /// as no-ops. A report carrying a non-terminal status is discarded by
    /// the scheduler with a warning.
    pub fn report_completion(
        &self,
        action_id: Uuid,
        status: EngineActionStatus,
        completion_guards: BTreeSet<String>,
        target_outcomes: Vec<ActionTarget>,
        completion_message: Option<String>,
    ) -> Result<(), CompletionSendError> {
        self.tx
            .send(CompletionMessage {
                action_id,
                status,
                completion_guards,
                target_outcomes,
                completion_message,
            })
            .map_err(|_| CompletionSendError { action_id })
    }
}

/// The work handed to a governance engine
///
/// Not serializable: the reporter is an in-process capability. A remote
/// engine adapter would hold the reporter on its local end and forward the
/// rest over the wire.
#[derive(Debug, Clone)]
pub struct EngineActionRequest {
    pub action_id: Uuid,
    pub request_type: String,
    pub request_parameters: HashMap<String, String>,
    pub action_targets: Vec<ActionTarget>,
    pub received_guards: BTreeSet<String>,
    pub reporter: CompletionReporter,
}
