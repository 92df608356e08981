// Engine action DTOs: the execution-instance record, its state machine
// statuses and the action targets it operates on.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an engine action record
///
/// The normal path is `Requested -> Approved -> Waiting -> Activating ->
/// InProgress` followed by one of the terminal completion statuses.
/// `Cancelled` is reachable from any non-terminal status. Terminal statuses
/// have no outgoing transitions; an attempted transition out of one is a
/// no-op, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineActionStatus {
    /// Created, not yet claimed by the dispatcher
    Requested,

    /// Passed admission (the target engine exists and is enabled)
    Approved,

    /// Queued for dispatch (engine busy, or start time in the future)
    Waiting,

    /// Dispatch in flight, awaiting the engine's acknowledgment
    Activating,

    /// The engine has acknowledged and is executing
    InProgress,

    /// Work completed successfully
    Actioned,

    /// The request was not valid for the targeted elements
    Invalid,

    /// The engine chose not to act
    Ignored,

    /// Dispatch or execution failed
    Failed,

    /// Cancelled by the caller before completion
    Cancelled,
}

impl EngineActionStatus {
    /// Whether this status is terminal (no outgoing transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineActionStatus::Actioned
                | EngineActionStatus::Invalid
                | EngineActionStatus::Ignored
                | EngineActionStatus::Failed
                | EngineActionStatus::Cancelled
        )
    }

    /// Whether the state machine permits moving from `self` to `next`
    ///
    /// Terminal statuses admit nothing. Non-terminal statuses admit the next
    /// status on the normal path, any terminal completion status (the
    /// completion callback may arrive at any point after dispatch) and
    /// `Cancelled`.
    pub fn can_transition_to(&self, next: EngineActionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == EngineActionStatus::Cancelled || next.is_terminal() {
            return true;
        }
        matches!(
            (self, next),
            (EngineActionStatus::Requested, EngineActionStatus::Approved)
                | (EngineActionStatus::Approved, EngineActionStatus::Waiting)
                | (EngineActionStatus::Approved, EngineActionStatus::Activating)
                | (EngineActionStatus::Waiting, EngineActionStatus::Activating)
                | (EngineActionStatus::Activating, EngineActionStatus::InProgress)
        )
    }
}

impl std::fmt::Display for EngineActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineActionStatus::Requested => "requested",
            EngineActionStatus::Approved => "approved",
            EngineActionStatus::Waiting => "waiting",
            EngineActionStatus::Activating => "activating",
            EngineActionStatus::InProgress => "in_progress",
            EngineActionStatus::Actioned => "actioned",
            EngineActionStatus::Invalid => "invalid",
            EngineActionStatus::Ignored => "ignored",
            EngineActionStatus::Failed => "failed",
            EngineActionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// An element an engine action operates on, with its per-target outcome
///
/// Each engine action exclusively owns its target list; targets are copied,
/// never shared, when propagated to successor actions so that each successor
/// records its own outcome independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTarget {
    pub name: String,
    pub element_guid: Uuid,

    /// Outcome for this specific target, set by the executing engine
    pub status: Option<EngineActionStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub completion_message: Option<String>,
}

impl ActionTarget {
    /// Create a target with no outcome recorded yet
    pub fn new(name: impl Into<String>, element_guid: Uuid) -> Self {
        Self {
            name: name.into(),
            element_guid,
            status: None,
            start_time: None,
            completion_time: None,
            completion_message: None,
        }
    }
}

/// A target supplied by the caller when initiating an action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActionTarget {
    pub name: String,
    pub element_guid: Uuid,
}

impl NewActionTarget {
    pub fn new(name: impl Into<String>, element_guid: Uuid) -> Self {
        Self {
            name: name.into(),
            element_guid,
        }
    }
}

/// Reference from an engine action back to the process execution it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRef {
    /// The process definition this action was created from
    pub process_guid: Uuid,

    /// One run of the process; successors created by fan-out share it
    pub process_instance_guid: Uuid,

    /// The step this action executes
    pub step_guid: Uuid,
}

/// One runtime instance of work dispatched to a governance engine
///
/// Records are never deleted; after reaching a terminal status they remain
/// as the audit trail of the process execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineAction {
    pub id: Uuid,
    pub display_name: String,
    pub description: Option<String>,

    /// Name of the governance engine this action is routed to
    pub engine_name: String,
    pub request_type: String,
    pub request_parameters: HashMap<String, String>,

    /// Governance domain this action belongs to; zero means any domain
    pub domain_identifier: i32,

    /// Elements that caused this action to be requested
    pub request_source_guids: Vec<Uuid>,
    pub action_targets: Vec<ActionTarget>,

    /// Guards inherited from the predecessor that triggered this action
    pub received_guards: BTreeSet<String>,

    pub status: EngineActionStatus,

    /// Earliest time the action may be dispatched; `None` means immediately
    pub start_time: Option<DateTime<Utc>>,
    pub requested_time: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,

    /// Guards emitted by the executing engine on completion
    pub completion_guards: BTreeSet<String>,
    pub completion_message: Option<String>,

    /// Name of the requesting process, recorded for audit
    ///
    /// A bare action may carry one without a `process_ref`; fan-out
    /// successors inherit it from their predecessor.
    pub process_name: Option<String>,

    /// Present only for actions created as part of a process execution
    pub process_ref: Option<ProcessRef>,

    /// Audit provenance, not used for routing
    pub originator_service_name: Option<String>,
    pub originator_engine_name: Option<String>,
}
