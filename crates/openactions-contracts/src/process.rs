// Process definition DTOs: the administrator-authored, run-time-immutable
// description of a governance action process (steps plus guarded links).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a governance action process definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Definition is being authored and may not be initiated
    Draft,

    /// Definition is complete and may be initiated
    Active,

    /// Definition is retained for audit but may no longer be initiated
    Deprecated,
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessStatus::Draft => write!(f, "draft"),
            ProcessStatus::Active => write!(f, "active"),
            ProcessStatus::Deprecated => write!(f, "deprecated"),
        }
    }
}

impl std::str::FromStr for ProcessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProcessStatus::Draft),
            "active" => Ok(ProcessStatus::Active),
            "deprecated" => Ok(ProcessStatus::Deprecated),
            _ => Err(format!("Unknown process status: {}", s)),
        }
    }
}

/// Link from a process definition to the step where execution begins
///
/// A process without a first-step link cannot be initiated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirstStepLink {
    /// The entry step of the process
    pub step_guid: Uuid,

    /// Guard passed to the entry step as its received guard
    pub guard: Option<String>,
}

/// A governance action process definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub guid: Uuid,
    pub qualified_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub status: ProcessStatus,

    /// Where execution begins; `None` means the process is not yet runnable
    pub first_step: Option<FirstStepLink>,
}

/// One unit of work within a process definition
///
/// A step describes what to request from a governance engine without being
/// itself an execution instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStep {
    pub guid: Uuid,
    pub qualified_name: String,
    pub display_name: String,

    /// Name of the governance engine that executes this step
    pub engine_name: String,

    /// Request type understood by the engine
    pub request_type: String,

    /// Opaque key/value parameters forwarded to the engine verbatim
    pub request_parameters: HashMap<String, String>,

    /// When true, every predecessor trigger creates its own engine action.
    /// When false, concurrent triggers are coalesced onto one action.
    pub ignore_multiple_triggers: bool,

    /// Optional pause before the step's engine action is dispatched
    #[serde(default, with = "option_duration_millis")]
    pub wait_time: Option<Duration>,
}

/// Directed, optionally guarded edge between two process steps
///
/// Firing rules:
/// - `mandatory_guard == true`: fires only when `guard` is in the completed
///   action's emitted guard set.
/// - `mandatory_guard == false` with `Some(guard)`: fires when the guard is
///   in the emitted set.
/// - `guard == None`: unconditional fallback, fires only when no other
///   outgoing link of the source step matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextStepLink {
    pub guid: Uuid,
    pub source_step_guid: Uuid,
    pub target_step_guid: Uuid,
    pub guard: Option<String>,
    pub mandatory_guard: bool,
}

/// A named, single-step template: a request type and parameters that can be
/// initiated without authoring a full process definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceActionType {
    pub guid: Uuid,
    pub qualified_name: String,
    pub display_name: String,
    pub engine_name: String,
    pub request_type: String,
    pub request_parameters: HashMap<String, String>,
    #[serde(default, with = "option_duration_millis")]
    pub wait_time: Option<Duration>,
}

/// Serde support for Option<Duration> as milliseconds
mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => d.as_millis().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
