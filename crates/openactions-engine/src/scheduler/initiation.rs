//! Initiation request for a new engine action

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use openactions_contracts::{ActionTarget, NewActionTarget};

/// Caller-supplied properties for a new engine action
///
/// For a bare engine action, `engine_name` and `request_type` are required.
/// When initiating a governance action type or process, they come from the
/// resolved template or entry step instead and any values set here are
/// ignored; `request_parameters` set here are merged over the template's.
#[derive(Debug, Clone, Default)]
pub struct EngineActionInitiation {
    pub display_name: String,
    pub description: Option<String>,
    pub engine_name: String,
    pub request_type: String,
    pub request_parameters: HashMap<String, String>,

    /// Governance domain the action belongs to; zero means any domain
    pub domain_identifier: i32,

    pub request_source_guids: Vec<Uuid>,
    pub action_targets: Vec<NewActionTarget>,
    pub received_guards: BTreeSet<String>,

    /// Earliest dispatch time; `None` means dispatch immediately
    pub start_time: Option<DateTime<Utc>>,

    /// Name of the requesting process, recorded on the record for audit
    pub process_name: Option<String>,

    pub originator_service_name: Option<String>,
    pub originator_engine_name: Option<String>,
}

impl EngineActionInitiation {
    /// Start building a bare engine action initiation
    pub fn new(engine_name: impl Into<String>, request_type: impl Into<String>) -> Self {
        Self {
            engine_name: engine_name.into(),
            request_type: request_type.into(),
            ..Self::default()
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_action_targets(mut self, targets: Vec<NewActionTarget>) -> Self {
        self.action_targets = targets;
        self
    }

    pub fn with_request_parameters(mut self, parameters: HashMap<String, String>) -> Self {
        self.request_parameters = parameters;
        self
    }

    pub fn with_received_guards(mut self, guards: BTreeSet<String>) -> Self {
        self.received_guards = guards;
        self
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_domain_identifier(mut self, domain_identifier: i32) -> Self {
        self.domain_identifier = domain_identifier;
        self
    }

    pub fn with_process_name(mut self, process_name: impl Into<String>) -> Self {
        self.process_name = Some(process_name.into());
        self
    }

    pub fn with_originator(
        mut self,
        service_name: impl Into<String>,
        engine_name: impl Into<String>,
    ) -> Self {
        self.originator_service_name = Some(service_name.into());
        self.originator_engine_name = Some(engine_name.into());
        self
    }
}

/// Merge template parameters with caller overrides; the caller wins.
pub(crate) fn merge_request_parameters(
    template: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = template.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Combine targets inherited from a predecessor with newly supplied ones
///
/// Inherited copies are stripped of the predecessor's per-target outcome so
/// each successor records its own results from a clean slate. New targets
/// that duplicate an inherited (name, element) pair are dropped so each
/// element appears once.
pub(crate) fn merge_action_targets(
    inherited: Vec<ActionTarget>,
    new: Vec<NewActionTarget>,
) -> Vec<ActionTarget> {
    let mut targets: Vec<ActionTarget> = inherited
        .into_iter()
        .map(|t| ActionTarget::new(t.name, t.element_guid))
        .collect();
    for candidate in new {
        let exists = targets
            .iter()
            .any(|t| t.element_guid == candidate.element_guid && t.name == candidate.name);
        if !exists {
            targets.push(ActionTarget::new(candidate.name, candidate.element_guid));
        }
    }
    targets
}
