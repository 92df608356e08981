//! GovernanceStore trait definition

use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use openactions_contracts::{
    ActionTarget, EngineAction, EngineActionStatus, GovernanceActionType, NextStepLink,
    ProcessDefinition, ProcessStep,
};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Process definition not found (by GUID or qualified name)
    #[error("process not found: {0}")]
    ProcessNotFound(String),

    /// Process step not found
    #[error("process step not found: {0}")]
    StepNotFound(Uuid),

    /// Next-step link not found
    #[error("next step link not found: {0}")]
    LinkNotFound(Uuid),

    /// Engine action record not found
    #[error("engine action not found: {0}")]
    ActionNotFound(Uuid),

    /// Governance action type not found
    #[error("governance action type not found: {0}")]
    ActionTypeNotFound(String),

    /// The backing metadata repository failed or returned an inconsistent result
    #[error("metadata repository error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Pagination parameters for list operations
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub start_from: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            start_from: 0,
            page_size: 100,
        }
    }
}

impl Pagination {
    pub fn new(start_from: usize, page_size: usize) -> Self {
        Self {
            start_from,
            page_size,
        }
    }
}

/// Filter for engine action queries
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    /// Only records whose status is non-terminal
    pub active_only: bool,

    /// Exact display name match
    pub display_name: Option<String>,

    /// Restrict to a specific request type
    pub request_type: Option<String>,

    /// Restrict to one run of a process
    pub process_instance_guid: Option<Uuid>,
}

impl ActionFilter {
    /// Filter matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching non-terminal records only
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    /// Filter by display name
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Restrict the filter to one process run
    pub fn with_process_instance(mut self, instance_guid: Uuid) -> Self {
        self.process_instance_guid = Some(instance_guid);
        self
    }
}

/// Store for process definitions and engine action records
///
/// This trait is the engine's view of the metadata tier. Implementations
/// must be thread-safe and must enforce the compare-and-set discipline of
/// [`transition_status`](GovernanceStore::transition_status): a status
/// transition applies only from the expected current status, which is what
/// makes completion handling idempotent under racing callbacks.
#[async_trait]
pub trait GovernanceStore: Send + Sync + 'static {
    // =========================================================================
    // Process definitions
    // =========================================================================

    /// Create a process definition
    async fn create_process_definition(
        &self,
        definition: ProcessDefinition,
    ) -> Result<(), StoreError>;

    /// Get a process definition by GUID
    async fn get_process_definition(&self, guid: Uuid) -> Result<ProcessDefinition, StoreError>;

    /// Get a process definition by qualified name
    async fn get_process_definition_by_name(
        &self,
        qualified_name: &str,
    ) -> Result<ProcessDefinition, StoreError>;

    /// Link a process definition to its entry step
    async fn set_first_step(
        &self,
        process_guid: Uuid,
        step_guid: Uuid,
        guard: Option<String>,
    ) -> Result<(), StoreError>;

    // =========================================================================
    // Process steps and links
    // =========================================================================

    /// Add a step to a process definition
    async fn create_process_step(
        &self,
        process_guid: Uuid,
        step: ProcessStep,
    ) -> Result<(), StoreError>;

    /// Get a process step by GUID
    async fn get_process_step(&self, guid: Uuid) -> Result<ProcessStep, StoreError>;

    /// Get all steps of a process, in creation order
    async fn get_process_steps(&self, process_guid: Uuid) -> Result<Vec<ProcessStep>, StoreError>;

    /// Add a guarded link between two steps of the same process
    ///
    /// The owning process is derived from the link's source step.
    async fn create_next_step_link(&self, link: NextStepLink) -> Result<(), StoreError>;

    /// Update the guard properties of an existing link
    async fn update_next_step_link(
        &self,
        link_guid: Uuid,
        guard: Option<String>,
        mandatory_guard: bool,
    ) -> Result<(), StoreError>;

    /// Remove a link
    async fn remove_next_step_link(&self, link_guid: Uuid) -> Result<(), StoreError>;

    /// Get all links of a process, in declaration order
    async fn get_next_step_links(
        &self,
        process_guid: Uuid,
    ) -> Result<Vec<NextStepLink>, StoreError>;

    /// Get the outgoing links of one step, paged, in declaration order
    async fn get_links_from_step(
        &self,
        step_guid: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<NextStepLink>, StoreError>;

    // =========================================================================
    // Governance action types
    // =========================================================================

    /// Register a single-step template
    async fn create_governance_action_type(
        &self,
        action_type: GovernanceActionType,
    ) -> Result<(), StoreError>;

    /// Resolve a single-step template by qualified name
    async fn get_governance_action_type(
        &self,
        qualified_name: &str,
    ) -> Result<GovernanceActionType, StoreError>;

    // =========================================================================
    // Engine action records
    // =========================================================================

    /// Persist a new engine action record
    async fn create_engine_action(&self, record: EngineAction) -> Result<(), StoreError>;

    /// Get an engine action record
    async fn get_engine_action(&self, id: Uuid) -> Result<EngineAction, StoreError>;

    /// Compare-and-set status transition
    ///
    /// Applies `from -> to` only when the record's current status is `from`
    /// and the state machine permits the move. Returns whether the
    /// transition applied; losing a race is not an error.
    async fn transition_status(
        &self,
        id: Uuid,
        from: EngineActionStatus,
        to: EngineActionStatus,
    ) -> Result<bool, StoreError>;

    /// Record a completion callback
    ///
    /// Applies only when the record is still non-terminal; stores the
    /// terminal status, completion guards, per-target outcomes, message and
    /// completion time in one step. Returns the updated record, or `None`
    /// when the record was already terminal (duplicate or late callback).
    async fn record_completion(
        &self,
        id: Uuid,
        status: EngineActionStatus,
        completion_guards: BTreeSet<String>,
        target_outcomes: Vec<ActionTarget>,
        completion_message: Option<String>,
    ) -> Result<Option<EngineAction>, StoreError>;

    /// Cancel a record
    ///
    /// Applies from any non-terminal status. Returns the updated record, or
    /// `None` when the record was already terminal.
    async fn cancel_engine_action(&self, id: Uuid) -> Result<Option<EngineAction>, StoreError>;

    /// Find records matching a filter, paged, ordered by id (creation order)
    async fn find_engine_actions(
        &self,
        filter: ActionFilter,
        pagination: Pagination,
    ) -> Result<Vec<EngineAction>, StoreError>;

    /// Find the non-terminal record for one step of one process run, if any
    ///
    /// Used to coalesce concurrent triggers of a step that does not ignore
    /// multiple triggers.
    async fn find_active_step_action(
        &self,
        process_instance_guid: Uuid,
        step_guid: Uuid,
    ) -> Result<Option<EngineAction>, StoreError>;
}
