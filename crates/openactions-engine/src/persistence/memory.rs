//! In-memory implementation of GovernanceStore
//!
//! Provides the same semantics a real metadata tier must honor, in
//! particular the compare-and-set status transition discipline. Used by the
//! test suite and by embedded deployments that do not need durability.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use openactions_contracts::{
    ActionTarget, EngineAction, EngineActionStatus, GovernanceActionType, NextStepLink,
    ProcessDefinition, ProcessStep,
};

use super::store::*;

/// In-memory implementation of [`GovernanceStore`]
///
/// # Example
///
/// ```
/// use openactions_engine::InMemoryGovernanceStore;
///
/// let store = InMemoryGovernanceStore::new();
/// ```
pub struct InMemoryGovernanceStore {
    processes: RwLock<HashMap<Uuid, ProcessDefinition>>,

    // Steps and links keep insertion order; link declaration order drives
    // deterministic fallback selection in the router.
    steps: RwLock<Vec<(Uuid, ProcessStep)>>,
    links: RwLock<Vec<(Uuid, NextStepLink)>>,

    action_types: RwLock<HashMap<String, GovernanceActionType>>,
    actions: RwLock<HashMap<Uuid, EngineAction>>,
}

impl InMemoryGovernanceStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            processes: RwLock::new(HashMap::new()),
            steps: RwLock::new(Vec::new()),
            links: RwLock::new(Vec::new()),
            action_types: RwLock::new(HashMap::new()),
            actions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of engine action records (terminal records included)
    pub fn action_count(&self) -> usize {
        self.actions.read().len()
    }

    /// Number of non-terminal engine action records
    pub fn active_action_count(&self) -> usize {
        self.actions
            .read()
            .values()
            .filter(|a| !a.status.is_terminal())
            .count()
    }

    fn owning_process(&self, step_guid: Uuid) -> Result<Uuid, StoreError> {
        self.steps
            .read()
            .iter()
            .find(|(_, s)| s.guid == step_guid)
            .map(|(p, _)| *p)
            .ok_or(StoreError::StepNotFound(step_guid))
    }

    fn apply_target_outcomes(record: &mut EngineAction, outcomes: Vec<ActionTarget>) {
        for outcome in outcomes {
            match record
                .action_targets
                .iter_mut()
                .find(|t| t.element_guid == outcome.element_guid && t.name == outcome.name)
            {
                Some(target) => *target = outcome,
                // Engines may report on targets they discovered themselves
                None => record.action_targets.push(outcome),
            }
        }
    }
}

impl Default for InMemoryGovernanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GovernanceStore for InMemoryGovernanceStore {
    async fn create_process_definition(
        &self,
        definition: ProcessDefinition,
    ) -> Result<(), StoreError> {
        self.processes.write().insert(definition.guid, definition);
        Ok(())
    }

    async fn get_process_definition(&self, guid: Uuid) -> Result<ProcessDefinition, StoreError> {
        self.processes
            .read()
            .get(&guid)
            .cloned()
            .ok_or_else(|| StoreError::ProcessNotFound(guid.to_string()))
    }

    async fn get_process_definition_by_name(
        &self,
        qualified_name: &str,
    ) -> Result<ProcessDefinition, StoreError> {
        self.processes
            .read()
            .values()
            .find(|p| p.qualified_name == qualified_name)
            .cloned()
            .ok_or_else(|| StoreError::ProcessNotFound(qualified_name.to_string()))
    }

    async fn set_first_step(
        &self,
        process_guid: Uuid,
        step_guid: Uuid,
        guard: Option<String>,
    ) -> Result<(), StoreError> {
        let mut processes = self.processes.write();
        let process = processes
            .get_mut(&process_guid)
            .ok_or_else(|| StoreError::ProcessNotFound(process_guid.to_string()))?;

        process.first_step = Some(openactions_contracts::FirstStepLink { step_guid, guard });
        Ok(())
    }

    async fn create_process_step(
        &self,
        process_guid: Uuid,
        step: ProcessStep,
    ) -> Result<(), StoreError> {
        if !self.processes.read().contains_key(&process_guid) {
            return Err(StoreError::ProcessNotFound(process_guid.to_string()));
        }
        self.steps.write().push((process_guid, step));
        Ok(())
    }

    async fn get_process_step(&self, guid: Uuid) -> Result<ProcessStep, StoreError> {
        self.steps
            .read()
            .iter()
            .find(|(_, s)| s.guid == guid)
            .map(|(_, s)| s.clone())
            .ok_or(StoreError::StepNotFound(guid))
    }

    async fn get_process_steps(&self, process_guid: Uuid) -> Result<Vec<ProcessStep>, StoreError> {
        Ok(self
            .steps
            .read()
            .iter()
            .filter(|(p, _)| *p == process_guid)
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn create_next_step_link(&self, link: NextStepLink) -> Result<(), StoreError> {
        let process_guid = self.owning_process(link.source_step_guid)?;
        self.links.write().push((process_guid, link));
        Ok(())
    }

    async fn update_next_step_link(
        &self,
        link_guid: Uuid,
        guard: Option<String>,
        mandatory_guard: bool,
    ) -> Result<(), StoreError> {
        let mut links = self.links.write();
        let entry = links
            .iter_mut()
            .find(|(_, l)| l.guid == link_guid)
            .ok_or(StoreError::LinkNotFound(link_guid))?;

        entry.1.guard = guard;
        entry.1.mandatory_guard = mandatory_guard;
        Ok(())
    }

    async fn remove_next_step_link(&self, link_guid: Uuid) -> Result<(), StoreError> {
        let mut links = self.links.write();
        let before = links.len();
        links.retain(|(_, l)| l.guid != link_guid);

        if links.len() == before {
            return Err(StoreError::LinkNotFound(link_guid));
        }
        Ok(())
    }

    async fn get_next_step_links(
        &self,
        process_guid: Uuid,
    ) -> Result<Vec<NextStepLink>, StoreError> {
        Ok(self
            .links
            .read()
            .iter()
            .filter(|(p, _)| *p == process_guid)
            .map(|(_, l)| l.clone())
            .collect())
    }

    async fn get_links_from_step(
        &self,
        step_guid: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<NextStepLink>, StoreError> {
        Ok(self
            .links
            .read()
            .iter()
            .filter(|(_, l)| l.source_step_guid == step_guid)
            .map(|(_, l)| l.clone())
            .skip(pagination.start_from)
            .take(pagination.page_size)
            .collect())
    }

    async fn create_governance_action_type(
        &self,
        action_type: GovernanceActionType,
    ) -> Result<(), StoreError> {
        self.action_types
            .write()
            .insert(action_type.qualified_name.clone(), action_type);
        Ok(())
    }

    async fn get_governance_action_type(
        &self,
        qualified_name: &str,
    ) -> Result<GovernanceActionType, StoreError> {
        self.action_types
            .read()
            .get(qualified_name)
            .cloned()
            .ok_or_else(|| StoreError::ActionTypeNotFound(qualified_name.to_string()))
    }

    async fn create_engine_action(&self, record: EngineAction) -> Result<(), StoreError> {
        self.actions.write().insert(record.id, record);
        Ok(())
    }

    async fn get_engine_action(&self, id: Uuid) -> Result<EngineAction, StoreError> {
        self.actions
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::ActionNotFound(id))
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: EngineActionStatus,
        to: EngineActionStatus,
    ) -> Result<bool, StoreError> {
        let mut actions = self.actions.write();
        let record = actions.get_mut(&id).ok_or(StoreError::ActionNotFound(id))?;

        if record.status != from || !record.status.can_transition_to(to) {
            return Ok(false);
        }

        record.status = to;
        if to.is_terminal() {
            record.completion_time = Some(Utc::now());
        }
        Ok(true)
    }

    async fn record_completion(
        &self,
        id: Uuid,
        status: EngineActionStatus,
        completion_guards: BTreeSet<String>,
        target_outcomes: Vec<ActionTarget>,
        completion_message: Option<String>,
    ) -> Result<Option<EngineAction>, StoreError> {
        let mut actions = self.actions.write();
        let record = actions.get_mut(&id).ok_or(StoreError::ActionNotFound(id))?;

        if record.status.is_terminal() {
            return Ok(None);
        }

        record.status = status;
        record.completion_guards = completion_guards;
        record.completion_message = completion_message;
        record.completion_time = Some(Utc::now());
        Self::apply_target_outcomes(record, target_outcomes);

        Ok(Some(record.clone()))
    }

    async fn cancel_engine_action(&self, id: Uuid) -> Result<Option<EngineAction>, StoreError> {
        let mut actions = self.actions.write();
        let record = actions.get_mut(&id).ok_or(StoreError::ActionNotFound(id))?;

        if record.status.is_terminal() {
            return Ok(None);
        }

        record.status = EngineActionStatus::Cancelled;
        record.completion_time = Some(Utc::now());
        Ok(Some(record.clone()))
    }

    async fn find_engine_actions(
        &self,
        filter: ActionFilter,
        pagination: Pagination,
    ) -> Result<Vec<EngineAction>, StoreError> {
        let actions = self.actions.read();
        let mut matching: Vec<_> = actions
            .values()
            .filter(|a| {
                if filter.active_only && a.status.is_terminal() {
                    return false;
                }
                if let Some(ref name) = filter.display_name {
                    if &a.display_name != name {
                        return false;
                    }
                }
                if let Some(ref request_type) = filter.request_type {
                    if &a.request_type != request_type {
                        return false;
                    }
                }
                if let Some(instance) = filter.process_instance_guid {
                    match &a.process_ref {
                        Some(p) if p.process_instance_guid == instance => {}
                        _ => return false,
                    }
                }
                true
            })
            .cloned()
            .collect();

        // UUID v7 ids sort by creation time
        matching.sort_by_key(|a| a.id);

        Ok(matching
            .into_iter()
            .skip(pagination.start_from)
            .take(pagination.page_size)
            .collect())
    }

    async fn find_active_step_action(
        &self,
        process_instance_guid: Uuid,
        step_guid: Uuid,
    ) -> Result<Option<EngineAction>, StoreError> {
        Ok(self
            .actions
            .read()
            .values()
            .find(|a| {
                !a.status.is_terminal()
                    && a.process_ref.as_ref().is_some_and(|p| {
                        p.process_instance_guid == process_instance_guid
                            && p.step_guid == step_guid
                    })
            })
            .cloned())
    }
}
