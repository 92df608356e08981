//! The engine action scheduler
//!
//! Owns the lifecycle of every engine action record: creation, admission,
//! dispatch, completion and fan-out to successor process steps. Completion
//! reports arrive over a channel and are applied one at a time per record
//! through the store's compare-and-set transition, which keeps duplicate
//! and racing callbacks harmless.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use openactions_contracts::{
    ActionTarget, EngineAction, EngineActionStatus, ProcessRef, ProcessStatus, ProcessStep,
};

use crate::dispatch::{
    CompletionMessage, CompletionReporter, EngineActionRequest, EngineDispatcher, EngineRegistry,
};
use crate::error::GovernanceError;
use crate::persistence::{ActionFilter, GovernanceStore, Pagination, StoreError};
use crate::process::{GuardRouter, ProcessGraph};

use super::context::RuntimeContext;
use super::initiation::{merge_action_targets, merge_request_parameters, EngineActionInitiation};

/// Stateful orchestrator for engine actions
///
/// Created with [`EngineActionScheduler::start`], which also spawns the
/// completion-draining task. The scheduler is the only component permitted
/// to mutate an engine action's status.
pub struct EngineActionScheduler {
    ctx: RuntimeContext,
    dispatcher: EngineDispatcher,
    completions: mpsc::UnboundedSender<CompletionMessage>,

    // Process graphs are immutable once loaded; cache one per process.
    graph_cache: RwLock<HashMap<Uuid, Arc<ProcessGraph>>>,
}

impl EngineActionScheduler {
    /// Create a scheduler and spawn its completion-processing task
    ///
    /// The task ends when the scheduler is dropped.
    pub fn start(ctx: RuntimeContext) -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher =
            EngineDispatcher::with_retry_policy(ctx.registry.clone(), ctx.retry_policy.clone());

        let scheduler = Arc::new(Self {
            ctx,
            dispatcher,
            completions: tx,
            graph_cache: RwLock::new(HashMap::new()),
        });

        let weak = Arc::downgrade(&scheduler);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let Some(scheduler) = weak.upgrade() else { break };
                let action_id = message.action_id;
                if let Err(err) = scheduler.handle_completion(message).await {
                    error!(%action_id, error = %err, "failed to process completion report");
                }
            }
        });

        scheduler
    }

    /// Reporter handle for engines hosted outside the dispatch path
    pub fn completion_reporter(&self) -> CompletionReporter {
        CompletionReporter::new(self.completions.clone())
    }

    // =========================================================================
    // Initiation
    // =========================================================================

    /// Create a bare engine action and schedule its dispatch
    ///
    /// Validation failures are returned synchronously and no record is
    /// created. Once this returns an id, any further failure shows up as a
    /// terminal status on the record.
    #[instrument(skip(self, initiation), fields(server = %self.ctx.server_name))]
    pub async fn initiate_engine_action(
        &self,
        initiation: EngineActionInitiation,
    ) -> Result<Uuid, GovernanceError> {
        self.initiate_internal(initiation, Vec::new(), None).await
    }

    /// Resolve a governance action type by qualified name and initiate it
    #[instrument(skip(self, initiation), fields(server = %self.ctx.server_name))]
    pub async fn initiate_governance_action_type(
        &self,
        type_qualified_name: &str,
        initiation: EngineActionInitiation,
    ) -> Result<Uuid, GovernanceError> {
        let template = match self
            .ctx
            .store
            .get_governance_action_type(type_qualified_name)
            .await
        {
            Ok(template) => template,
            Err(StoreError::ActionTypeNotFound(name)) => {
                return Err(GovernanceError::invalid(format!(
                    "unknown governance action type: {name}"
                )));
            }
            Err(err) => return Err(err.into()),
        };

        let mut initiation = EngineActionInitiation {
            engine_name: template.engine_name.clone(),
            request_type: template.request_type.clone(),
            request_parameters: merge_request_parameters(
                &template.request_parameters,
                &initiation.request_parameters,
            ),
            ..initiation
        };
        if initiation.display_name.is_empty() {
            initiation.display_name = template.display_name.clone();
        }
        if initiation.start_time.is_none() {
            initiation.start_time = start_time_after(template.wait_time);
        }

        self.initiate_internal(initiation, Vec::new(), None).await
    }

    /// Resolve a process definition, load its graph and initiate its entry step
    #[instrument(skip(self, initiation), fields(server = %self.ctx.server_name))]
    pub async fn initiate_governance_action_process(
        &self,
        process_qualified_name: &str,
        initiation: EngineActionInitiation,
    ) -> Result<Uuid, GovernanceError> {
        let definition = match self
            .ctx
            .store
            .get_process_definition_by_name(process_qualified_name)
            .await
        {
            Ok(definition) => definition,
            Err(StoreError::ProcessNotFound(name)) => {
                return Err(GovernanceError::invalid(format!(
                    "unknown governance action process: {name}"
                )));
            }
            Err(err) => return Err(err.into()),
        };

        if definition.status != ProcessStatus::Active {
            return Err(GovernanceError::invalid(format!(
                "process {} is {} and cannot be initiated",
                definition.qualified_name, definition.status
            )));
        }

        // Validates the whole graph up front; a malformed process never
        // creates a record.
        let graph = self.process_graph(definition.guid).await?;
        let entry = graph.entry_step().clone();

        let mut received_guards = initiation.received_guards.clone();
        if let Some(first_step) = &graph.definition().first_step {
            if let Some(guard) = &first_step.guard {
                received_guards.insert(guard.clone());
            }
        }

        let mut initiation = EngineActionInitiation {
            engine_name: entry.engine_name.clone(),
            request_type: entry.request_type.clone(),
            request_parameters: merge_request_parameters(
                &entry.request_parameters,
                &initiation.request_parameters,
            ),
            received_guards,
            process_name: initiation
                .process_name
                .clone()
                .or_else(|| Some(definition.qualified_name.clone())),
            ..initiation
        };
        if initiation.display_name.is_empty() {
            initiation.display_name = entry.display_name.clone();
        }
        if initiation.start_time.is_none() {
            initiation.start_time = start_time_after(entry.wait_time);
        }

        let process_ref = ProcessRef {
            process_guid: definition.guid,
            process_instance_guid: Uuid::now_v7(),
            step_guid: entry.guid,
        };

        self.initiate_internal(initiation, Vec::new(), Some(process_ref))
            .await
    }

    async fn initiate_internal(
        &self,
        initiation: EngineActionInitiation,
        inherited_targets: Vec<ActionTarget>,
        process_ref: Option<ProcessRef>,
    ) -> Result<Uuid, GovernanceError> {
        if initiation.request_type.trim().is_empty() {
            return Err(GovernanceError::invalid("request type must not be empty"));
        }
        if initiation.engine_name.trim().is_empty() {
            return Err(GovernanceError::invalid("engine name must not be empty"));
        }
        if let Some(target) = initiation.action_targets.iter().find(|t| t.element_guid.is_nil()) {
            return Err(GovernanceError::invalid(format!(
                "action target {} references the nil GUID",
                target.name
            )));
        }

        let record = EngineAction {
            id: Uuid::now_v7(),
            display_name: initiation.display_name,
            description: initiation.description,
            engine_name: initiation.engine_name,
            request_type: initiation.request_type,
            request_parameters: initiation.request_parameters,
            domain_identifier: initiation.domain_identifier,
            request_source_guids: initiation.request_source_guids,
            action_targets: merge_action_targets(inherited_targets, initiation.action_targets),
            received_guards: initiation.received_guards,
            status: EngineActionStatus::Requested,
            start_time: initiation.start_time,
            requested_time: Utc::now(),
            completion_time: None,
            completion_guards: BTreeSet::new(),
            completion_message: None,
            process_name: initiation.process_name,
            process_ref,
            originator_service_name: initiation.originator_service_name,
            originator_engine_name: initiation.originator_engine_name,
        };

        let action_id = record.id;
        self.ctx.store.create_engine_action(record.clone()).await?;

        info!(
            %action_id,
            engine_name = %record.engine_name,
            request_type = %record.request_type,
            "engine action requested"
        );

        let store = self.ctx.store.clone();
        let registry = self.ctx.registry.clone();
        let dispatcher = self.dispatcher.clone();
        let reporter = self.completion_reporter();
        tokio::spawn(async move {
            run_dispatch(store, registry, dispatcher, reporter, record).await;
        });

        Ok(action_id)
    }

    // =========================================================================
    // Callbacks and cancellation
    // =========================================================================

    /// Entry point for completion reports from external engines
    ///
    /// Enqueues the report; the scheduler task applies it. Duplicate and
    /// late reports are absorbed as no-ops when applied.
    pub async fn report_completion(
        &self,
        action_id: Uuid,
        status: EngineActionStatus,
        completion_guards: BTreeSet<String>,
        target_outcomes: Vec<ActionTarget>,
        completion_message: Option<String>,
    ) -> Result<(), GovernanceError> {
        if !status.is_terminal() {
            return Err(GovernanceError::invalid(format!(
                "completion status must be terminal, got {status}"
            )));
        }

        // Reject unknown ids synchronously; the channel cannot report back.
        self.get_engine_action(action_id).await?;

        self.completion_reporter()
            .report_completion(
                action_id,
                status,
                completion_guards,
                target_outcomes,
                completion_message,
            )
            .map_err(|_| {
                GovernanceError::PropertyServer(
                    "scheduler is not accepting completion reports".to_string(),
                )
            })
    }

    /// Acknowledge that the engine has accepted a dispatched action
    ///
    /// Returns whether the record moved to in-progress; a record that is
    /// already terminal or not activating is left untouched.
    pub async fn on_dispatch_acknowledged(&self, action_id: Uuid) -> Result<bool, GovernanceError> {
        let applied = self
            .ctx
            .store
            .transition_status(
                action_id,
                EngineActionStatus::Activating,
                EngineActionStatus::InProgress,
            )
            .await?;
        Ok(applied)
    }

    /// Cancel an engine action
    ///
    /// Valid from any non-terminal status; suppresses fan-out. The engine
    /// gets a best-effort advisory signal, but the cancelled status is
    /// authoritative whether or not it reacts. Returns `false` when the
    /// record was already terminal.
    #[instrument(skip(self))]
    pub async fn cancel(&self, action_id: Uuid) -> Result<bool, GovernanceError> {
        match self.ctx.store.cancel_engine_action(action_id).await? {
            Some(record) => {
                info!(%action_id, "engine action cancelled");
                self.dispatcher
                    .notify_cancel(&record.engine_name, action_id)
                    .await;
                Ok(true)
            }
            None => {
                debug!(%action_id, "cancel ignored, record already terminal");
                Ok(false)
            }
        }
    }

    async fn handle_completion(&self, message: CompletionMessage) -> Result<(), GovernanceError> {
        let action_id = message.action_id;

        // Engines report through this channel directly; a non-terminal
        // status would reopen the record and must never be applied.
        if !message.status.is_terminal() {
            warn!(
                %action_id,
                status = %message.status,
                "discarding completion report with non-terminal status"
            );
            return Ok(());
        }

        let updated = self
            .ctx
            .store
            .record_completion(
                action_id,
                message.status,
                message.completion_guards,
                message.target_outcomes,
                message.completion_message,
            )
            .await?;

        let Some(record) = updated else {
            debug!(%action_id, "duplicate or late completion ignored");
            return Ok(());
        };

        info!(
            %action_id,
            status = %record.status,
            guards = ?record.completion_guards,
            "engine action completed"
        );

        // Failed, cancelled and invalid completions end the branch.
        if matches!(
            record.status,
            EngineActionStatus::Failed
                | EngineActionStatus::Cancelled
                | EngineActionStatus::Invalid
        ) {
            return Ok(());
        }

        let Some(process_ref) = record.process_ref.clone() else {
            return Ok(());
        };

        self.fan_out(&record, &process_ref).await
    }

    async fn fan_out(
        &self,
        record: &EngineAction,
        process_ref: &ProcessRef,
    ) -> Result<(), GovernanceError> {
        let graph = self.process_graph(process_ref.process_guid).await?;
        let successors: Vec<ProcessStep> =
            GuardRouter::next_steps(&graph, process_ref.step_guid, &record.completion_guards)
                .into_iter()
                .cloned()
                .collect();

        for step in successors {
            // A step that does not ignore multiple triggers coalesces
            // concurrent triggers onto one action per process run.
            if !step.ignore_multiple_triggers {
                let existing = self
                    .ctx
                    .store
                    .find_active_step_action(process_ref.process_instance_guid, step.guid)
                    .await?;
                if let Some(existing) = existing {
                    debug!(
                        step = %step.qualified_name,
                        existing_action = %existing.id,
                        "trigger coalesced onto existing action"
                    );
                    continue;
                }
            }

            let initiation = EngineActionInitiation {
                display_name: step.display_name.clone(),
                description: None,
                engine_name: step.engine_name.clone(),
                request_type: step.request_type.clone(),
                request_parameters: step.request_parameters.clone(),
                domain_identifier: record.domain_identifier,
                request_source_guids: record.request_source_guids.clone(),
                action_targets: Vec::new(),
                received_guards: record.completion_guards.clone(),
                start_time: start_time_after(step.wait_time),
                process_name: record.process_name.clone(),
                originator_service_name: record.originator_service_name.clone(),
                originator_engine_name: Some(record.engine_name.clone()),
            };

            let next_ref = ProcessRef {
                process_guid: process_ref.process_guid,
                process_instance_guid: process_ref.process_instance_guid,
                step_guid: step.guid,
            };

            // Each successor owns its own copy of the targets.
            let successor_id = self
                .initiate_internal(initiation, record.action_targets.clone(), Some(next_ref))
                .await?;

            debug!(
                predecessor = %record.id,
                successor = %successor_id,
                step = %step.qualified_name,
                "successor engine action initiated"
            );
        }

        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get one engine action record
    pub async fn get_engine_action(&self, action_id: Uuid) -> Result<EngineAction, GovernanceError> {
        match self.ctx.store.get_engine_action(action_id).await {
            Ok(record) => Ok(record),
            Err(StoreError::ActionNotFound(id)) => Err(GovernanceError::ActionNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// All engine action records, paged
    pub async fn get_engine_actions(
        &self,
        pagination: Pagination,
    ) -> Result<Vec<EngineAction>, GovernanceError> {
        Ok(self
            .ctx
            .store
            .find_engine_actions(ActionFilter::all(), pagination)
            .await?)
    }

    /// Non-terminal engine action records, paged
    pub async fn get_active_engine_actions(
        &self,
        pagination: Pagination,
    ) -> Result<Vec<EngineAction>, GovernanceError> {
        Ok(self
            .ctx
            .store
            .find_engine_actions(ActionFilter::active(), pagination)
            .await?)
    }

    /// Engine action records by display name, paged
    pub async fn get_engine_actions_by_name(
        &self,
        display_name: &str,
        pagination: Pagination,
    ) -> Result<Vec<EngineAction>, GovernanceError> {
        Ok(self
            .ctx
            .store
            .find_engine_actions(ActionFilter::by_name(display_name), pagination)
            .await?)
    }

    /// Engine action records matching an arbitrary filter, paged
    pub async fn find_engine_actions(
        &self,
        filter: ActionFilter,
        pagination: Pagination,
    ) -> Result<Vec<EngineAction>, GovernanceError> {
        Ok(self.ctx.store.find_engine_actions(filter, pagination).await?)
    }

    // =========================================================================
    // Process authoring
    // =========================================================================

    /// Declare the entry step of a process
    pub async fn setup_first_action_process_step(
        &self,
        process_guid: Uuid,
        step_guid: Uuid,
        guard: Option<String>,
    ) -> Result<(), GovernanceError> {
        self.ctx
            .store
            .set_first_step(process_guid, step_guid, guard)
            .await?;
        self.invalidate_graph_cache();
        Ok(())
    }

    /// Link two process steps; returns the new link's GUID
    pub async fn setup_next_action_process_step(
        &self,
        current_step_guid: Uuid,
        next_step_guid: Uuid,
        guard: Option<String>,
        mandatory_guard: bool,
    ) -> Result<Uuid, GovernanceError> {
        let link = openactions_contracts::NextStepLink {
            guid: Uuid::now_v7(),
            source_step_guid: current_step_guid,
            target_step_guid: next_step_guid,
            guard,
            mandatory_guard,
        };
        let link_guid = link.guid;

        self.ctx.store.create_next_step_link(link).await?;
        self.invalidate_graph_cache();
        Ok(link_guid)
    }

    /// Change the guard properties of an existing link
    pub async fn update_next_action_process_step(
        &self,
        link_guid: Uuid,
        guard: Option<String>,
        mandatory_guard: bool,
    ) -> Result<(), GovernanceError> {
        self.ctx
            .store
            .update_next_step_link(link_guid, guard, mandatory_guard)
            .await?;
        self.invalidate_graph_cache();
        Ok(())
    }

    /// Remove a link between two process steps
    pub async fn remove_next_action_process_step(
        &self,
        link_guid: Uuid,
    ) -> Result<(), GovernanceError> {
        self.ctx.store.remove_next_step_link(link_guid).await?;
        self.invalidate_graph_cache();
        Ok(())
    }

    /// Outgoing links of a step, paged
    pub async fn get_next_process_steps(
        &self,
        step_guid: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<openactions_contracts::NextStepLink>, GovernanceError> {
        Ok(self
            .ctx
            .store
            .get_links_from_step(step_guid, pagination)
            .await?)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn process_graph(&self, process_guid: Uuid) -> Result<Arc<ProcessGraph>, GovernanceError> {
        if let Some(graph) = self.graph_cache.read().get(&process_guid) {
            return Ok(graph.clone());
        }

        let graph = Arc::new(ProcessGraph::load(self.ctx.store.as_ref(), process_guid).await?);
        self.graph_cache
            .write()
            .insert(process_guid, graph.clone());
        Ok(graph)
    }

    // Authoring may touch any process; dropping the whole cache is cheap and
    // definitions change rarely.
    fn invalidate_graph_cache(&self) {
        self.graph_cache.write().clear();
    }
}

/// Start time implied by a step or template wait time
fn start_time_after(wait_time: Option<std::time::Duration>) -> Option<chrono::DateTime<Utc>> {
    wait_time.map(|wait| {
        Utc::now() + chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::zero())
    })
}

/// Drive one record from requested through dispatch
///
/// Runs on its own task. Every state advance is a compare-and-set; losing
/// one means the record was cancelled (or completed) concurrently and the
/// task simply stops.
async fn run_dispatch(
    store: Arc<dyn GovernanceStore>,
    registry: Arc<EngineRegistry>,
    dispatcher: EngineDispatcher,
    reporter: CompletionReporter,
    record: EngineAction,
) {
    let action_id = record.id;

    // Admission: the named engine must exist. An invalid name cannot be
    // fixed by retrying.
    if !registry.contains(&record.engine_name) {
        warn!(%action_id, engine_name = %record.engine_name, "no such governance engine");
        mark_failed(
            &store,
            action_id,
            format!("no governance engine registered under name {}", record.engine_name),
        )
        .await;
        return;
    }

    if !advance(&store, action_id, EngineActionStatus::Requested, EngineActionStatus::Approved).await
    {
        return;
    }

    // Honor a future start time before going to the engine.
    let now = Utc::now();
    match record.start_time {
        Some(start) if start > now => {
            if !advance(&store, action_id, EngineActionStatus::Approved, EngineActionStatus::Waiting)
                .await
            {
                return;
            }
            let delay = (start - now).to_std().unwrap_or_default();
            tokio::time::sleep(delay).await;
            if !advance(&store, action_id, EngineActionStatus::Waiting, EngineActionStatus::Activating)
                .await
            {
                return;
            }
        }
        _ => {
            if !advance(&store, action_id, EngineActionStatus::Approved, EngineActionStatus::Activating)
                .await
            {
                return;
            }
        }
    }

    let request = EngineActionRequest {
        action_id,
        request_type: record.request_type.clone(),
        request_parameters: record.request_parameters.clone(),
        action_targets: record.action_targets.clone(),
        received_guards: record.received_guards.clone(),
        reporter,
    };

    match dispatcher.dispatch(&record.engine_name, request).await {
        Ok(()) => {
            let applied = advance(
                &store,
                action_id,
                EngineActionStatus::Activating,
                EngineActionStatus::InProgress,
            )
            .await;
            if !applied {
                debug!(%action_id, "record left activating before acknowledgment applied");
            }
        }
        Err(err) => {
            warn!(%action_id, error = %err, "dispatch failed");
            mark_failed(&store, action_id, err.to_string()).await;
        }
    }
}

async fn advance(
    store: &Arc<dyn GovernanceStore>,
    action_id: Uuid,
    from: EngineActionStatus,
    to: EngineActionStatus,
) -> bool {
    match store.transition_status(action_id, from, to).await {
        Ok(applied) => {
            if !applied {
                debug!(%action_id, %from, %to, "transition lost, record moved concurrently");
            }
            applied
        }
        Err(err) => {
            error!(%action_id, error = %err, "failed to persist status transition");
            false
        }
    }
}

async fn mark_failed(store: &Arc<dyn GovernanceStore>, action_id: Uuid, message: String) {
    match store
        .record_completion(
            action_id,
            EngineActionStatus::Failed,
            BTreeSet::new(),
            Vec::new(),
            Some(message),
        )
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => debug!(%action_id, "record already terminal, failure not recorded"),
        Err(err) => error!(%action_id, error = %err, "failed to record dispatch failure"),
    }
}
