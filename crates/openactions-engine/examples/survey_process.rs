//! Survey Process Example - Guarded Fan-Out End to End
//!
//! This example authors a three-step governance action process, registers
//! two in-process governance engines and runs the process to completion:
//!
//! 1. "survey" inspects an asset and emits a quality guard
//! 2. a "good" guard routes to the publish step
//! 3. any other outcome falls through to the triage step
//!
//! Run with: cargo run -p openactions-engine --example survey_process

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use openactions_contracts::{
    EngineActionStatus, FirstStepLink, NewActionTarget, NextStepLink, ProcessDefinition,
    ProcessStatus, ProcessStep,
};
use openactions_engine::prelude::*;

// ============================================================================
// Governance engines
// ============================================================================

/// Inspects its targets and reports a quality verdict as a guard
struct SurveyEngine;

#[async_trait]
impl GovernanceEngine for SurveyEngine {
    async fn execute(&self, request: EngineActionRequest) -> Result<(), EngineError> {
        println!(
            "[survey] inspecting {} target(s) with parameters {:?}",
            request.action_targets.len(),
            request.request_parameters
        );

        let _ = request.reporter.report_completion(
            request.action_id,
            EngineActionStatus::Actioned,
            BTreeSet::from(["good".to_string()]),
            Vec::new(),
            Some("all checks passed".to_string()),
        );
        Ok(())
    }
}

/// Handles whichever follow-up step the guards routed to
struct FollowUpEngine;

#[async_trait]
impl GovernanceEngine for FollowUpEngine {
    async fn execute(&self, request: EngineActionRequest) -> Result<(), EngineError> {
        println!(
            "[follow-up] running '{}' with received guards {:?}",
            request.request_type, request.received_guards
        );

        let _ = request.reporter.report_completion(
            request.action_id,
            EngineActionStatus::Actioned,
            BTreeSet::new(),
            Vec::new(),
            None,
        );
        Ok(())
    }
}

// ============================================================================
// Process authoring
// ============================================================================

async fn author_process(store: &InMemoryGovernanceStore) -> anyhow::Result<()> {
    let survey = ProcessStep {
        guid: Uuid::now_v7(),
        qualified_name: "asset-onboarding:survey".to_string(),
        display_name: "Survey the asset".to_string(),
        engine_name: "AssetSurvey".to_string(),
        request_type: "survey".to_string(),
        request_parameters: HashMap::from([("depth".to_string(), "full".to_string())]),
        ignore_multiple_triggers: true,
        wait_time: None,
    };
    let publish = ProcessStep {
        guid: Uuid::now_v7(),
        qualified_name: "asset-onboarding:publish".to_string(),
        display_name: "Publish to the catalog".to_string(),
        engine_name: "FollowUp".to_string(),
        request_type: "publish".to_string(),
        request_parameters: HashMap::new(),
        ignore_multiple_triggers: true,
        wait_time: None,
    };
    let triage = ProcessStep {
        guid: Uuid::now_v7(),
        qualified_name: "asset-onboarding:triage".to_string(),
        display_name: "Send to the triage queue".to_string(),
        engine_name: "FollowUp".to_string(),
        request_type: "triage".to_string(),
        request_parameters: HashMap::new(),
        ignore_multiple_triggers: true,
        wait_time: None,
    };

    let definition = ProcessDefinition {
        guid: Uuid::now_v7(),
        qualified_name: "gap:asset-onboarding".to_string(),
        display_name: "Asset onboarding".to_string(),
        description: Some("Survey a new asset, then publish or triage it".to_string()),
        status: ProcessStatus::Active,
        first_step: Some(FirstStepLink {
            step_guid: survey.guid,
            guard: Some("new-asset".to_string()),
        }),
    };

    store.create_process_definition(definition.clone()).await?;
    for step in [&survey, &publish, &triage] {
        store.create_process_step(definition.guid, step.clone()).await?;
    }
    store
        .create_next_step_link(NextStepLink {
            guid: Uuid::now_v7(),
            source_step_guid: survey.guid,
            target_step_guid: publish.guid,
            guard: Some("good".to_string()),
            mandatory_guard: true,
        })
        .await?;
    store
        .create_next_step_link(NextStepLink {
            guid: Uuid::now_v7(),
            source_step_guid: survey.guid,
            target_step_guid: triage.guid,
            guard: None,
            mandatory_guard: false,
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openactions_engine=info".into()),
        )
        .init();

    let store = Arc::new(InMemoryGovernanceStore::new());
    let registry = Arc::new(EngineRegistry::new());
    registry.register("AssetSurvey", Arc::new(SurveyEngine));
    registry.register("FollowUp", Arc::new(FollowUpEngine));

    author_process(&store).await?;

    let ctx = RuntimeContext::new("example-server", store.clone(), registry);
    let scheduler = EngineActionScheduler::start(ctx);

    let action_id = scheduler
        .initiate_governance_action_process(
            "gap:asset-onboarding",
            EngineActionInitiation::default()
                .with_action_targets(vec![NewActionTarget::new("asset", Uuid::now_v7())]),
        )
        .await?;
    println!("initiated process, entry action {action_id}");

    // Poll until every action of the run has reached a terminal status.
    while store.active_action_count() > 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    println!("\nexecution trail:");
    for record in scheduler.get_engine_actions(Pagination::default()).await? {
        println!(
            "  {} [{}] guards out: {:?}",
            record.display_name, record.status, record.completion_guards
        );
    }

    Ok(())
}
