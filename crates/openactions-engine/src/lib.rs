//! # Governance Action Orchestration Engine
//!
//! A workflow engine for governance action processes: directed graphs of
//! process steps joined by guarded links, executed by dispatching engine
//! actions to named governance engines and routing on the guards they emit.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  EngineActionScheduler                       │
//! │  (creates records, advances the state machine, fans out)    │
//! └─────────────────────────────────────────────────────────────┘
//!             │                                  ▲
//!             ▼                                  │ completion reports
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │     EngineDispatcher      │   │      GuardRouter              │
//! │  (registry lookup, retry) │   │  (pure successor-step match)  │
//! └──────────────────────────┘   └──────────────────────────────┘
//!             │                                  ▲
//!             ▼                                  │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    GovernanceStore                           │
//! │  (process definitions, steps, links, engine action records) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use openactions_engine::prelude::*;
//!
//! let store = Arc::new(InMemoryGovernanceStore::new());
//! let registry = Arc::new(EngineRegistry::new());
//! registry.register("AssetSurvey", Arc::new(MySurveyEngine));
//!
//! let ctx = RuntimeContext::new("governance-server", store, registry);
//! let scheduler = EngineActionScheduler::start(ctx);
//!
//! let action_id = scheduler
//!     .initiate_governance_action_process(
//!         "clinical-trials:onboarding",
//!         EngineActionInitiation::default(),
//!     )
//!     .await?;
//! ```

pub mod dispatch;
pub mod error;
pub mod persistence;
pub mod process;
pub mod reliability;
pub mod scheduler;

/// Prelude for common imports
pub mod prelude {
    pub use crate::dispatch::{
        CompletionReporter, DispatchError, EngineActionRequest, EngineDispatcher, EngineError,
        EngineRegistry, GovernanceEngine,
    };
    pub use crate::error::GovernanceError;
    pub use crate::persistence::{
        ActionFilter, GovernanceStore, InMemoryGovernanceStore, Pagination, StoreError,
    };
    pub use crate::process::{GuardRouter, ProcessGraph};
    pub use crate::reliability::RetryPolicy;
    pub use crate::scheduler::{EngineActionInitiation, EngineActionScheduler, RuntimeContext};
}

// Re-export key types at crate root
pub use dispatch::{
    CompletionReporter, DispatchError, EngineActionRequest, EngineDispatcher, EngineError,
    EngineRegistry, GovernanceEngine,
};
pub use error::GovernanceError;
pub use persistence::{
    ActionFilter, GovernanceStore, InMemoryGovernanceStore, Pagination, StoreError,
};
pub use process::{GuardRouter, ProcessGraph};
pub use reliability::RetryPolicy;
pub use scheduler::{EngineActionInitiation, EngineActionScheduler, RuntimeContext};
