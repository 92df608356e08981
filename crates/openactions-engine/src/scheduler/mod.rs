//! Engine action scheduling and process fan-out
//!
//! The scheduler is the only component that mutates an engine action's
//! status. It creates records, drives them through dispatch, absorbs
//! completion reports from a channel and initiates successor actions
//! according to the guard router.

mod context;
mod executor;
mod initiation;

pub use context::RuntimeContext;
pub use executor::EngineActionScheduler;
pub use initiation::EngineActionInitiation;
