// Shared contracts for the governance action orchestration engine.
// This crate defines the process definition model (steps and guarded
// next-step links) and the engine action execution records exchanged
// between the engine and any calling layer.

pub mod action;
pub mod process;

pub use action::*;
pub use process::*;
