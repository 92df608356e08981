//! Process graph model and guard routing
//!
//! A process definition is materialized once into an immutable
//! [`ProcessGraph`] (arena of steps plus adjacency lists of guarded links)
//! and shared read-only across every action of the process. The
//! [`GuardRouter`] computes successor steps from the guards a completed
//! action emitted.

mod graph;
mod router;

pub use graph::ProcessGraph;
pub use router::GuardRouter;
