//! Persistence contract for process definitions and engine action records
//!
//! The metadata tier itself is an external collaborator; this module defines
//! the abstract store the engine consumes plus an in-memory implementation
//! used for tests and embedded deployments.

mod memory;
mod store;

pub use memory::InMemoryGovernanceStore;
pub use store::{ActionFilter, GovernanceStore, Pagination, StoreError};
