//! Retry behavior for transient dispatch failures

mod retry;

pub use retry::RetryPolicy;
