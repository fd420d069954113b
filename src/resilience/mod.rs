//! Resilience - retry with exponential backoff for node attempts

mod retry;

pub use retry::{Attempted, RetryConfig, RetryPolicy};
