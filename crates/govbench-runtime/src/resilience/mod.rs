//! Resilience patterns for model calls.
//!
//! Model output is unreliable in two ways: the call can fail, and the text
//! can fail to contain the record we asked for. Both count as a failed
//! attempt and are retried alike.

mod retry;

pub use retry::{AttemptError, RetryError, RetryPolicy};
