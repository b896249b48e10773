//! Retry-with-backoff primitives for flaky asynchronous calls.

pub mod executor;
pub mod operation;
