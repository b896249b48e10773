//! Integration tests for the session cache and retry wrapper.

mod retrying_operation;
mod session_cache;
