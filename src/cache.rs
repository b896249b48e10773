//! Session caching for user profiles and bearer tokens.

pub mod entry;
pub mod session;
