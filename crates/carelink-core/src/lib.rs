//! Domain types and seams of the CareLink hybrid assistant.

pub mod config;
pub mod conversation;
pub mod error;
pub mod secret;

// Re-export common error type
pub use error::{CarelinkError, Result};
