//! Process-wide command and tool catalogs.
//!
//! Both registries are one-shot: created empty, populated exactly once during
//! startup, then read-only and lock-free. Reads before population are a
//! structural failure (`SystemCritical` at the orchestrator boundary) -- there
//! is no degraded mode that processes updates without registry validation.

use thiserror::Error;

pub mod commands;
pub mod tools;

pub use commands::{ChatScope, CommandDescriptor, CommandPermission, CommandRegistry};
pub use tools::{ToolContext, ToolDefinition, ToolDescriptor, ToolRegistry};

/// Registry lifecycle errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A read arrived before `populate` -- fail-fast, never degrade.
    #[error("registry accessed before initialization")]
    NotInitialized,
    /// `populate` was called twice; first write wins.
    #[error("registry already initialized")]
    AlreadyInitialized,
    /// The inventory handed to `populate` contained a duplicate name.
    #[error("duplicate registration: {0}")]
    Duplicate(String),
}
