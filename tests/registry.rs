//! Integration tests for the command and tool registries.

#[path = "registry/commands_test.rs"]
mod commands_test;
