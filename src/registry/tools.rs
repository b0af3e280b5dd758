//! Typed tool catalog.
//!
//! Tools are registered explicitly at startup from a static inventory (no
//! runtime inspection) and sealed, mirroring the command registry. Each
//! descriptor binds a name to an async handler that always returns the
//! uniform JSON envelope.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::domain::ChatKind;
use crate::envelope::ToolEnvelope;
use crate::errors::ErrorKind;

use super::RegistryError;

/// Caller identity threaded into every tool invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Telegram identity of the requesting user.
    pub telegram_id: i64,
    /// Resolved team.
    pub team_id: String,
    /// Telegram username or roster display name.
    pub username: String,
    /// Chat the request originated in.
    pub chat_kind: ChatKind,
}

/// Boxed future returned by tool handlers.
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolEnvelope> + Send>>;

/// The handler signature every tool implements.
pub type ToolHandler = Arc<dyn Fn(ToolContext, serde_json::Value) -> ToolFuture + Send + Sync>;

/// Projection of a descriptor handed to the LLM as its tool catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name (matches registry registration).
    pub name: String,
    /// Description shown to the LLM.
    pub description: String,
    /// JSON Schema object for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A registered tool: metadata plus handler.
#[derive(Clone)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Description shown to the LLM.
    pub description: String,
    /// JSON Schema object for the tool's parameters.
    pub parameters: serde_json::Value,
    /// Whether the tool produces roster/fixture data. The orchestrator's
    /// hallucination guard only accepts data-backed replies for commands
    /// that require data, and this flag is its allow-list -- kept in sync
    /// with the registry by construction.
    pub produces_data: bool,
    handler: ToolHandler,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("produces_data", &self.produces_data)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// Build a descriptor from its parts.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        produces_data: bool,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            produces_data,
            handler,
        }
    }

    /// The LLM-facing projection.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// One-shot sealed tool registry.
pub struct ToolRegistry {
    catalog: OnceLock<HashMap<String, ToolDescriptor>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an unpopulated registry.
    pub fn new() -> Self {
        Self {
            catalog: OnceLock::new(),
        }
    }

    /// Seal the registry with the given inventory. First write wins.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` on a second call, `Duplicate` on a repeated name.
    pub fn populate(&self, inventory: Vec<ToolDescriptor>) -> Result<(), RegistryError> {
        let mut catalog = HashMap::with_capacity(inventory.len());
        for descriptor in inventory {
            let name = descriptor.name.clone();
            if catalog.insert(name.clone(), descriptor).is_some() {
                return Err(RegistryError::Duplicate(name));
            }
        }
        self.catalog
            .set(catalog)
            .map_err(|_| RegistryError::AlreadyInitialized)
    }

    /// Whether the registry has been populated.
    pub fn is_initialized(&self) -> bool {
        self.catalog.get().is_some()
    }

    fn catalog(&self) -> Result<&HashMap<String, ToolDescriptor>, RegistryError> {
        self.catalog.get().ok_or(RegistryError::NotInitialized)
    }

    /// Look up a descriptor by name.
    pub fn get(&self, name: &str) -> Result<Option<&ToolDescriptor>, RegistryError> {
        Ok(self.catalog()?.get(name))
    }

    /// Number of registered tools.
    pub fn count(&self) -> usize {
        self.catalog.get().map(HashMap::len).unwrap_or(0)
    }

    /// LLM catalog for an agent's permitted tool names. Unknown names are
    /// skipped: agents only ever see registered tools.
    pub fn definitions_for(&self, names: &[&str]) -> Result<Vec<ToolDefinition>, RegistryError> {
        let catalog = self.catalog()?;
        Ok(names
            .iter()
            .filter_map(|name| catalog.get(*name))
            .map(ToolDescriptor::definition)
            .collect())
    }

    /// Whether a registered tool is marked as data-producing.
    pub fn is_data_tool(&self, name: &str) -> bool {
        self.catalog
            .get()
            .and_then(|catalog| catalog.get(name))
            .is_some_and(|descriptor| descriptor.produces_data)
    }

    /// Invoke a tool by name.
    ///
    /// An unknown name yields an `InvalidInput` error envelope rather than a
    /// panic: agents can hallucinate tool names, and the envelope is how the
    /// orchestrator reasons about that.
    ///
    /// # Errors
    ///
    /// `NotInitialized` if the registry has not been sealed.
    pub async fn invoke(
        &self,
        name: &str,
        ctx: ToolContext,
        args: serde_json::Value,
    ) -> Result<ToolEnvelope, RegistryError> {
        let catalog = self.catalog()?;
        match catalog.get(name) {
            Some(descriptor) => Ok((descriptor.handler)(ctx, args).await),
            None => Ok(ToolEnvelope::error(
                ErrorKind::InvalidInput,
                format!("unknown tool: {name}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool(name: &str, produces_data: bool) -> ToolDescriptor {
        ToolDescriptor::new(
            name,
            "echo",
            json!({"type": "object", "properties": {}}),
            produces_data,
            Arc::new(|ctx, _args| {
                Box::pin(async move { ToolEnvelope::ok(format!("hello {}", ctx.username)) })
            }),
        )
    }

    fn ctx() -> ToolContext {
        ToolContext {
            telegram_id: 1,
            team_id: "KAI".to_owned(),
            username: "coach".to_owned(),
            chat_kind: ChatKind::Leadership,
        }
    }

    #[tokio::test]
    async fn invoke_before_population_fails() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke("ping", ctx(), json!({}))
            .await
            .expect_err("not initialized");
        assert_eq!(err, RegistryError::NotInitialized);
    }

    #[tokio::test]
    async fn invoke_known_tool() {
        let registry = ToolRegistry::new();
        registry
            .populate(vec![echo_tool("ping", false)])
            .expect("populate");
        let envelope = registry
            .invoke("ping", ctx(), json!({}))
            .await
            .expect("initialized");
        assert!(envelope.is_success());
        assert_eq!(envelope.message, "hello coach");
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_envelope() {
        let registry = ToolRegistry::new();
        registry
            .populate(vec![echo_tool("ping", false)])
            .expect("populate");
        let envelope = registry
            .invoke("fabricated", ctx(), json!({}))
            .await
            .expect("initialized");
        assert!(!envelope.is_success());
        assert_eq!(envelope.error_kind, Some(ErrorKind::InvalidInput));
    }

    #[test]
    fn data_flag_follows_registration() {
        let registry = ToolRegistry::new();
        registry
            .populate(vec![echo_tool("list_things", true), echo_tool("ping", false)])
            .expect("populate");
        assert!(registry.is_data_tool("list_things"));
        assert!(!registry.is_data_tool("ping"));
        assert!(!registry.is_data_tool("missing"));
    }

    #[test]
    fn definitions_for_skips_unknown_names() {
        let registry = ToolRegistry::new();
        registry
            .populate(vec![echo_tool("ping", false)])
            .expect("populate");
        let defs = registry
            .definitions_for(&["ping", "not_registered"])
            .expect("initialized");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "ping");
    }
}
