//! System and help tools.

use serde_json::json;

use crate::envelope::ToolEnvelope;
use crate::domain::ChatKind;
use crate::registry::{CommandRegistry, ToolContext};
use crate::services::ServiceError;

use super::require_str;

/// Crate version reported by `version` and `/version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Liveness check.
pub async fn ping(ctx: &ToolContext) -> Result<ToolEnvelope, ServiceError> {
    Ok(ToolEnvelope::ok(format!(
        "Pong! The {} bot is alive.",
        ctx.chat_kind.display_name()
    )))
}

/// Version report.
pub async fn version() -> Result<ToolEnvelope, ServiceError> {
    Ok(ToolEnvelope::success(
        format!("KICKAI v{VERSION}"),
        json!({"version": VERSION}),
    ))
}

/// List the commands visible in the caller's chat, grouped by feature.
pub async fn get_available_commands(
    commands: &CommandRegistry,
    ctx: &ToolContext,
) -> Result<ToolEnvelope, ServiceError> {
    let groups = commands
        .grouped_for_chat(ctx.chat_kind)
        .map_err(|e| ServiceError::new(crate::errors::ErrorKind::SystemCritical, e.to_string()))?;

    let mut lines = vec![format!(
        "Commands available in the {}:",
        ctx.chat_kind.display_name()
    )];
    let mut names = Vec::new();
    for (feature, descriptors) in &groups {
        lines.push(String::new());
        lines.push(format!("{feature}:"));
        for descriptor in descriptors {
            lines.push(format!("  {} - {}", descriptor.name, descriptor.description));
            names.push(descriptor.name);
        }
    }

    Ok(ToolEnvelope::success(
        lines.join("\n"),
        json!({"commands": names, "count": names.len()}),
    ))
}

/// Help text for one command, respecting chat visibility.
pub async fn get_command_help(
    commands: &CommandRegistry,
    ctx: &ToolContext,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ServiceError> {
    let raw = require_str(args, "command")?;
    let name = if raw.starts_with('/') {
        raw.to_lowercase()
    } else {
        format!("/{}", raw.to_lowercase())
    };

    let descriptor = commands
        .get_visible(&name, ctx.chat_kind)
        .map_err(|e| ServiceError::new(crate::errors::ErrorKind::SystemCritical, e.to_string()))?
        .ok_or_else(|| {
            ServiceError::not_found(format!(
                "{name} is not available in the {}.",
                ctx.chat_kind.display_name()
            ))
        })?;

    Ok(ToolEnvelope::success(
        format!("{}: {}", descriptor.name, descriptor.description),
        json!({
            "command": descriptor.name,
            "feature": descriptor.feature,
            "description": descriptor.description,
        }),
    ))
}

/// The welcome text for the caller's chat.
pub async fn get_welcome_message(ctx: &ToolContext) -> Result<ToolEnvelope, ServiceError> {
    let message = match ctx.chat_kind {
        ChatKind::Main => "Welcome to the team chat! This bot keeps the roster and fixtures. \
                           Try /list to see active players, /myinfo for your own record, or \
                           /help for everything available here.",
        ChatKind::Leadership => "Welcome to the leadership chat. From here you manage the \
                                 roster (/addplayer, /addmember, /approve), fixtures \
                                 (/creatematch, /selectsquad), and announcements (/announce). \
                                 /help lists everything.",
    };
    Ok(ToolEnvelope::ok(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testutil;

    #[tokio::test]
    async fn available_commands_are_chat_scoped() {
        let deps = testutil::deps().await;

        let lead = get_available_commands(&deps.commands, &testutil::leadership_ctx())
            .await
            .expect("leadership listing");
        assert!(lead.message.contains("/addplayer"));

        let main = get_available_commands(&deps.commands, &testutil::main_ctx(7))
            .await
            .expect("main listing");
        assert!(!main.message.contains("/addplayer"));
        assert!(main.message.contains("/list"));
    }

    #[tokio::test]
    async fn command_help_accepts_bare_names() {
        let deps = testutil::deps().await;
        let envelope = get_command_help(
            &deps.commands,
            &testutil::leadership_ctx(),
            &json!({"command": "addplayer"}),
        )
        .await
        .expect("help");
        assert!(envelope.message.contains("/addplayer"));
    }

    #[tokio::test]
    async fn command_help_hides_out_of_scope_commands() {
        let deps = testutil::deps().await;
        let err = get_command_help(
            &deps.commands,
            &testutil::main_ctx(7),
            &json!({"command": "/addplayer"}),
        )
        .await
        .expect_err("hidden in main");
        assert_eq!(err.kind, crate::errors::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn ping_names_the_chat() {
        let envelope = ping(&testutil::main_ctx(7)).await.expect("ping");
        assert!(envelope.message.contains("main chat"));
    }
}
