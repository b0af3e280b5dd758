//! The default command inventory against its contract: completeness,
//! scoping, and permission assignments.

use kickai::domain::ChatKind;
use kickai::registry::commands::{default_inventory, ChatScope, CommandPermission};
use kickai::registry::CommandRegistry;

fn populated() -> CommandRegistry {
    let registry = CommandRegistry::new();
    registry
        .populate(default_inventory())
        .expect("populate once");
    registry
}

#[test]
fn inventory_covers_the_full_command_surface() {
    let registry = populated();
    for name in [
        "/help",
        "/myinfo",
        "/list",
        "/status",
        "/addplayer",
        "/addmember",
        "/approve",
        "/update",
        "/updateplayer",
        "/updatemember",
        "/creatematch",
        "/listmatches",
        "/selectsquad",
        "/announce",
        "/poll",
        "/remind",
        "/background",
        "/ping",
        "/version",
        "/register",
    ] {
        assert!(
            registry.get(name).expect("initialized").is_some(),
            "missing command {name}"
        );
    }
}

#[test]
fn admin_commands_are_leadership_only() {
    let registry = populated();
    for name in ["/addplayer", "/addmember", "/approve", "/updateplayer", "/updatemember"] {
        let descriptor = registry
            .get(name)
            .expect("initialized")
            .unwrap_or_else(|| panic!("missing {name}"));
        assert_eq!(descriptor.scope, ChatScope::LeadershipOnly, "{name}");
        assert_eq!(descriptor.permission, CommandPermission::Admin, "{name}");
    }
}

#[test]
fn every_command_routes_to_an_agent_or_builtin() {
    let registry = populated();
    for descriptor in registry
        .list_for_chat(ChatKind::Leadership)
        .expect("initialized")
    {
        let routed = kickai::agents::agent_for_command(descriptor.name, ChatKind::Leadership);
        assert!(
            routed.is_some() || descriptor.name == "/register",
            "{} has neither agent nor builtin",
            descriptor.name
        );
    }
}

#[test]
fn data_commands_require_data_backing() {
    let registry = populated();
    for name in ["/list", "/listmatches", "/myinfo", "/status", "/help"] {
        let descriptor = registry
            .get(name)
            .expect("initialized")
            .unwrap_or_else(|| panic!("missing {name}"));
        assert!(descriptor.requires_data, "{name} should require data");
    }
    let ping = registry
        .get("/ping")
        .expect("initialized")
        .expect("ping exists");
    assert!(!ping.requires_data);
}

#[test]
fn main_chat_listing_never_contains_leadership_commands() {
    let registry = populated();
    let main = registry.list_for_chat(ChatKind::Main).expect("initialized");
    for descriptor in main {
        assert_ne!(
            descriptor.scope,
            ChatScope::LeadershipOnly,
            "{} leaked into main chat",
            descriptor.name
        );
    }
}
