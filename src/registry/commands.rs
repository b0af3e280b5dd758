//! Declarative command catalog with chat-scoped visibility.
//!
//! The inventory is fixed at compile time ([`default_inventory`]) and sealed
//! into the registry once at startup. Descriptors are immutable afterwards.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::domain::ChatKind;

use super::RegistryError;

/// Which chat(s) a command is visible and executable in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatScope {
    /// Players' chat only.
    MainOnly,
    /// Staff chat only.
    LeadershipOnly,
    /// Both chats.
    Any,
}

impl ChatScope {
    /// Whether the scope admits the given chat.
    pub fn admits(self, chat_kind: ChatKind) -> bool {
        match self {
            Self::Any => true,
            Self::MainOnly => chat_kind == ChatKind::Main,
            Self::LeadershipOnly => chat_kind == ChatKind::Leadership,
        }
    }

    /// The chat a scoped command belongs in, for "wrong chat" denials.
    pub fn home_chat(self) -> Option<ChatKind> {
        match self {
            Self::MainOnly => Some(ChatKind::Main),
            Self::LeadershipOnly => Some(ChatKind::Leadership),
            Self::Any => None,
        }
    }
}

/// Minimum classification required to run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandPermission {
    /// Anyone, registered or not.
    Public,
    /// Any registered identity.
    Player,
    /// Leaders and admins, leadership chat only.
    Leader,
    /// Admins, leadership chat only.
    Admin,
}

/// Immutable command metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Slash-prefixed name, lowercase.
    pub name: &'static str,
    /// Help text.
    pub description: &'static str,
    /// Feature grouping used by `/help`.
    pub feature: &'static str,
    /// Chat visibility.
    pub scope: ChatScope,
    /// Required permission.
    pub permission: CommandPermission,
    /// Whether a correct reply must be backed by at least one data-producing
    /// tool invocation (the orchestrator's hallucination guard).
    pub requires_data: bool,
}

struct Catalog {
    ordered: Vec<CommandDescriptor>,
    by_name: HashMap<&'static str, usize>,
}

/// One-shot sealed command registry.
pub struct CommandRegistry {
    catalog: OnceLock<Catalog>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
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
    pub fn populate(&self, inventory: Vec<CommandDescriptor>) -> Result<(), RegistryError> {
        let mut by_name = HashMap::with_capacity(inventory.len());
        for (idx, descriptor) in inventory.iter().enumerate() {
            if by_name.insert(descriptor.name, idx).is_some() {
                return Err(RegistryError::Duplicate(descriptor.name.to_owned()));
            }
        }
        let catalog = Catalog {
            ordered: inventory,
            by_name,
        };
        self.catalog
            .set(catalog)
            .map_err(|_| RegistryError::AlreadyInitialized)
    }

    /// Whether the registry has been populated.
    pub fn is_initialized(&self) -> bool {
        self.catalog.get().is_some()
    }

    fn catalog(&self) -> Result<&Catalog, RegistryError> {
        self.catalog.get().ok_or(RegistryError::NotInitialized)
    }

    /// Look up a descriptor by name regardless of chat scope.
    pub fn get(&self, name: &str) -> Result<Option<&CommandDescriptor>, RegistryError> {
        let catalog = self.catalog()?;
        Ok(catalog
            .by_name
            .get(name)
            .and_then(|&idx| catalog.ordered.get(idx)))
    }

    /// Look up a descriptor by name, hidden unless its scope admits the chat.
    pub fn get_visible(
        &self,
        name: &str,
        chat_kind: ChatKind,
    ) -> Result<Option<&CommandDescriptor>, RegistryError> {
        Ok(self
            .get(name)?
            .filter(|descriptor| descriptor.scope.admits(chat_kind)))
    }

    /// Commands visible in a chat, in inventory order.
    pub fn list_for_chat(
        &self,
        chat_kind: ChatKind,
    ) -> Result<Vec<&CommandDescriptor>, RegistryError> {
        Ok(self
            .catalog()?
            .ordered
            .iter()
            .filter(|descriptor| descriptor.scope.admits(chat_kind))
            .collect())
    }

    /// Commands visible in a chat, grouped by feature tag. Groups keep the
    /// order in which features first appear in the inventory.
    pub fn grouped_for_chat(
        &self,
        chat_kind: ChatKind,
    ) -> Result<Vec<(&'static str, Vec<&CommandDescriptor>)>, RegistryError> {
        let mut groups: Vec<(&'static str, Vec<&CommandDescriptor>)> = Vec::new();
        for descriptor in self.list_for_chat(chat_kind)? {
            match groups.iter_mut().find(|(tag, _)| *tag == descriptor.feature) {
                Some((_, bucket)) => bucket.push(descriptor),
                None => groups.push((descriptor.feature, vec![descriptor])),
            }
        }
        Ok(groups)
    }
}

/// The fixed command inventory.
pub fn default_inventory() -> Vec<CommandDescriptor> {
    use ChatScope::{Any, LeadershipOnly};
    use CommandPermission::{Admin, Leader, Player, Public};

    vec![
        CommandDescriptor {
            name: "/help",
            description: "List the commands available in this chat",
            feature: "system",
            scope: Any,
            permission: Public,
            requires_data: true,
        },
        CommandDescriptor {
            name: "/ping",
            description: "Check that the bot is alive",
            feature: "system",
            scope: Any,
            permission: Public,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/version",
            description: "Show the bot version",
            feature: "system",
            scope: Any,
            permission: Public,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/background",
            description: "Explain what this bot does",
            feature: "system",
            scope: Any,
            permission: Public,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/register",
            description: "Register as the first admin of a new team",
            feature: "onboarding",
            scope: LeadershipOnly,
            permission: Public,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/myinfo",
            description: "Show your own record",
            feature: "player",
            scope: Any,
            permission: Player,
            requires_data: true,
        },
        CommandDescriptor {
            name: "/status",
            description: "Show your registration status",
            feature: "player",
            scope: Any,
            permission: Player,
            requires_data: true,
        },
        CommandDescriptor {
            name: "/list",
            description: "List the team roster",
            feature: "player",
            scope: Any,
            permission: Player,
            requires_data: true,
        },
        CommandDescriptor {
            name: "/update",
            description: "Update one of your own fields: /update FIELD VALUE",
            feature: "player",
            scope: Any,
            permission: Player,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/addplayer",
            description: "Add a player: /addplayer NAME PHONE",
            feature: "team administration",
            scope: LeadershipOnly,
            permission: Admin,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/addmember",
            description: "Add a staff member: /addmember NAME PHONE ROLE",
            feature: "team administration",
            scope: LeadershipOnly,
            permission: Admin,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/approve",
            description: "Approve a pending player: /approve PLAYER_ID",
            feature: "team administration",
            scope: LeadershipOnly,
            permission: Admin,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/updateplayer",
            description: "Update a player's field: /updateplayer PLAYER_ID FIELD VALUE",
            feature: "team administration",
            scope: LeadershipOnly,
            permission: Admin,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/updatemember",
            description: "Update a member's field: /updatemember MEMBER_ID FIELD VALUE",
            feature: "team administration",
            scope: LeadershipOnly,
            permission: Admin,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/creatematch",
            description: "Create a fixture: /creatematch OPPONENT DATE TIME LOCATION",
            feature: "matches",
            scope: LeadershipOnly,
            permission: Leader,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/listmatches",
            description: "List upcoming fixtures",
            feature: "matches",
            scope: Any,
            permission: Player,
            requires_data: true,
        },
        CommandDescriptor {
            name: "/selectsquad",
            description: "Select the squad for a fixture: /selectsquad MATCH_ID PLAYER_IDS",
            feature: "matches",
            scope: LeadershipOnly,
            permission: Leader,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/announce",
            description: "Compose a team announcement",
            feature: "communications",
            scope: LeadershipOnly,
            permission: Leader,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/poll",
            description: "Compose a team poll",
            feature: "communications",
            scope: LeadershipOnly,
            permission: Leader,
            requires_data: false,
        },
        CommandDescriptor {
            name: "/remind",
            description: "Compose a reminder",
            feature: "communications",
            scope: LeadershipOnly,
            permission: Leader,
            requires_data: false,
        },
    ]
}
