//! Authorization and identity.
//!
//! Maps `(telegram_id, team_id, chat_kind)` to a [`UserContext`] by looking
//! up the team roster, then answers permission and chat-scope questions for
//! the orchestrator. Classification is chat-aware: the same person is a
//! player in the main chat and a leader/admin in the leadership chat.

use crate::domain::{ChatKind, Classification, UserContext};
use crate::registry::commands::CommandPermission;
use crate::storage::{MemberRepository, PlayerRepository, SharedStorage, StorageError};

/// Roster-backed identity resolution.
pub struct AuthService {
    storage: SharedStorage,
}

impl AuthService {
    /// Create a resolver over the given storage.
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Build the per-update [`UserContext`]. Never cached: the classification
    /// depends on the chat of origin.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the roster cannot be read.
    pub async fn resolve(
        &self,
        telegram_id: i64,
        username: Option<&str>,
        team_id: &str,
        chat_kind: ChatKind,
    ) -> Result<UserContext, StorageError> {
        let player = self
            .storage
            .player_by_telegram(team_id, telegram_id)
            .await?
            .filter(|p| p.is_active());
        let member = self
            .storage
            .member_by_telegram(team_id, telegram_id)
            .await?
            .filter(|m| m.is_active());

        let classification = match chat_kind {
            ChatKind::Main => match (&player, &member) {
                (Some(_), _) => Classification::Player,
                (None, Some(_)) => Classification::Member,
                (None, None) => Classification::Unregistered,
            },
            ChatKind::Leadership => match (&member, &player) {
                (Some(m), _) if m.is_admin => Classification::Admin,
                (Some(_), _) => Classification::Leader,
                (None, Some(_)) => Classification::Player,
                (None, None) => Classification::Unregistered,
            },
        };

        let display_name = member
            .as_ref()
            .map(|m| m.name.clone())
            .or_else(|| player.as_ref().map(|p| p.name.clone()))
            .or_else(|| username.map(ToOwned::to_owned))
            .unwrap_or_else(|| "there".to_owned());

        Ok(UserContext {
            telegram_id,
            username: username.map(ToOwned::to_owned),
            team_id: team_id.to_owned(),
            chat_kind,
            classification,
            player_id: player.map(|p| p.player_id),
            member_id: member.map(|m| m.member_id),
            display_name,
        })
    }
}

/// The permission lattice enforced before any agent invocation.
pub fn permission_allows(
    permission: CommandPermission,
    classification: Classification,
    chat_kind: ChatKind,
) -> bool {
    match permission {
        CommandPermission::Public => true,
        CommandPermission::Player => classification.is_registered(),
        CommandPermission::Leader => {
            classification.is_leader() && chat_kind == ChatKind::Leadership
        }
        CommandPermission::Admin => {
            classification == Classification::Admin && chat_kind == ChatKind::Leadership
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;

    use crate::domain::{Member, Player, Position, SubjectStatus};
    use crate::storage::memory::InMemoryStorage;
    use crate::storage::{MemberRepository, PlayerRepository};

    fn player(telegram_id: i64, status: SubjectStatus) -> Player {
        Player {
            player_id: "01JS".to_owned(),
            team_id: "KAI".to_owned(),
            telegram_id: Some(telegram_id),
            name: "John Smith".to_owned(),
            phone: "+447111222333".to_owned(),
            email: None,
            emergency_contact: None,
            position: Position::Striker,
            status,
            created_at: Utc::now(),
        }
    }

    fn member(telegram_id: i64, is_admin: bool) -> Member {
        Member {
            member_id: "M01JK".to_owned(),
            team_id: "KAI".to_owned(),
            telegram_id: Some(telegram_id),
            name: "Jane Kay".to_owned(),
            phone: "+447000000001".to_owned(),
            role: "coach".to_owned(),
            is_admin,
            status: SubjectStatus::Active,
            created_at: Utc::now(),
        }
    }

    async fn auth_with(
        players: Vec<Player>,
        members: Vec<Member>,
    ) -> AuthService {
        let storage = InMemoryStorage::new();
        for p in &players {
            storage.insert_player(p).await.expect("insert player");
        }
        for m in &members {
            storage.insert_member(m).await.expect("insert member");
        }
        AuthService::new(Arc::new(storage))
    }

    #[tokio::test]
    async fn unknown_sender_is_unregistered() {
        let auth = auth_with(vec![], vec![]).await;
        let ctx = auth
            .resolve(42, Some("ghost"), "KAI", ChatKind::Main)
            .await
            .expect("resolve");
        assert_eq!(ctx.classification, Classification::Unregistered);
        assert!(ctx.player_id.is_none());
        assert_eq!(ctx.display_name, "ghost");
    }

    #[tokio::test]
    async fn active_player_in_main_is_player() {
        let auth = auth_with(vec![player(42, SubjectStatus::Active)], vec![]).await;
        let ctx = auth
            .resolve(42, None, "KAI", ChatKind::Main)
            .await
            .expect("resolve");
        assert_eq!(ctx.classification, Classification::Player);
        assert_eq!(ctx.player_id.as_deref(), Some("01JS"));
    }

    #[tokio::test]
    async fn pending_player_is_unregistered() {
        let auth = auth_with(vec![player(42, SubjectStatus::Pending)], vec![]).await;
        let ctx = auth
            .resolve(42, None, "KAI", ChatKind::Main)
            .await
            .expect("resolve");
        assert_eq!(ctx.classification, Classification::Unregistered);
    }

    #[tokio::test]
    async fn active_player_in_leadership_stays_player() {
        let auth = auth_with(vec![player(42, SubjectStatus::Active)], vec![]).await;
        let ctx = auth
            .resolve(42, None, "KAI", ChatKind::Leadership)
            .await
            .expect("resolve");
        assert_eq!(ctx.classification, Classification::Player);
    }

    #[tokio::test]
    async fn admin_member_in_leadership_is_admin() {
        let auth = auth_with(vec![], vec![member(7, true)]).await;
        let ctx = auth
            .resolve(7, None, "KAI", ChatKind::Leadership)
            .await
            .expect("resolve");
        assert_eq!(ctx.classification, Classification::Admin);
        assert_eq!(ctx.member_id.as_deref(), Some("M01JK"));

        let ctx_main = auth
            .resolve(7, None, "KAI", ChatKind::Main)
            .await
            .expect("resolve");
        assert_eq!(ctx_main.classification, Classification::Member);
    }

    #[tokio::test]
    async fn non_admin_member_in_leadership_is_leader() {
        let auth = auth_with(vec![], vec![member(7, false)]).await;
        let ctx = auth
            .resolve(7, None, "KAI", ChatKind::Leadership)
            .await
            .expect("resolve");
        assert_eq!(ctx.classification, Classification::Leader);
    }

    #[test]
    fn permission_lattice() {
        use Classification::{Admin, Leader, Member, Player, Unregistered};
        use CommandPermission as P;

        // public: anyone, anywhere
        assert!(permission_allows(P::Public, Unregistered, ChatKind::Main));

        // player: any registered identity
        assert!(permission_allows(P::Player, Player, ChatKind::Main));
        assert!(permission_allows(P::Player, Member, ChatKind::Main));
        assert!(permission_allows(P::Player, Leader, ChatKind::Leadership));
        assert!(permission_allows(P::Player, Admin, ChatKind::Leadership));
        assert!(!permission_allows(P::Player, Unregistered, ChatKind::Main));

        // leader: leadership chat only
        assert!(permission_allows(P::Leader, Leader, ChatKind::Leadership));
        assert!(permission_allows(P::Leader, Admin, ChatKind::Leadership));
        assert!(!permission_allows(P::Leader, Leader, ChatKind::Main));
        assert!(!permission_allows(P::Leader, Player, ChatKind::Leadership));

        // admin: admins in the leadership chat only
        assert!(permission_allows(P::Admin, Admin, ChatKind::Leadership));
        assert!(!permission_allows(P::Admin, Admin, ChatKind::Main));
        assert!(!permission_allows(P::Admin, Leader, ChatKind::Leadership));
    }
}
