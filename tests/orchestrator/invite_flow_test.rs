//! End-to-end invite lifecycle: /addplayer issues a link, the invited user
//! redeems it in the main chat, re-redemption is rejected.

use std::sync::Arc;

use serde_json::json;

use kickai::domain::{ChatKind, SubjectStatus};
use kickai::storage::PlayerRepository;

use crate::common::{
    self, harness, text_response, tool_response, FakeLlm, ADMIN_TG,
};

/// Run /addplayer through the TeamAdministrator agent and return the reply.
async fn add_player(h: &crate::common::Harness) -> String {
    h.handle(
        ADMIN_TG,
        ChatKind::Leadership,
        "/addplayer Mohamed Salah +447111222333",
    )
    .await
}

/// Scripted agent run: call create_player, then return an empty final text
/// so the orchestrator falls back to the tool envelope's message (which
/// carries the player id and invite URL verbatim).
fn scripted_addplayer_llm() -> FakeLlm {
    FakeLlm::scripted(vec![
        tool_response(
            "create_player",
            json!({"name": "Mohamed Salah", "phone": "+447111222333"}),
        ),
        text_response(""),
    ])
}

#[tokio::test]
async fn addplayer_creates_pending_player_with_invite_url() {
    let h = harness(Arc::new(scripted_addplayer_llm())).await;
    h.seed_admin().await;

    let reply = add_player(&h).await;

    // Reply carries the player id and the invite URL parameters.
    assert!(reply.contains("type=player"), "{reply}");
    assert!(reply.contains(&format!("chat={}", common::MAIN_CHAT)), "{reply}");
    assert!(reply.contains(&format!("team={}", common::TEAM_ID)), "{reply}");

    let players = h.storage.players(common::TEAM_ID).await.expect("players");
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].status, SubjectStatus::Pending);
    assert!(players[0].telegram_id.is_none());
}

#[tokio::test]
async fn invited_user_redeems_in_main_chat() {
    let h = harness(Arc::new(scripted_addplayer_llm())).await;
    h.seed_admin().await;

    let reply = add_player(&h).await;
    let url = extract_url(&reply);

    // The invited user posts the link as their first message in main chat.
    let welcome = h.handle(555, ChatKind::Main, &format!("hi, joining: {url}")).await;
    assert!(welcome.contains("Welcome to the team"), "{welcome}");

    let players = h.storage.players(common::TEAM_ID).await.expect("players");
    assert_eq!(players[0].status, SubjectStatus::Active);
    assert_eq!(players[0].telegram_id, Some(555));
}

#[tokio::test]
async fn second_redemption_is_rejected_and_state_unchanged() {
    let h = harness(Arc::new(scripted_addplayer_llm())).await;
    h.seed_admin().await;

    let reply = add_player(&h).await;
    let url = extract_url(&reply);

    let first = h.handle(555, ChatKind::Main, &url).await;
    assert!(first.contains("Welcome"), "{first}");

    let second = h.handle(666, ChatKind::Main, &url).await;
    assert!(second.contains("Invite already used"), "{second}");

    // The loser must not have rebound the player.
    let players = h.storage.players(common::TEAM_ID).await.expect("players");
    assert_eq!(players[0].telegram_id, Some(555));
    assert_eq!(players[0].status, SubjectStatus::Active);
}

#[tokio::test]
async fn invite_token_in_leadership_chat_is_rejected() {
    let h = harness(Arc::new(scripted_addplayer_llm())).await;
    h.seed_admin().await;

    let reply = add_player(&h).await;
    let url = extract_url(&reply);

    // An unregistered sender presenting a main-chat invite in leadership.
    let rejection = h.handle(555, ChatKind::Leadership, &url).await;
    assert!(!rejection.contains("Welcome to the team"), "{rejection}");

    let players = h.storage.players(common::TEAM_ID).await.expect("players");
    assert_eq!(players[0].status, SubjectStatus::Pending);
}

#[tokio::test]
async fn concurrent_redemptions_have_exactly_one_winner() {
    let h = harness(Arc::new(scripted_addplayer_llm())).await;
    h.seed_admin().await;

    let reply = add_player(&h).await;
    let url = extract_url(&reply);

    let (a, b) = tokio::join!(
        h.handle(555, ChatKind::Main, &url),
        h.handle(666, ChatKind::Main, &url),
    );

    let winners = [&a, &b]
        .iter()
        .filter(|r| r.contains("Welcome to the team"))
        .count();
    let losers = [&a, &b]
        .iter()
        .filter(|r| r.contains("Invite already used"))
        .count();
    assert_eq!(winners, 1, "a={a} b={b}");
    assert_eq!(losers, 1, "a={a} b={b}");

    let players = h.storage.players(common::TEAM_ID).await.expect("players");
    assert_eq!(players[0].status, SubjectStatus::Active);
}

/// Pull the invite URL out of a reply.
fn extract_url(reply: &str) -> String {
    reply
        .split_whitespace()
        .find(|token| token.contains("invite="))
        .unwrap_or_else(|| panic!("no invite url in reply: {reply}"))
        .to_owned()
}
