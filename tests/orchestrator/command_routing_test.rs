//! Tests for command detection, permission checks, and the agent run loop.

use std::sync::Arc;

use serde_json::json;

use kickai::domain::ChatKind;
use kickai::orchestrator::UNVERIFIED_REPLY;
use kickai::storage::{MemberRepository, PlayerRepository};

use crate::common::{
    self, harness, tool_response, text_response, FakeLlm, ADMIN_TG, PLAYER_TG,
};

#[tokio::test]
async fn unknown_command_lists_visible_commands() {
    let h = harness(Arc::new(FakeLlm::text("unused"))).await;
    h.seed_admin().await;

    let reply = h.handle(ADMIN_TG, ChatKind::Leadership, "/helpp").await;

    assert!(reply.contains("Unrecognized Command: /helpp"), "{reply}");
    // Grouped by feature, listing leadership commands.
    assert!(reply.contains("team administration"), "{reply}");
    assert!(reply.contains("/addplayer"), "{reply}");
}

#[tokio::test]
async fn unknown_command_in_main_hides_leadership_commands() {
    let h = harness(Arc::new(FakeLlm::text("unused"))).await;
    h.seed_player().await;

    let reply = h.handle(PLAYER_TG, ChatKind::Main, "/helpp").await;

    assert!(reply.contains("Unrecognized Command"), "{reply}");
    assert!(!reply.contains("/addplayer"), "{reply}");
}

#[tokio::test]
async fn leadership_only_command_denied_in_main_chat() {
    let h = harness(Arc::new(FakeLlm::text("unused"))).await;
    h.seed_admin().await;
    h.seed_player().await;

    let reply = h
        .handle(PLAYER_TG, ChatKind::Main, "/addplayer Mo Salah +447111222999")
        .await;

    assert!(reply.starts_with("Denied"), "{reply}");
    assert!(reply.contains("leadership chat"), "{reply}");
    // Storage unchanged: nothing was provisioned.
    let players = h.storage.players(common::TEAM_ID).await.expect("players");
    assert_eq!(players.len(), 1);
}

#[tokio::test]
async fn admin_command_denied_for_non_admin_in_leadership() {
    let h = harness(Arc::new(FakeLlm::text("unused"))).await;
    h.seed_admin().await;
    // A non-admin member.
    h.storage
        .insert_member(&kickai::domain::Member {
            member_id: "M02AB".to_owned(),
            team_id: common::TEAM_ID.to_owned(),
            telegram_id: Some(55),
            name: "Helper".to_owned(),
            phone: "+447000000002".to_owned(),
            role: "kit manager".to_owned(),
            is_admin: false,
            status: kickai::domain::SubjectStatus::Active,
            created_at: chrono::Utc::now(),
        })
        .await
        .expect("seed member");

    let reply = h
        .handle(55, ChatKind::Leadership, "/addplayer Mo Salah +447111222999")
        .await;

    assert!(reply.starts_with("Denied"), "{reply}");
    assert!(reply.contains("admin"), "{reply}");
}

#[tokio::test]
async fn unregistered_sender_reaches_no_agent_and_no_tools() {
    let llm = Arc::new(FakeLlm::text("should never be asked"));
    let h = harness(llm.clone()).await;
    h.seed_admin().await;

    let reply = h.handle(999, ChatKind::Main, "what's my phone number?").await;

    assert!(reply.contains("not registered"), "{reply}");
    assert_eq!(llm.call_count(), 0, "unregistered senders must not reach the LLM");
}

#[tokio::test]
async fn ping_command_runs_help_assistant_with_tool() {
    let llm = FakeLlm::scripted(vec![
        tool_response("ping", json!({})),
        text_response("Pong! The bot is alive."),
    ]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let reply = h.handle(PLAYER_TG, ChatKind::Main, "/ping").await;
    assert!(reply.contains("Pong"), "{reply}");
}

#[tokio::test]
async fn data_command_without_data_tool_is_withheld() {
    // The agent answers /list from thin air without calling any tool.
    let llm = FakeLlm::text("We have 42 players: Ronaldo, Messi, ...");
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let reply = h.handle(PLAYER_TG, ChatKind::Main, "/list").await;
    assert_eq!(reply, UNVERIFIED_REPLY);
}

#[tokio::test]
async fn data_command_with_data_tool_is_accepted() {
    let llm = FakeLlm::scripted(vec![
        tool_response("get_active_players", json!({})),
        text_response("Active players: John Smith (01JS)."),
    ]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let reply = h.handle(PLAYER_TG, ChatKind::Main, "/list").await;
    assert!(reply.contains("John Smith"), "{reply}");
}

#[tokio::test]
async fn agent_reply_is_sanitized_to_plain_text() {
    let llm = FakeLlm::scripted(vec![
        tool_response("get_active_players", json!({})),
        text_response("*Active* _players_: `John Smith` <b>(01JS)</b>"),
    ]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let reply = h.handle(PLAYER_TG, ChatKind::Main, "/list").await;
    for token in ['*', '_', '`', '<'] {
        assert!(!reply.contains(token), "markup {token} survived: {reply}");
    }
}

#[tokio::test]
async fn tool_outside_agent_set_is_refused_but_recoverable() {
    // HelpAssistant tries create_player (not in its set), then recovers.
    let llm = FakeLlm::scripted(vec![
        tool_response("create_player", json!({"name": "X", "phone": "+447111000000"})),
        text_response("I cannot create players from here."),
    ]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let reply = h.handle(PLAYER_TG, ChatKind::Main, "/ping").await;
    assert!(reply.contains("cannot create players"), "{reply}");
    // The refused tool must not have side effects.
    let players = h.storage.players(common::TEAM_ID).await.expect("players");
    assert_eq!(players.len(), 1);
}

#[tokio::test]
async fn uninitialized_registries_fail_fast_without_agent_invocation() {
    let llm = Arc::new(FakeLlm::text("must never run"));
    let h = crate::common::harness_without_registries(llm.clone()).await;
    h.seed_admin().await;

    let reply = h.handle(ADMIN_TG, ChatKind::Leadership, "/help").await;

    assert_eq!(reply, kickai::orchestrator::SYSTEM_UNAVAILABLE_REPLY);
    assert_eq!(llm.call_count(), 0, "no agent may run without registries");
}

#[tokio::test]
async fn command_executions_are_audited() {
    let llm = FakeLlm::scripted(vec![
        tool_response("ping", json!({})),
        text_response("Pong."),
    ]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let _ = h.handle(PLAYER_TG, ChatKind::Main, "/ping").await;

    // The audit append is spawned; give it a moment.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    use kickai::storage::CommandAuditRepository;
    let audits = h.storage.audits(common::TEAM_ID).await.expect("audits");
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].command, "/ping");
    assert_eq!(audits[0].outcome, "completed");
}
