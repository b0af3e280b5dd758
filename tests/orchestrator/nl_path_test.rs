//! Natural-language routing through the NLPProcessor.

use std::sync::Arc;

use serde_json::json;

use kickai::domain::ChatKind;
use kickai::storage::PlayerRepository;

use crate::common::{
    self, harness, text_response, tool_response, FakeLlm, PLAYER_TG,
};

#[tokio::test]
async fn free_text_maps_to_command_semantic_and_runs_its_agent() {
    // 1st completion: the classifier maps the question to /list.
    // 2nd/3rd: the PlayerCoordinator run (tool, then final text).
    let llm = FakeLlm::scripted(vec![
        text_response(
            r#"{"intent": "list_players", "command": "/list", "agent": "player_coordinator", "parameters": {}}"#,
        ),
        tool_response("get_active_players", json!({})),
        text_response("Active players: John Smith (01JS)."),
    ]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let reply = h
        .handle(PLAYER_TG, ChatKind::Main, "who's on the team these days?")
        .await;
    assert!(reply.contains("John Smith"), "{reply}");
}

#[tokio::test]
async fn nl_mapped_command_still_enforces_permissions() {
    // The classifier maps a main-chat request to the leadership-only
    // /addplayer; the permission gate must fire before any agent runs.
    let llm = FakeLlm::scripted(vec![text_response(
        r#"{"intent": "add_player", "command": "/addplayer", "agent": "team_administrator",
            "parameters": {"name": "Mo", "phone": "+447111222999"}}"#,
    )]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let reply = h
        .handle(PLAYER_TG, ChatKind::Main, "please add Mo +447111222999 to the team")
        .await;

    assert!(reply.starts_with("Denied"), "{reply}");
    let players = h.storage.players(common::TEAM_ID).await.expect("players");
    assert_eq!(players.len(), 1, "no player was created");
}

#[tokio::test]
async fn unclassifiable_text_falls_back_to_message_processor() {
    let llm = FakeLlm::scripted(vec![
        text_response("no json here, sorry"),
        tool_response("get_my_status", json!({})),
        text_response("You are John Smith, an active striker."),
    ]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let reply = h.handle(PLAYER_TG, ChatKind::Main, "ehh what am I?").await;
    assert!(reply.contains("John Smith"), "{reply}");
}

#[tokio::test]
async fn suggested_agent_without_command_gets_the_free_text() {
    let llm = FakeLlm::scripted(vec![
        text_response(
            r#"{"intent": "ask_help", "command": null, "agent": "help_assistant", "parameters": {}}"#,
        ),
        tool_response("get_welcome_message", json!({})),
        text_response("This bot manages your team roster and fixtures."),
    ]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let reply = h
        .handle(PLAYER_TG, ChatKind::Main, "what is this bot for?")
        .await;
    assert!(reply.contains("roster"), "{reply}");
}
