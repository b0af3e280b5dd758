//! First-user bootstrap: an empty leadership chat only accepts /register.

use std::sync::Arc;

use kickai::domain::ChatKind;
use kickai::orchestrator::FIRST_USER_PROMPT;
use kickai::storage::MemberRepository;

use crate::common::{self, harness, FakeLlm};

#[tokio::test]
async fn empty_leadership_chat_prompts_for_registration() {
    let llm = Arc::new(FakeLlm::text("unused"));
    let h = harness(llm.clone()).await;

    // Scenario: /help from the very first user must NOT produce a help
    // listing; it produces the first-user prompt, and no agent runs.
    let reply = h.handle(77, ChatKind::Leadership, "/help").await;
    assert_eq!(reply, kickai::format::sanitize_plain_text(FIRST_USER_PROMPT));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn register_creates_the_founding_admin() {
    let h = harness(Arc::new(FakeLlm::text("unused"))).await;

    let reply = h
        .handle(
            77,
            ChatKind::Leadership,
            "/register John Smith +447000000000 \"Team Manager\"",
        )
        .await;
    assert!(reply.contains("first admin"), "{reply}");

    let members = h.storage.members(common::TEAM_ID).await.expect("members");
    assert_eq!(members.len(), 1);
    assert!(members[0].is_admin);
    assert_eq!(members[0].telegram_id, Some(77));
    assert_eq!(members[0].name, "John Smith");
    assert_eq!(members[0].role, "Team Manager");
}

#[tokio::test]
async fn help_works_normally_after_bootstrap() {
    let llm = FakeLlm::scripted(vec![
        crate::common::tool_response("get_available_commands", serde_json::json!({})),
        crate::common::text_response("Here are your commands: /help /addplayer"),
    ]);
    let h = harness(Arc::new(llm)).await;

    h.handle(
        77,
        ChatKind::Leadership,
        "/register John Smith +447000000000 \"Team Manager\"",
    )
    .await;

    let reply = h.handle(77, ChatKind::Leadership, "/help").await;
    assert!(reply.contains("commands"), "{reply}");
    assert!(!reply.contains("first admin"), "{reply}");
}

#[tokio::test]
async fn malformed_register_shows_usage() {
    let h = harness(Arc::new(FakeLlm::text("unused"))).await;

    let reply = h
        .handle(77, ChatKind::Leadership, "/register John Smith")
        .await;
    assert!(reply.contains("Usage: /register"), "{reply}");
    assert_eq!(
        h.storage
            .member_count(common::TEAM_ID)
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
async fn non_register_messages_keep_prompting_until_bootstrap() {
    let h = harness(Arc::new(FakeLlm::text("unused"))).await;

    for text in ["hello", "/list", "/addplayer X +447111222333"] {
        let reply = h.handle(77, ChatKind::Leadership, text).await;
        assert!(reply.contains("/register"), "for {text}: {reply}");
    }
    assert_eq!(
        h.storage
            .member_count(common::TEAM_ID)
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
async fn second_register_after_bootstrap_is_guided_away() {
    let h = harness(Arc::new(FakeLlm::text("unused"))).await;
    h.seed_admin().await;

    let reply = h
        .handle(88, ChatKind::Leadership, "/register Jane Kay +447000000009 Coach")
        .await;
    // The chat already has an admin: the sender is unregistered, so they get
    // the leadership guidance rather than a second bootstrap.
    assert!(reply.contains("admin"), "{reply}");
    assert_eq!(
        h.storage
            .member_count(common::TEAM_ID)
            .await
            .expect("count"),
        1
    );
}
