//! Deadline behavior: the per-update budget cancels slow LLM calls.

use std::sync::Arc;
use std::time::Duration;

use kickai::domain::ChatKind;
use kickai::orchestrator::TIMED_OUT_REPLY;
use kickai::storage::PlayerRepository;

use crate::common::{self, harness_with, FakeLlm, PLAYER_TG};

#[tokio::test(start_paused = true)]
async fn slow_llm_yields_canonical_timeout_reply() {
    // The LLM sleeps well past the 5 s deadline.
    let llm = Arc::new(FakeLlm::text("too late").with_delay(Duration::from_secs(60)));
    let h = harness_with(llm.clone(), Duration::from_secs(5)).await;
    h.seed_player().await;

    let reply = h.handle(PLAYER_TG, ChatKind::Main, "/list").await;

    assert_eq!(reply, TIMED_OUT_REPLY);
    assert_eq!(llm.call_count(), 1, "the call was started, then cancelled");
}

#[tokio::test(start_paused = true)]
async fn timeout_leaves_no_partial_writes() {
    let llm = Arc::new(FakeLlm::text("too late").with_delay(Duration::from_secs(60)));
    let h = harness_with(llm, Duration::from_secs(5)).await;
    h.seed_admin().await;

    let reply = h
        .handle(
            crate::common::ADMIN_TG,
            ChatKind::Leadership,
            "/addplayer Mohamed Salah +447111222333",
        )
        .await;

    assert_eq!(reply, TIMED_OUT_REPLY);
    // The agent never got to call create_player.
    let players = h.storage.players(common::TEAM_ID).await.expect("players");
    assert!(players.is_empty());
}

#[tokio::test(start_paused = true)]
async fn fast_replies_are_unaffected_by_the_deadline() {
    let llm = Arc::new(FakeLlm::text("hello"));
    let h = harness_with(llm, Duration::from_secs(5)).await;
    h.seed_player().await;

    let reply = h.handle(PLAYER_TG, ChatKind::Main, "/ping").await;
    assert_ne!(reply, TIMED_OUT_REPLY);
}
