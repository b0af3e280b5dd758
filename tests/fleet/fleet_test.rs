//! Fleet lifecycle: startup guards, per-chat FIFO, filtering, shutdown.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use kickai::domain::Team;
use kickai::fleet::{FleetManager, RoutingTable, TeamBots, TransportUpdate};
use kickai::registry::{CommandRegistry, ToolRegistry};
use tokio::sync::watch;

use crate::common::{
    self, harness, text_response, tool_response, update, FakeLlm, FakeTransport, PLAYER_TG,
};

fn routing() -> Arc<RoutingTable> {
    let table = Arc::new(RoutingTable::new());
    table.insert_team(&Team {
        team_id: common::TEAM_ID.to_owned(),
        name: "Kick AI FC".to_owned(),
        main_chat_id: common::MAIN_CHAT.to_owned(),
        leadership_chat_id: common::LEAD_CHAT.to_owned(),
        disabled: false,
        created_at: chrono::Utc::now(),
    });
    table
}

/// Wait until the transport has sent `count` replies (bounded).
async fn wait_for_sends(transport: &FakeTransport, count: usize) {
    for _ in 0..200 {
        if transport.sent().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} sends, got {:?}", transport.sent());
}

#[tokio::test]
async fn fleet_refuses_to_start_with_unpopulated_registries() {
    let h = harness(Arc::new(FakeLlm::text("unused"))).await;

    let fleet = FleetManager::new(
        Arc::clone(&h.orchestrator),
        routing(),
        Arc::new(CommandRegistry::new()),
        Arc::new(ToolRegistry::new()),
        vec![TeamBots {
            team_id: common::TEAM_ID.to_owned(),
            main: Arc::new(FakeTransport::empty()),
            leadership: Arc::new(FakeTransport::empty()),
        }],
        1,
    );

    let (_tx, rx) = watch::channel(false);
    let err = fleet.run(rx).await.expect_err("must refuse");
    assert!(matches!(
        err,
        kickai::fleet::FleetError::RegistriesUninitialized
    ));
}

#[tokio::test]
async fn replies_preserve_per_chat_fifo_order() {
    let llm = FakeLlm::scripted(vec![
        tool_response("ping", json!({})),
        text_response("reply one"),
        tool_response("version", json!({})),
        text_response("reply two"),
    ]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let main = Arc::new(FakeTransport::new(vec![vec![
        update(1, common::MAIN_CHAT, PLAYER_TG, "/ping"),
        update(2, common::MAIN_CHAT, PLAYER_TG, "/version"),
    ]]));
    let leadership = Arc::new(FakeTransport::empty());

    let fleet = FleetManager::new(
        Arc::clone(&h.orchestrator),
        routing(),
        Arc::clone(&h.commands),
        Arc::clone(&h.tools),
        vec![TeamBots {
            team_id: common::TEAM_ID.to_owned(),
            main: main.clone(),
            leadership,
        }],
        1,
    );

    let (tx, rx) = watch::channel(false);
    let runner = tokio::spawn(fleet.run(rx));

    wait_for_sends(&main, 2).await;
    let sent = main.sent();
    assert_eq!(sent[0].0, common::MAIN_CHAT);
    assert!(sent[0].1.contains("reply one"), "{sent:?}");
    assert!(sent[1].1.contains("reply two"), "{sent:?}");

    tx.send(true).expect("signal shutdown");
    runner
        .await
        .expect("join")
        .expect("fleet drains cleanly");
}

#[tokio::test]
async fn empty_unrouted_and_textless_updates_are_ignored() {
    let llm = FakeLlm::scripted(vec![
        tool_response("ping", json!({})),
        text_response("pong"),
    ]);
    let h = harness(Arc::new(llm)).await;
    h.seed_player().await;

    let main = Arc::new(FakeTransport::new(vec![vec![
        // Unknown chat: no routing entry.
        update(1, "-999999", PLAYER_TG, "/ping"),
        // Empty message.
        update(2, common::MAIN_CHAT, PLAYER_TG, "   "),
        // Media-only message.
        TransportUpdate {
            update_id: 3,
            chat_id: common::MAIN_CHAT.to_owned(),
            telegram_id: PLAYER_TG,
            username: None,
            text: None,
        },
        // The only update that should produce a reply.
        update(4, common::MAIN_CHAT, PLAYER_TG, "/ping"),
    ]]));

    let fleet = FleetManager::new(
        Arc::clone(&h.orchestrator),
        routing(),
        Arc::clone(&h.commands),
        Arc::clone(&h.tools),
        vec![TeamBots {
            team_id: common::TEAM_ID.to_owned(),
            main: main.clone(),
            leadership: Arc::new(FakeTransport::empty()),
        }],
        1,
    );

    let (tx, rx) = watch::channel(false);
    let runner = tokio::spawn(fleet.run(rx));

    wait_for_sends(&main, 1).await;
    // Give the worker a beat to (incorrectly) send more, then stop.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(main.sent().len(), 1, "{:?}", main.sent());

    tx.send(true).expect("signal shutdown");
    runner.await.expect("join").expect("clean stop");
}

#[tokio::test]
async fn shutdown_stops_both_workers() {
    let h = harness(Arc::new(FakeLlm::text("unused"))).await;

    let fleet = FleetManager::new(
        Arc::clone(&h.orchestrator),
        routing(),
        Arc::clone(&h.commands),
        Arc::clone(&h.tools),
        vec![TeamBots {
            team_id: common::TEAM_ID.to_owned(),
            main: Arc::new(FakeTransport::empty()),
            leadership: Arc::new(FakeTransport::empty()),
        }],
        1,
    );

    let (tx, rx) = watch::channel(false);
    let runner = tokio::spawn(fleet.run(rx));

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).expect("signal shutdown");

    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("fleet stops within the drain window")
        .expect("join")
        .expect("clean stop");
}
