//! SQLite backend behavior: schema, constraints, and the transactional
//! invite redemption.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use kickai::domain::{
    ChatKind, Invite, Match, Member, Player, Position, SubjectKind, SubjectStatus, Team,
};
use kickai::storage::sqlite::SqliteStorage;
use kickai::storage::{
    CommandAuditEntry, CommandAuditRepository, InviteRepository, MatchRepository,
    MemberRepository, PlayerRepository, StorageError, TeamRepository,
};

async fn open_store() -> (TempDir, SqliteStorage) {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteStorage::open(&dir.path().join("kickai.db"))
        .await
        .expect("open sqlite");
    (dir, store)
}

fn team() -> Team {
    Team {
        team_id: "KAI".to_owned(),
        name: "Kick AI FC".to_owned(),
        main_chat_id: "-100111".to_owned(),
        leadership_chat_id: "-100222".to_owned(),
        disabled: false,
        created_at: Utc::now(),
    }
}

fn player(id: &str, phone: &str) -> Player {
    Player {
        player_id: id.to_owned(),
        team_id: "KAI".to_owned(),
        telegram_id: None,
        name: format!("Player {id}"),
        phone: phone.to_owned(),
        email: None,
        emergency_contact: None,
        position: Position::Midfielder,
        status: SubjectStatus::Pending,
        created_at: Utc::now(),
    }
}

fn invite_for(player_id: &str) -> Invite {
    Invite {
        invite_id: Uuid::new_v4(),
        team_id: "KAI".to_owned(),
        chat_kind: ChatKind::Main,
        subject_kind: SubjectKind::Player,
        subject_id: player_id.to_owned(),
        issued_by: "M01JK".to_owned(),
        issued_at: Utc::now(),
        expires_at: Utc::now() + Duration::hours(72),
        used_at: None,
    }
}

#[tokio::test]
async fn team_round_trip_and_upsert() {
    let (_dir, store) = open_store().await;
    let mut t = team();
    store.upsert_team(&t).await.expect("insert");

    t.name = "Renamed FC".to_owned();
    store.upsert_team(&t).await.expect("update");

    let loaded = store.team("KAI").await.expect("query").expect("exists");
    assert_eq!(loaded.name, "Renamed FC");
    assert_eq!(loaded.main_chat_id, "-100111");
    assert_eq!(store.teams().await.expect("list").len(), 1);
}

#[tokio::test]
async fn player_round_trip_preserves_fields() {
    let (_dir, store) = open_store().await;
    let mut p = player("01AA", "+447111222333");
    p.email = Some("p@example.com".to_owned());
    p.position = Position::Goalkeeper;
    store.insert_player(&p).await.expect("insert");

    let loaded = store
        .player("KAI", "01AA")
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(loaded.email.as_deref(), Some("p@example.com"));
    assert_eq!(loaded.position, Position::Goalkeeper);
    assert_eq!(loaded.status, SubjectStatus::Pending);
}

#[tokio::test]
async fn duplicate_phone_is_conflict() {
    let (_dir, store) = open_store().await;
    store
        .insert_player(&player("01AA", "+447111222333"))
        .await
        .expect("first");
    let err = store
        .insert_player(&player("02BB", "+447111222333"))
        .await
        .expect_err("duplicate phone");
    assert!(matches!(err, StorageError::Conflict(_)), "{err}");
}

#[tokio::test]
async fn player_with_invite_is_atomic() {
    let (_dir, store) = open_store().await;
    let p = player("01AA", "+447111222333");
    let inv = invite_for("01AA");
    store
        .insert_player_with_invite(&p, &inv)
        .await
        .expect("provision");

    // A second provisioning with the same phone fails and leaves no orphan
    // invite behind.
    let p2 = player("02BB", "+447111222333");
    let inv2 = invite_for("02BB");
    store
        .insert_player_with_invite(&p2, &inv2)
        .await
        .expect_err("conflict");
    assert!(store
        .invite(inv2.invite_id)
        .await
        .expect("query")
        .is_none());
    assert!(store.invite(inv.invite_id).await.expect("query").is_some());
}

#[tokio::test]
async fn redeem_invite_single_winner_under_concurrency() {
    let (_dir, store) = open_store().await;
    let store = Arc::new(store);
    store
        .insert_player(&player("01AA", "+447111222333"))
        .await
        .expect("player");
    let inv = invite_for("01AA");
    store.insert_invite(&inv).await.expect("invite");

    let s1 = Arc::clone(&store);
    let s2 = Arc::clone(&store);
    let id = inv.invite_id;
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { s1.redeem_invite(id, 555, Utc::now()).await }),
        tokio::spawn(async move { s2.redeem_invite(id, 666, Utc::now()).await }),
    );
    let outcomes = [r1.expect("join"), r2.expect("join")];

    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "{outcomes:?}");
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(StorageError::Conflict(_))))
        .count();
    assert_eq!(conflicts, 1, "{outcomes:?}");

    // used_at transitioned exactly once; the subject is bound to the winner.
    let loaded = store
        .invite(inv.invite_id)
        .await
        .expect("query")
        .expect("exists");
    assert!(loaded.used_at.is_some());
    let activated = store
        .player("KAI", "01AA")
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(activated.status, SubjectStatus::Active);
    assert!(matches!(activated.telegram_id, Some(555 | 666)));
}

#[tokio::test]
async fn register_first_admin_is_transactional() {
    let (_dir, store) = open_store().await;
    let admin = Member {
        member_id: "M01AA".to_owned(),
        team_id: "KAI".to_owned(),
        telegram_id: Some(1),
        name: "First".to_owned(),
        phone: "+447000000001".to_owned(),
        role: "Team Manager".to_owned(),
        is_admin: true,
        status: SubjectStatus::Active,
        created_at: Utc::now(),
    };
    store.register_first_admin(&admin).await.expect("first");

    let mut second = admin.clone();
    second.member_id = "M02BB".to_owned();
    second.telegram_id = Some(2);
    second.phone = "+447000000002".to_owned();
    let err = store
        .register_first_admin(&second)
        .await
        .expect_err("second");
    assert!(matches!(err, StorageError::Conflict(_)));
    assert_eq!(store.member_count("KAI").await.expect("count"), 1);
}

#[tokio::test]
async fn match_round_trip_with_squad() {
    let (_dir, store) = open_store().await;
    let mut fixture = Match {
        match_id: "MAT001".to_owned(),
        team_id: "KAI".to_owned(),
        opponent: "Rovers".to_owned(),
        kickoff: Utc::now() + Duration::days(7),
        location: "Home".to_owned(),
        squad: vec![],
        created_by: "M01JK".to_owned(),
    };
    store.insert_match(&fixture).await.expect("insert");

    fixture.squad = vec!["01AA".to_owned(), "02BB".to_owned()];
    store.update_match(&fixture).await.expect("update");

    let loaded = store
        .match_by_id("KAI", "MAT001")
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(loaded.squad, vec!["01AA".to_owned(), "02BB".to_owned()]);
    assert_eq!(store.matches("KAI").await.expect("list").len(), 1);
}

#[tokio::test]
async fn audit_log_appends_in_order() {
    let (_dir, store) = open_store().await;
    for (i, outcome) in ["completed", "denied"].iter().enumerate() {
        store
            .append_audit(&CommandAuditEntry {
                team_id: "KAI".to_owned(),
                telegram_id: 42,
                command: format!("/cmd{i}"),
                outcome: (*outcome).to_owned(),
                at: Utc::now(),
            })
            .await
            .expect("append");
    }

    let audits = store.audits("KAI").await.expect("list");
    assert_eq!(audits.len(), 2);
    assert_eq!(audits[0].command, "/cmd0");
    assert_eq!(audits[1].outcome, "denied");
}

#[tokio::test]
async fn pending_invites_excludes_used_and_expired() {
    let (_dir, store) = open_store().await;
    store
        .insert_player(&player("01AA", "+447111222333"))
        .await
        .expect("player");

    let fresh = invite_for("01AA");
    store.insert_invite(&fresh).await.expect("fresh");

    let mut expired = invite_for("01AA");
    expired.expires_at = Utc::now() - Duration::hours(1);
    store.insert_invite(&expired).await.expect("expired");

    let mut used = invite_for("01AA");
    used.used_at = Some(Utc::now());
    store.insert_invite(&used).await.expect("used");

    let pending = store.pending_invites("KAI", Utc::now()).await.expect("list");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].invite_id, fresh.invite_id);
}
