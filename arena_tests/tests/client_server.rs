//! Socket-level tests: a real client session against the mock room.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use arena_client::{
    input::{InputCell, InputState},
    world::LocalPlayerState,
    LocalIntent, LocalPlayerAdapter, Session,
};
use arena_shared::{
    codec::Command,
    config::ClientConfig,
    ids::{BulletId, PlayerId},
    math::Vec2,
    state::SessionState,
};
use arena_tests::{count, init_tracing, MockRoom, RoomConn};
use serde_json::json;

const WAIT: Duration = Duration::from_secs(2);

fn config(room: &MockRoom) -> ClientConfig {
    ClientConfig {
        server_url: room.url(),
        player_id: PlayerId(1),
        token: "room-token".to_string(),
        command_interval_ms: 20,
        heartbeat_interval_ms: 100,
        ..Default::default()
    }
}

async fn connect(
    adapter: Arc<dyn LocalPlayerAdapter>,
) -> anyhow::Result<(Session, RoomConn)> {
    let room = MockRoom::bind().await?;
    let cfg = config(&room);
    let (conn, session) = tokio::join!(room.accept(), Session::connect(&cfg, adapter));
    Ok((session?, conn?))
}

/// Counts how often the command ticker polls for intent.
#[derive(Default)]
struct PollCounter {
    polls: AtomicUsize,
}

impl PollCounter {
    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl LocalPlayerAdapter for PollCounter {
    fn intent(&self) -> LocalIntent {
        self.polls.fetch_add(1, Ordering::SeqCst);
        LocalIntent::default()
    }

    fn apply_correction(&self, _state: LocalPlayerState) {}
}

/// Polls `cond` until it holds or `WAIT` passes.
async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn token_frame_comes_first() -> anyhow::Result<()> {
    init_tracing();
    let (_session, mut conn) = connect(Arc::new(InputCell::new())).await?;

    let first = conn.recv_command(WAIT).await?;
    assert_eq!(
        first,
        Some(Command::Token {
            id: PlayerId(1),
            token: "room-token".to_string(),
        })
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ticks_send_direction_and_heartbeats() -> anyhow::Result<()> {
    init_tracing();
    let input = Arc::new(InputCell::new());
    let (_session, mut conn) = connect(input.clone()).await?;
    conn.recv_command(WAIT).await?;

    // Idle: aim broadcast every tick, heartbeats regardless of match state.
    let idle = conn.collect_for(Duration::from_millis(450)).await?;
    assert!(count(&idle, |c| matches!(c, Command::Direct { .. })) >= 5);
    assert!(count(&idle, |c| matches!(c, Command::Heart)) >= 2);
    assert_eq!(count(&idle, |c| matches!(c, Command::Move { .. })), 0);
    assert_eq!(count(&idle, |c| matches!(c, Command::Shot { .. })), 0);

    input.set(InputState {
        right: 1.0,
        aim_y: -1.0,
        fire: true,
        ..Default::default()
    });
    let busy = conn.collect_for(Duration::from_millis(300)).await?;
    assert!(busy.contains(&Command::Move { angle: 90 }));
    assert!(busy.contains(&Command::Shot { angle: 180 }));
    assert!(busy.contains(&Command::Direct { angle: 180 }));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn snapshots_drive_the_world() -> anyhow::Result<()> {
    init_tracing();
    let input = Arc::new(InputCell::new());
    let (session, mut conn) = connect(input.clone()).await?;
    assert_eq!(session.state(), SessionState::Match);

    conn.send_snapshot(
        &json!({
            "users": [
                {"Id": 1, "X": 10, "Y": 20, "Hp": 100},
                {"Id": 2, "X": 5, "Y": 5, "Hp": 80, "Ag": 90}
            ],
            "bullets": [{"Id": 7, "Pos": {"X": 1, "Y": 1}}],
            "time": 120
        })
        .to_string(),
    )
    .await?;

    assert!(eventually(|| session.is_started()).await);
    assert_eq!(session.local_player().position, Vec2::new(10.0, 20.0));
    assert_eq!(session.local_player().hp, 100);
    assert_eq!(session.left_time_seconds(), Some(120));

    let view = session.world().view();
    assert_eq!(view.enemies.len(), 1);
    assert_eq!(view.enemies[0].id, PlayerId(2));
    assert_eq!(view.enemies[0].target, Vec2::new(5.0, 5.0));
    assert_eq!(view.enemies[0].hp, 80);
    assert_eq!(view.enemies[0].facing, 90.0);
    assert_eq!(view.bullets[0].id, BulletId(7));

    assert!(eventually(|| input.correction().is_some()).await);
    assert_eq!(input.left_time(), Some(120));

    // Delta follow-up: enemy moves, bullet removed explicitly.
    conn.send_snapshot(
        &json!({
            "Move": [{"Id": 2, "X": 15, "Y": 5}],
            "Bullets": {"ReMove": [7]}
        })
        .to_string(),
    )
    .await?;
    let world = session.world();
    assert!(eventually(|| world.view().bullets.is_empty()).await);

    let before = world.view().enemies[0].display;
    world.step(session.interp_blend());
    let after = world.view().enemies[0].display;
    assert!(after.x > before.x && after.x < 15.0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_snapshot_is_survivable() -> anyhow::Result<()> {
    init_tracing();
    let (session, mut conn) = connect(Arc::new(InputCell::new())).await?;

    conn.send_raw(b"\0\0\0\0{\"users\": [".to_vec()).await?;
    conn.send_raw(vec![1, 2]).await?;
    conn.send_snapshot(r#"{"users":[{"Id":1,"X":0,"Y":0,"Hp":50}]}"#)
        .await?;

    assert!(eventually(|| session.is_started()).await);
    assert!(!session.is_closed());
    assert_eq!(session.local_player().hp, 50);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn text_messages_read_like_binary() -> anyhow::Result<()> {
    init_tracing();
    let (session, mut conn) = connect(Arc::new(InputCell::new())).await?;

    conn.send_text(r#"0000{"users":[{"Id":1,"X":4,"Y":2,"Hp":70}],"time":30}"#)
        .await?;

    assert!(eventually(|| session.is_started()).await);
    assert_eq!(session.local_player().position, Vec2::new(4.0, 2.0));
    assert_eq!(session.local_player().hp, 70);
    assert_eq!(session.left_time_seconds(), Some(30));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn death_is_latched_for_the_renderer() -> anyhow::Result<()> {
    init_tracing();
    let input = Arc::new(InputCell::new());
    let (session, mut conn) = connect(input.clone()).await?;

    conn.send_snapshot(r#"{"users":[{"Id":1,"X":0,"Y":0,"Hp":100}]}"#).await?;
    conn.send_snapshot(r#"{"Move":[{"Id":1,"X":0,"Y":0,"Hp":0}]}"#).await?;

    assert!(eventually(|| session.local_player().hp == 0).await);
    assert!(eventually(|| input.take_died()).await);
    assert!(!input.take_died());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn end_of_match_is_terminal() -> anyhow::Result<()> {
    init_tracing();
    let (session, mut conn) = connect(Arc::new(InputCell::new())).await?;

    conn.send_snapshot(r#"{"users":[{"Id":1,"X":0,"Y":0}]}"#).await?;
    conn.send_snapshot(r#"{"end":true}"#).await?;
    conn.send_snapshot(r#"{"users":[{"Id":1,"X":3,"Y":3}]}"#).await?;

    assert!(eventually(|| session.local_player().position == Vec2::new(3.0, 3.0)).await);
    assert!(session.is_ended());
    assert!(!session.is_started());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn relife_reaches_the_server() -> anyhow::Result<()> {
    init_tracing();
    let (session, mut conn) = connect(Arc::new(InputCell::new())).await?;

    session.send_relife();
    let cmds = conn.collect_for(Duration::from_millis(200)).await?;
    assert_eq!(count(&cmds, |c| matches!(c, Command::Relife)), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_close_ends_the_session() -> anyhow::Result<()> {
    init_tracing();
    let (session, mut conn) = connect(Arc::new(InputCell::new())).await?;
    conn.recv_command(WAIT).await?;

    conn.close().await?;
    tokio::time::timeout(WAIT, session.wait_closed()).await?;
    assert!(session.is_closed());

    // Sends on a dead session are silently dropped.
    session.send_relife();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_close_stops_ticking() -> anyhow::Result<()> {
    init_tracing();
    let counter = Arc::new(PollCounter::default());
    let (session, mut conn) = connect(counter.clone()).await?;

    assert!(eventually(|| counter.polls() >= 3).await);

    session.close();
    session.close();
    tokio::time::timeout(WAIT, session.wait_closed()).await?;
    assert!(conn.wait_for_close(WAIT).await);

    // Ten command periods with no polls means the ticker is gone.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let stopped_at = counter.polls();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(counter.polls(), stopped_at);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_the_session_sends_close() -> anyhow::Result<()> {
    init_tracing();
    let (session, mut conn) = connect(Arc::new(InputCell::new())).await?;
    conn.recv_command(WAIT).await?;

    drop(session);
    assert!(conn.wait_for_close(WAIT).await);
    Ok(())
}
