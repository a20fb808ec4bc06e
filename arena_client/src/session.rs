//! Client session.
//!
//! A session owns one WebSocket to the room server and four tasks:
//! - writer: drains the outbound queue into the socket
//! - reader: decodes snapshots and hands them to the reconciler
//! - command ticker: move / shot / direct from the local player's intent
//! - heartbeat ticker: keep-alive, independent of match state
//!
//! All writes to the shared world go through its lock from the reader task;
//! the renderer reads and interpolates through [`SharedWorld`] on its own
//! tick. Closing (either side) flips one shutdown flag: tickers are aborted,
//! further sends become no-ops, and [`Session::wait_closed`] resolves. There
//! is no reconnect; build a new session instead.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::Context;
use arena_shared::{
    codec,
    config::ClientConfig,
    ids::PlayerId,
    math::wire_angle,
    snapshot::Snapshot,
    state::SessionState,
};
use bytes::Bytes;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::{
    adapter::LocalPlayerAdapter,
    reconcile::reconcile,
    world::{LocalPlayerState, SharedWorld},
};

/// Best-effort outbound queue. Sends after close are dropped silently.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<Bytes>,
    closed: watch::Receiver<bool>,
}

impl Outbound {
    pub fn send(&self, frame: Bytes) {
        if *self.closed.borrow() || self.tx.send(frame).is_err() {
            trace!("Dropping frame on closed socket");
        }
    }
}

/// Shutdown flag plus the ticker tasks it has to stop.
#[derive(Debug)]
struct Lifecycle {
    shutdown: watch::Sender<bool>,
    tickers: Mutex<Vec<JoinHandle<()>>>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            shutdown: watch::channel(false).0,
            tickers: Mutex::new(Vec::new()),
        }
    }

    /// Idempotent. Returns `true` for the call that actually closed.
    fn close(&self) -> bool {
        let was_closed = self.shutdown.send_replace(true);
        let mut tickers = self.tickers.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in tickers.drain(..) {
            handle.abort();
        }
        !was_closed
    }

    fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// A live connection to a room.
pub struct Session {
    player_id: PlayerId,
    world: SharedWorld,
    outbound: Outbound,
    lifecycle: Arc<Lifecycle>,
    reader: JoinHandle<()>,
    interp_blend: f32,
}

impl Session {
    /// Dials the room server and starts the session.
    pub async fn connect(
        cfg: &ClientConfig,
        adapter: Arc<dyn LocalPlayerAdapter>,
    ) -> anyhow::Result<Self> {
        info!(url = %cfg.server_url, player_id = %cfg.player_id, "Connecting to room");
        let (ws, _response) = tokio_tungstenite::connect_async(cfg.server_url.as_str())
            .await
            .with_context(|| format!("websocket connect {}", cfg.server_url))?;
        Ok(Self::from_stream(ws, cfg, adapter))
    }

    /// Starts a session over an established WebSocket. Sends the token
    /// frame, then starts both tickers.
    pub fn from_stream<S>(
        ws: WebSocketStream<S>,
        cfg: &ClientConfig,
        adapter: Arc<dyn LocalPlayerAdapter>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let world = SharedWorld::new(cfg.player_id);
        let lifecycle = Arc::new(Lifecycle::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let outbound = Outbound {
            tx,
            closed: lifecycle.shutdown.subscribe(),
        };

        // Queued before any ticker exists, so it is always the first frame.
        outbound.send(codec::encode_token(cfg.player_id, &cfg.token));

        let (sink, stream) = ws.split();
        // The writer is detached: it exits on its own after sending the
        // close frame, even when the session is dropped without `close()`.
        tokio::spawn(write_loop(sink, rx, lifecycle.clone()));
        let reader = tokio::spawn(read_loop(
            stream,
            world.clone(),
            adapter.clone(),
            lifecycle.clone(),
        ));

        let command = {
            let outbound = outbound.clone();
            let adapter = adapter.clone();
            spawn_ticker(
                Duration::from_millis(cfg.command_interval_ms.max(1)),
                lifecycle.shutdown.subscribe(),
                move || command_tick(adapter.as_ref(), &outbound),
            )
        };
        let heartbeat = {
            let outbound = outbound.clone();
            spawn_ticker(
                Duration::from_millis(cfg.heartbeat_interval_ms.max(1)),
                lifecycle.shutdown.subscribe(),
                move || outbound.send(codec::encode_heart()),
            )
        };
        lifecycle
            .tickers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([command, heartbeat]);

        info!(player_id = %cfg.player_id, "Session started");

        Self {
            player_id: cfg.player_id,
            world,
            outbound,
            lifecycle,
            reader,
            interp_blend: cfg.interp_blend,
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Handle for the renderer: read, draw, and step interpolation.
    pub fn world(&self) -> SharedWorld {
        self.world.clone()
    }

    pub fn interp_blend(&self) -> f32 {
        self.interp_blend
    }

    pub fn state(&self) -> SessionState {
        self.world.state()
    }

    pub fn is_started(&self) -> bool {
        self.state() == SessionState::Start
    }

    pub fn is_ended(&self) -> bool {
        self.state() == SessionState::End
    }

    /// Server countdown, `None` until the server has sent one.
    pub fn left_time_seconds(&self) -> Option<u32> {
        self.world.left_time()
    }

    pub fn local_player(&self) -> LocalPlayerState {
        self.world.local_player()
    }

    /// Asks the server to respawn us.
    pub fn send_relife(&self) {
        self.outbound.send(codec::encode_relife());
    }

    /// Closes the socket and stops both tickers. Idempotent.
    pub fn close(&self) {
        if self.lifecycle.close() {
            info!(player_id = %self.player_id, "Session closed by client");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// Resolves once the session is closed, by either side.
    pub async fn wait_closed(&self) {
        let mut rx = self.lifecycle.shutdown.subscribe();
        // An error means the sender is gone, which also means closed.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// Dropping closes the session like [`Session::close`]; the writer still
/// sends the close frame.
impl Drop for Session {
    fn drop(&mut self) {
        self.lifecycle.close();
        self.reader.abort();
    }
}

/// One command tick: move and shot only when intended, direction always.
pub fn command_tick(adapter: &dyn LocalPlayerAdapter, outbound: &Outbound) {
    let intent = adapter.intent();
    let aim = wire_angle(intent.aim_angle);
    if intent.moving {
        outbound.send(codec::encode_move(wire_angle(intent.movement_angle)));
    }
    if intent.fire {
        outbound.send(codec::encode_shot(aim));
    }
    outbound.send(codec::encode_direct(aim));
}

/// Decodes one inbound frame and applies it. A bad frame is logged and
/// dropped; it never ends the session.
pub fn dispatch_frame(frame: &[u8], world: &SharedWorld, adapter: &dyn LocalPlayerAdapter) {
    let snapshot = match Snapshot::parse(frame) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, len = frame.len(), "Dropping malformed snapshot");
            return;
        }
    };

    let report = {
        let mut w = world.write();
        reconcile(&mut w, &snapshot)
    };
    trace!(?report, "Snapshot applied");

    // Adapter calls happen outside the lock; the renderer may read the
    // world from inside them.
    if let Some(local) = report.local {
        adapter.apply_correction(local);
    }
    if let Some(secs) = report.left_time {
        adapter.time_left_changed(secs);
    }
    for state in report.transitions {
        info!(?state, "Match state changed");
        adapter.state_changed(state);
    }
    if report.died {
        info!("Local player died");
        adapter.died();
    }
}

fn spawn_ticker(
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut on_tick: impl FnMut() + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => on_tick(),
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

async fn write_loop<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    lifecycle: Arc<Lifecycle>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut shutdown = lifecycle.shutdown.subscribe();
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = sink.send(Message::binary(frame)).await {
                    warn!(error = %e, "Websocket write failed");
                    break;
                }
            }
            _ = shutdown.changed() => {}
        }
    }

    if let Err(e) = sink.close().await {
        debug!(error = %e, "Websocket close handshake failed");
    }
    if lifecycle.close() {
        info!("Session closed by writer");
    }
}

async fn read_loop<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    world: SharedWorld,
    adapter: Arc<dyn LocalPlayerAdapter>,
    lifecycle: Arc<Lifecycle>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut shutdown = lifecycle.shutdown.subscribe();
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(msg @ (Message::Binary(_) | Message::Text(_)))) => {
                    let data = msg.into_data();
                    dispatch_frame(&data, &world, adapter.as_ref());
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Server sent close");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Websocket read failed");
                    break;
                }
                None => break,
            },
            _ = shutdown.changed() => {}
        }
    }

    if lifecycle.close() {
        info!("Session closed by server");
    }
}
