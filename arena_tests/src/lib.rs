//! In-process room server for exercising the client over a real socket.
//!
//! `MockRoom` accepts WebSocket connections on an ephemeral localhost port.
//! Each accepted [`RoomConn`] decodes the client's command frames and can
//! push snapshots framed the way the real server frames them.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use arena_shared::{codec::Command, snapshot::encode_server_frame};
use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::{TcpListener, TcpStream},
    time::{self, Instant},
};
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::debug;

/// Installs a test-friendly subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Listening side of a fake room.
pub struct MockRoom {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockRoom {
    /// Binds to an ephemeral localhost port.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.context("tcp bind")?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accepts one client and completes the WebSocket handshake.
    pub async fn accept(&self) -> anyhow::Result<RoomConn> {
        let (stream, peer) = self.listener.accept().await.context("tcp accept")?;
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .context("websocket accept")?;
        debug!(%peer, "Mock room accepted client");
        Ok(RoomConn { ws })
    }
}

/// One client connection, seen from the server.
pub struct RoomConn {
    ws: WebSocketStream<TcpStream>,
}

impl RoomConn {
    /// Next command from the client, or `None` once it has gone away or
    /// `timeout` passes.
    pub async fn recv_command(&mut self, timeout: Duration) -> anyhow::Result<Option<Command>> {
        let deadline = Instant::now() + timeout;
        loop {
            let msg = match time::timeout_at(deadline, self.ws.next()).await {
                Err(_) => return Ok(None),
                Ok(None) => return Ok(None),
                Ok(Some(msg)) => msg.context("websocket read")?,
            };
            match msg {
                Message::Binary(frame) => return Ok(Some(Command::decode(&frame)?)),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
    }

    /// Every command received during `window`.
    pub async fn collect_for(&mut self, window: Duration) -> anyhow::Result<Vec<Command>> {
        let deadline = Instant::now() + window;
        let mut out = Vec::new();
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match self.recv_command(left).await? {
                Some(cmd) => out.push(cmd),
                None => break,
            }
        }
        Ok(out)
    }

    /// Sends a JSON snapshot with the server's length prefix.
    pub async fn send_snapshot(&mut self, json: &str) -> anyhow::Result<()> {
        self.send_raw(encode_server_frame(json).to_vec()).await
    }

    /// Sends arbitrary bytes as one binary message.
    pub async fn send_raw(&mut self, bytes: Vec<u8>) -> anyhow::Result<()> {
        self.ws
            .send(Message::binary(bytes))
            .await
            .context("websocket send")
    }

    /// Sends a text message. The client reads the same 4-byte prefix as
    /// for binary frames.
    pub async fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws
            .send(Message::text(text.to_string()))
            .await
            .context("websocket send")
    }

    /// Reads until the client's close frame. `false` if the socket instead
    /// went away without one, or nothing arrived within `timeout`.
    pub async fn wait_for_close(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match time::timeout_at(deadline, self.ws.next()).await {
                Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => {
                    debug!(error = %e, "Client socket failed before close");
                    return false;
                }
                Ok(None) | Err(_) => return false,
            }
        }
    }

    /// Starts the close handshake and drains until the client confirms.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await.context("websocket close")?;
        while let Ok(Some(Ok(_))) = time::timeout(Duration::from_secs(1), self.ws.next()).await {}
        Ok(())
    }
}

/// Counts commands of one kind.
pub fn count(cmds: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
    cmds.iter().filter(|c| pred(c)).count()
}
