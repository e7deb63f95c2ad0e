//! Client implementation.
//!
//! The client maintains:
//! - A reliable control stream (handshake + create/remove/login)
//! - An unreliable datagram socket (moves in, position broadcasts out)
//! - Reader tasks that only enqueue into the [`SyncClient`] inbox
//! - A writer task that drains the outbound queue under a send deadline

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use sync_shared::{
    config::SyncConfig,
    event::RenderEvent,
    net::{ClientId, ReliableConn, ReliableWriter, SyncMsg, UnreliableConn, PROTOCOL_VERSION},
};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    input::InputState,
    outbound::{run_writer, Outbound},
    sync::{SyncClient, SyncClientBuilder, TickSummary},
};

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Handshake done, waiting for the server to bind us to an entity.
    Connected,
    /// Bound to a local entity; input drives it.
    Playing,
    /// Connection closed by either side.
    Disconnected,
}

/// High-level game client.
pub struct GameClient {
    pub client_id: ClientId,
    pub state: ClientState,
    core: SyncClient,
    reliable: ReliableWriter,
    last_tick: Instant,
    tasks: Vec<JoinHandle<()>>,
}

impl GameClient {
    /// Connects to a server and performs handshake.
    pub async fn connect(cfg: &SyncConfig) -> anyhow::Result<Self> {
        let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;

        info!(server = %server_addr, "Connecting to server");

        // Bind UDP first so we can tell the server where to send moves.
        let bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let udp = Arc::new(UnreliableConn::connect(bind, server_addr).await?);
        let client_udp_port = udp.local_addr().context("udp local_addr")?.port();

        let stream = TcpStream::connect(server_addr)
            .await
            .context("tcp connect")?;
        let mut reliable = ReliableConn::new(stream);

        reliable
            .send(&SyncMsg::Hello {
                protocol: PROTOCOL_VERSION,
                name: cfg.player_name.clone(),
            })
            .await?;
        reliable.send(&SyncMsg::UdpHello { client_udp_port }).await?;

        let welcome = reliable.recv().await?;
        let client_id = match welcome {
            SyncMsg::Welcome { client_id } => client_id,
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };

        info!(client_id = ?client_id, "Connected to server");

        let (outbound, outbound_rx) = Outbound::channel();
        let core = SyncClientBuilder::new(cfg.clone())
            .local_id(client_id)
            .outbound(outbound)
            .build()?;

        let (reader, writer) = reliable.into_split();
        let tasks = vec![
            tokio::spawn(read_reliable(reader, core.inbox())),
            tokio::spawn(read_unreliable(udp.clone(), core.inbox())),
            tokio::spawn({
                let timeout = cfg.send_timeout();
                async move { run_writer(udp.as_ref(), outbound_rx, timeout).await }
            }),
        ];

        Ok(Self {
            client_id,
            state: ClientState::Connected,
            core,
            reliable: writer,
            last_tick: Instant::now(),
            tasks,
        })
    }

    pub fn core(&self) -> &SyncClient {
        &self.core
    }

    /// Runs one frame with wall-clock `dt` since the previous call.
    pub fn tick(&mut self, input: InputState) -> TickSummary {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.tick_at(dt, input, now)
    }

    /// Runs one frame with an explicit step and clock reading.
    pub fn tick_at(&mut self, dt: f32, input: InputState, now: Instant) -> TickSummary {
        let summary = self.core.tick(dt, input, now);
        if self.core.disconnect_reason().is_some() {
            self.state = ClientState::Disconnected;
        } else if self.state == ClientState::Connected && self.core.local_entity().is_some() {
            info!(entity = ?self.core.local_entity(), "Local entity bound");
            self.state = ClientState::Playing;
        }
        summary
    }

    /// Tells the server we are leaving.
    pub async fn disconnect(&mut self, reason: &str) -> anyhow::Result<()> {
        self.state = ClientState::Disconnected;
        self.reliable
            .send(&SyncMsg::Disconnect {
                reason: reason.to_string(),
            })
            .await
    }

    /// Executes a console command.
    pub async fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(cmd) = tokens.first() else {
            return Ok(Vec::new());
        };

        match *cmd {
            "status" => {
                let registry = self.core.handler().registry();
                let mut out = vec![
                    format!("State: {:?}", self.state),
                    format!("Client ID: {:?}", self.client_id),
                    format!("Local entity: {:?}", self.core.local_entity()),
                    format!("Entities: {}", registry.len()),
                ];
                let mut entities: Vec<_> = registry.iter().collect();
                entities.sort_by_key(|e| e.id());
                for e in entities {
                    let p = e.position();
                    out.push(format!(
                        "  {}: ({:.2}, {:.2}) facing={:?} moving={}",
                        e.id(),
                        p.x,
                        p.y,
                        e.facing(),
                        e.is_moving()
                    ));
                }
                Ok(out)
            }
            "disconnect" => {
                self.disconnect("client disconnect").await?;
                Ok(vec!["Disconnected".to_string()])
            }
            other => Ok(vec![format!("Unknown command: {other}")]),
        }
    }

    /// Spawn/dispose notifications for the renderer.
    pub fn drain_render_events(&mut self) -> Vec<RenderEvent> {
        self.core.handler_mut().registry_mut().drain_render_events()
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn read_reliable(
    mut reader: sync_shared::net::ReliableReader,
    inbox: mpsc::UnboundedSender<SyncMsg>,
) {
    loop {
        match reader.recv().await {
            Ok(msg) => {
                if inbox.send(msg).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Reliable connection closed");
                let _ = inbox.send(SyncMsg::Disconnect {
                    reason: e.to_string(),
                });
                break;
            }
        }
    }
}

async fn read_unreliable(udp: Arc<UnreliableConn>, inbox: mpsc::UnboundedSender<SyncMsg>) {
    loop {
        match udp.recv().await {
            Ok(msg) => {
                if inbox.send(msg).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "Dropping unreadable datagram");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}
