//! Server implementation.
//!
//! A relay for the position sync protocol. It supports:
//! - Handshake and entity assignment per connection
//! - Create/Login fan-out on join, Remove fan-out on leave (TCP)
//! - Move relay with per-source timestamps (UDP)
//! - Console commands (status, quit)
//!
//! The server is not authoritative over movement: it stores the last reported
//! position of each entity only so that late joiners spawn it in the right
//! place.

use anyhow::Context;
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};
use sync_shared::{
    config::SyncConfig,
    entity::{EntityId, EntityIdAllocator},
    math::Vec3,
    net::{
        ClientId, ReliableConn, ReliableListener, ReliableReader, ReliableWriter, SyncMsg,
        PROTOCOL_VERSION,
    },
};
use tokio::{net::UdpSocket, sync::mpsc, task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};

/// Spacing between spawn points along the x axis.
const SPAWN_SPACING: f32 = 2.0;

/// Connected client state.
struct ConnectedClient {
    name: String,
    reliable: ReliableWriter,
    udp_peer: SocketAddr,
    entity: EntityId,
    position: Vec3,
    /// Last timestamp stamped on a move relayed for this source.
    last_stamp: i64,
    reader: JoinHandle<()>,
}

/// Notifications from per-connection reader tasks.
#[derive(Debug)]
enum ConnEvent {
    Closed { client_id: ClientId, reason: String },
}

/// Relay server.
pub struct GameServer {
    pub cfg: SyncConfig,
    clients: HashMap<ClientId, ConnectedClient>,

    tcp: ReliableListener,
    udp: UdpSocket,

    ids: EntityIdAllocator,
    started: Instant,
    tick: u64,

    conn_tx: mpsc::UnboundedSender<ConnEvent>,
    conn_rx: mpsc::UnboundedReceiver<ConnEvent>,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
    quit: bool,
}

impl GameServer {
    /// Binds TCP and UDP on the configured address.
    pub async fn new(cfg: SyncConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let tcp = ReliableListener::bind(addr).await?;
        let udp = UdpSocket::bind(addr).await.context("udp bind")?;
        Ok(Self::from_sockets(cfg, tcp, udp))
    }

    fn from_sockets(cfg: SyncConfig, tcp: ReliableListener, udp: UdpSocket) -> Self {
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        Self {
            cfg,
            clients: HashMap::new(),
            tcp,
            udp,
            ids: EntityIdAllocator::default(),
            started: Instant::now(),
            tick: 0,
            conn_tx,
            conn_rx,
            console_rx: None,
            quit: false,
        }
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Set once a `quit` console command has been processed.
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Accepts exactly one client (handshake + world state).
    pub async fn accept_one(&mut self) -> anyhow::Result<ClientId> {
        let (conn, peer) = self.tcp.accept().await?;
        self.handle_new_connection(conn, peer).await
    }

    /// Accepts a client with timeout (non-blocking).
    pub async fn try_accept(&mut self, timeout: Duration) -> anyhow::Result<Option<ClientId>> {
        match tokio::time::timeout(timeout, self.tcp.accept()).await {
            Ok(Ok((conn, peer))) => self.handle_new_connection(conn, peer).await.map(Some),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn handle_new_connection(
        &mut self,
        mut conn: ReliableConn,
        peer: SocketAddr,
    ) -> anyhow::Result<ClientId> {
        let (name, client_udp_port) =
            tokio::time::timeout(self.cfg.handshake_timeout(), read_handshake(&mut conn))
                .await
                .with_context(|| format!("handshake from {peer} timed out"))??;

        let id = ClientId::new_unique();
        conn.send(&SyncMsg::Welcome { client_id: id }).await?;

        // Existing world first, so the newcomer can bind to what follows.
        for (&source, client) in &self.clients {
            conn.send(&SyncMsg::Create {
                entity: client.entity,
                position: client.position,
            })
            .await?;
            conn.send(&SyncMsg::Login {
                source,
                entity: client.entity,
            })
            .await?;
        }

        let entity = self.ids.allocate();
        let position = spawn_point(entity);

        let (reader, writer) = conn.into_split();
        let reader = tokio::spawn(watch_connection(id, reader, self.conn_tx.clone()));
        let udp_peer = SocketAddr::new(peer.ip(), client_udp_port);
        self.clients.insert(
            id,
            ConnectedClient {
                name,
                reliable: writer,
                udp_peer,
                entity,
                position,
                last_stamp: i64::MIN,
                reader,
            },
        );

        self.broadcast_reliable(&SyncMsg::Create { entity, position })
            .await;
        self.broadcast_reliable(&SyncMsg::Login { source: id, entity })
            .await;

        info!(client_id = ?id, entity = %entity, %udp_peer, "Client joined");
        Ok(id)
    }

    /// Runs the server for a number of ticks.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = self.cfg.tick_interval();
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step().await?;
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Executes one relay step.
    pub async fn step(&mut self) -> anyhow::Result<()> {
        self.process_console_commands();
        self.process_connection_events().await;
        self.relay_moves().await?;
        self.tick += 1;
        Ok(())
    }

    fn process_console_commands(&mut self) {
        // Collect lines first to avoid borrow conflict
        let lines: Vec<String> = if let Some(ref mut rx) = self.console_rx {
            let mut collected = Vec::new();
            while let Ok(line) = rx.try_recv() {
                collected.push(line);
            }
            collected
        } else {
            Vec::new()
        };

        for line in lines {
            for out in self.exec_console(&line) {
                println!("{}", out);
            }
        }
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> Vec<String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(cmd) = tokens.first() else {
            return Vec::new();
        };

        match *cmd {
            "status" => {
                let mut out = vec![
                    format!("Tick: {}", self.tick),
                    format!("Clients: {}", self.clients.len()),
                ];
                let mut ids: Vec<_> = self.clients.keys().copied().collect();
                ids.sort_by_key(|id| id.0);
                for id in ids {
                    let c = &self.clients[&id];
                    out.push(format!(
                        "  {:?} '{}': udp={} entity={} pos=({:.2}, {:.2})",
                        id, c.name, c.udp_peer, c.entity, c.position.x, c.position.y
                    ));
                }
                out
            }
            "quit" | "exit" => {
                info!("Server shutting down");
                self.quit = true;
                vec!["Shutting down".to_string()]
            }
            other => vec![format!("Unknown command: {other}")],
        }
    }

    async fn process_connection_events(&mut self) {
        while let Ok(event) = self.conn_rx.try_recv() {
            match event {
                ConnEvent::Closed { client_id, reason } => {
                    self.drop_client(client_id, &reason).await;
                }
            }
        }
    }

    /// Forgets `client_id` and tells everyone else its entity is gone.
    async fn drop_client(&mut self, client_id: ClientId, reason: &str) {
        let Some(client) = self.clients.remove(&client_id) else {
            return;
        };
        client.reader.abort();
        info!(client_id = ?client_id, entity = %client.entity, reason, "Client left");
        self.broadcast_reliable(&SyncMsg::Remove {
            entity: client.entity,
        })
        .await;
    }

    async fn broadcast_reliable(&mut self, msg: &SyncMsg) {
        for (id, client) in self.clients.iter_mut() {
            if let Err(e) = client.reliable.send(msg).await {
                // The reader task will notice the closed socket and report it.
                warn!(client_id = ?id, error = %e, "Reliable send failed");
            }
        }
    }

    async fn relay_moves(&mut self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            match self.udp.try_recv_from(&mut buf) {
                Ok((n, from)) => match serde_json::from_slice::<SyncMsg>(&buf[..n]) {
                    Ok(SyncMsg::UnitMovement {
                        client_id,
                        position,
                    }) => self.on_unit_movement(from, client_id, position).await,
                    Ok(other) => debug!(?other, "Unexpected UDP message"),
                    Err(e) => debug!(error = %e, %from, "Undecodable datagram"),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e).context("udp recv")?,
            }
        }
        Ok(())
    }

    async fn on_unit_movement(&mut self, from: SocketAddr, client_id: ClientId, position: Vec3) {
        let now_ms = self.started.elapsed().as_millis() as i64;
        let Some(client) = self.clients.get_mut(&client_id) else {
            debug!(client_id = ?client_id, %from, "Movement from unknown client");
            return;
        };
        client.udp_peer = from;
        client.position = position;
        client.last_stamp = now_ms.max(client.last_stamp.saturating_add(1));

        let msg = SyncMsg::Move {
            source: client_id,
            entity: client.entity,
            position,
            timestamp: client.last_stamp,
        };
        let payload = match serde_json::to_vec(&msg) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to encode move");
                return;
            }
        };

        for (id, other) in &self.clients {
            if *id == client_id {
                continue;
            }
            if let Err(e) = self.udp.send_to(&payload, other.udp_peer).await {
                debug!(client_id = ?id, error = %e, "Move relay failed");
            }
        }
    }
}

/// Waits for `Hello` then `UdpHello`; returns the player name and UDP port.
async fn read_handshake(conn: &mut ReliableConn) -> anyhow::Result<(String, u16)> {
    let name = match conn.recv().await? {
        SyncMsg::Hello { protocol, name } if protocol == PROTOCOL_VERSION => name,
        other => anyhow::bail!("unexpected handshake msg: {other:?}"),
    };
    let client_udp_port = match conn.recv().await? {
        SyncMsg::UdpHello { client_udp_port } => client_udp_port,
        other => anyhow::bail!("expected UdpHello, got {other:?}"),
    };
    Ok((name, client_udp_port))
}

/// Spawn point for a freshly allocated entity. Ids are never reused, so
/// neither are points.
fn spawn_point(entity: EntityId) -> Vec3 {
    Vec3::planar(entity.0.saturating_sub(1) as f32 * SPAWN_SPACING, 0.0)
}

/// Reads the reliable stream until it closes or the client says goodbye.
async fn watch_connection(
    client_id: ClientId,
    mut reader: ReliableReader,
    events: mpsc::UnboundedSender<ConnEvent>,
) {
    let reason = loop {
        match reader.recv().await {
            Ok(SyncMsg::Disconnect { reason }) => break reason,
            Ok(other) => debug!(client_id = ?client_id, ?other, "Ignoring reliable message"),
            Err(e) => break e.to_string(),
        }
    };
    let _ = events.send(ConnEvent::Closed { client_id, reason });
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral(tick_hz: u32) -> anyhow::Result<(GameServer, SyncConfig)> {
    let mut cfg = SyncConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        tick_hz,
        ..Default::default()
    };

    // Bind TCP first to get an ephemeral port, then bind UDP to that same port.
    let tcp = ReliableListener::bind(cfg.server_addr.parse()?).await?;
    let addr = tcp.local_addr()?;
    cfg.server_addr = addr.to_string();

    let udp_bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port());
    let udp = UdpSocket::bind(udp_bind).await?;

    Ok((GameServer::from_sockets(cfg.clone(), tcp, udp), cfg))
}
