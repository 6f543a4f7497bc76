//! Server network layer: TCP sessions feeding the authoritative tick loop

use crate::config::ServerConfig;
use crate::error::CommandError;
use crate::session::SessionManager;
use crate::simulation::Simulation;
use duel_shared::framing::{read_frame, write_frame, FrameError};
use duel_shared::{ClientMessage, ConnectionId, ServerMessage, PROTOCOL_VERSION};
use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Longest step the simulation is allowed to take in one tick.
pub const MAX_TICK_DT: f32 = 0.05;

/// How long a rejected connection gets to read its `Disconnected` frame.
const REJECT_LINGER: Duration = Duration::from_secs(2);

/// Why a connection stopped delivering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossReason {
    Closed,
    Malformed,
    Io,
    TimedOut,
}

impl From<&FrameError> for LossReason {
    fn from(error: &FrameError) -> Self {
        match error {
            FrameError::Closed => LossReason::Closed,
            e if e.is_malformed() => LossReason::Malformed,
            _ => LossReason::Io,
        }
    }
}

/// Messages sent from connection tasks to the server loop
#[derive(Debug)]
enum NetworkEvent {
    Message {
        connection: ConnectionId,
        message: ClientMessage,
    },
    Lost {
        connection: ConnectionId,
        reason: LossReason,
        detail: String,
    },
}

/// Main server coordinating sessions and the simulation
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    sessions: SessionManager,
    simulation: Simulation,

    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            sessions: SessionManager::new(config.max_players),
            simulation: Simulation::new(config.tuning.clone()),
            config,
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections and drives the tick loop until the task is dropped.
    pub async fn run(mut self) {
        let mut tick_interval = interval(self.config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timeout_interval = interval(Duration::from_secs(1));
        let mut last_tick = Instant::now();

        info!(
            "Server started: {} Hz, {} players max",
            self.config.tick_rate, self.config.max_players
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.admit(stream, addr),
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                event = self.event_rx.recv() => {
                    match event {
                        Some(NetworkEvent::Message { connection, message }) => {
                            self.handle_message(connection, message);
                        }
                        Some(NetworkEvent::Lost { connection, reason, detail }) => {
                            self.handle_loss(connection, reason, &detail);
                        }
                        // The loop holds a sender, so the channel never closes
                        None => break,
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if elapsed > MAX_TICK_DT {
                        debug!("Large tick delta {:.3}s, capping to {:.3}s", elapsed, MAX_TICK_DT);
                    }
                    self.tick(elapsed.min(MAX_TICK_DT));
                },

                _ = timeout_interval.tick() => {
                    for connection in self.sessions.check_timeouts(self.config.client_timeout()) {
                        self.handle_loss(connection, LossReason::TimedOut, "no messages received");
                    }
                },
            }
        }
    }

    /// Registers a new TCP connection, or turns it away when the server is full.
    fn admit(&mut self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }
        let (read_half, write_half) = stream.into_split();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let Some((connection, _role)) = self.sessions.accept(addr, outbound_tx) else {
            warn!("Rejecting {}: server full", addr);
            tokio::spawn(reject(read_half, write_half, "Server full"));
            return;
        };

        tokio::spawn(write_loop(write_half, outbound_rx, connection));
        let reader = tokio::spawn(read_loop(read_half, connection, self.event_tx.clone()));
        self.sessions.attach_reader(connection, reader);
    }

    fn handle_message(&mut self, connection: ConnectionId, message: ClientMessage) {
        // Messages can still arrive from a connection we just dropped
        let Some(greeted) = self.sessions.get(connection).map(|c| c.greeted) else {
            return;
        };
        self.sessions.touch(connection);

        match message {
            ClientMessage::Hello { protocol_version } => {
                if greeted {
                    debug!("{} repeated Hello", connection);
                } else if protocol_version != PROTOCOL_VERSION {
                    warn!(
                        "{} speaks protocol {}, expected {}",
                        connection, protocol_version, PROTOCOL_VERSION
                    );
                    self.drop_connection(connection, Some("Protocol version mismatch"));
                } else {
                    self.greet(connection);
                }
            }

            _ if !greeted => {
                warn!("{} sent {:?} before Hello", connection, message);
                self.drop_connection(connection, Some("Handshake required"));
            }

            ClientMessage::RequestSpawn => {
                let Some(role) = self.sessions.get(connection).map(|c| c.role) else {
                    return;
                };
                match self.simulation.spawn(connection, role) {
                    Ok(entity) => self.sessions.bind_entity(connection, entity),
                    Err(e) => warn!("Spawn rejected: {}", e),
                }
            }

            ClientMessage::Command(command) => {
                let Some(entity) = self.sessions.entity_of(connection) else {
                    debug!("{} sent {:?} without an entity", connection, command);
                    return;
                };
                match self.simulation.submit(connection, entity, command) {
                    Ok(()) => {}
                    Err(CommandError::Rejected(reason)) => {
                        debug!("{:?} from {} rejected: {}", command, connection, reason);
                    }
                    Err(e @ CommandError::UnknownEntity(_)) => {
                        warn!("{:?} from {} dropped: {}", command, connection, e);
                    }
                }
            }

            ClientMessage::Heartbeat => {}

            ClientMessage::Disconnect => {
                info!("{} is leaving", connection);
                self.drop_connection(connection, None);
            }
        }
    }

    fn greet(&mut self, connection: ConnectionId) {
        let Some(role) = self.sessions.get(connection).map(|c| c.role) else {
            return;
        };
        self.sessions.mark_greeted(connection);
        self.sessions
            .send(connection, ServerMessage::Welcome { connection, role });
        info!("{} joined as {:?}", connection, role);
    }

    fn handle_loss(&mut self, connection: ConnectionId, reason: LossReason, detail: &str) {
        if self.sessions.get(connection).is_none() {
            return;
        }

        match reason {
            LossReason::Closed => info!("{} closed the connection", connection),
            LossReason::TimedOut => info!("{} timed out: {}", connection, detail),
            LossReason::Malformed => warn!("Malformed message from {}: {}", connection, detail),
            LossReason::Io => error!("Socket error on {}: {}", connection, detail),
        }

        let farewell = match reason {
            LossReason::Malformed => Some("Malformed message"),
            LossReason::TimedOut => Some("Timed out"),
            LossReason::Closed | LossReason::Io => None,
        };
        self.drop_connection(connection, farewell);
    }

    /// Despawns the connection's entity and closes it, optionally telling
    /// the peer why first.
    fn drop_connection(&mut self, connection: ConnectionId, reason: Option<&str>) {
        self.simulation.despawn_owned_by(connection);

        if let Some(removed) = self.sessions.remove(connection) {
            if let Some(reason) = reason {
                removed.send(ServerMessage::Disconnected {
                    reason: reason.to_string(),
                });
            }
        }
    }

    fn tick(&mut self, dt: f32) {
        let report = self.simulation.step(dt);

        let audience: Vec<ConnectionId> = self
            .sessions
            .connection_ids()
            .into_iter()
            .filter(|id| self.sessions.get(*id).is_some_and(|c| c.greeted))
            .collect();

        for (connection, events) in report.route(&audience) {
            self.sessions.send(
                connection,
                ServerMessage::Tick {
                    tick: report.tick,
                    events,
                },
            );
        }

        if report.tick % 60 == 0 && !self.sessions.is_empty() {
            debug!(
                "Tick {}: {} connections, {} entities, {} deliveries, {:.1}Hz",
                report.tick,
                self.sessions.len(),
                self.simulation.registry().len(),
                report.deliveries.len(),
                1.0 / dt
            );
        }
    }
}

/// Forwards decoded frames to the server loop until the stream ends.
async fn read_loop(
    read_half: OwnedReadHalf,
    connection: ConnectionId,
    events: mpsc::UnboundedSender<NetworkEvent>,
) {
    let mut reader = BufReader::new(read_half);

    loop {
        match read_frame::<_, ClientMessage>(&mut reader).await {
            Ok(message) => {
                if events
                    .send(NetworkEvent::Message {
                        connection,
                        message,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                let lost = NetworkEvent::Lost {
                    connection,
                    reason: LossReason::from(&e),
                    detail: e.to_string(),
                };
                if events.send(lost).is_err() {
                    debug!("Server loop gone while reporting loss of {}", connection);
                }
                break;
            }
        }
    }
}

/// Writes queued messages in order. A `Disconnected` message is the last
/// frame a connection ever receives.
async fn write_loop(
    write_half: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    connection: ConnectionId,
) {
    let mut writer = BufWriter::new(write_half);

    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, ServerMessage::Disconnected { .. });
        if let Err(e) = write_frame(&mut writer, &message).await {
            error!("Failed to write to {}: {}", connection, e);
            break;
        }
        if closing {
            break;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of {} failed: {}", connection, e);
    }
}

/// Sends a single `Disconnected` frame and closes, draining whatever the peer
/// already sent so the close does not turn into a reset.
async fn reject(read_half: OwnedReadHalf, write_half: OwnedWriteHalf, reason: &'static str) {
    let mut writer = BufWriter::new(write_half);
    let message = ServerMessage::Disconnected {
        reason: reason.to_string(),
    };
    if let Err(e) = write_frame(&mut writer, &message).await {
        debug!("Failed to send rejection: {}", e);
        return;
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown after rejection failed: {}", e);
    }

    let mut reader = read_half;
    let mut sink = [0u8; 1024];
    let drain = async {
        while let Ok(n) = reader.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
    };
    if tokio::time::timeout(REJECT_LINGER, drain).await.is_err() {
        debug!("Rejected peer kept the connection open");
    }
}
