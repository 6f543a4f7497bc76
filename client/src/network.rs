use crate::autopilot::Autopilot;
use crate::input::InputSampler;
use crate::mirror::ClientMirror;
use crate::presentation::PresentationSink;
use duel_shared::framing::{read_frame, write_frame, FrameError};
use duel_shared::{ClientMessage, Command, ConnectionId, Role, ServerMessage, PROTOCOL_VERSION};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(2);

type Inbound = Result<ServerMessage, FrameError>;

pub struct Client<S: PresentationSink> {
    writer: BufWriter<OwnedWriteHalf>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    reader: JoinHandle<()>,

    connection: Option<ConnectionId>,
    role: Option<Role>,
    mirror: ClientMirror,
    sink: S,

    sampler: InputSampler,
    autopilot: Option<Autopilot>,
}

impl<S: PresentationSink> Client<S> {
    pub async fn connect(server_addr: &str, sink: S) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", server_addr);

        let (read_half, write_half) = stream.into_split();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            loop {
                let frame = read_frame::<_, ServerMessage>(&mut reader).await;
                let failed = frame.is_err();
                if inbound_tx.send(frame).is_err() || failed {
                    break;
                }
            }
        });

        Ok(Client {
            writer: BufWriter::new(write_half),
            inbound,
            reader,
            connection: None,
            role: None,
            mirror: ClientMirror::new(),
            sink,
            sampler: InputSampler::new(),
            autopilot: None,
        })
    }

    pub fn with_autopilot(mut self, autopilot: Autopilot) -> Self {
        self.autopilot = Some(autopilot);
        self
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn mirror(&self) -> &ClientMirror {
        &self.mirror
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), FrameError> {
        write_frame(&mut self.writer, message).await
    }

    pub async fn send_command(&mut self, command: Command) -> Result<(), FrameError> {
        self.send(&ClientMessage::Command(command)).await
    }

    /// Announces leaving and closes the write side.
    pub async fn disconnect(&mut self) -> Result<(), FrameError> {
        self.send(&ClientMessage::Disconnect).await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Runs the session until the server closes it.
    ///
    /// Without an autopilot the client only spectates and keeps the
    /// connection alive.
    pub async fn run(
        &mut self,
        input_rate: u32,
        heartbeat: Duration,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.send(&ClientMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
        })
        .await?;

        let mut input_interval = interval(Duration::from_secs_f64(1.0 / input_rate.max(1) as f64));
        let mut heartbeat_interval = interval(heartbeat);

        loop {
            tokio::select! {
                inbound = self.inbound.recv() => {
                    match inbound {
                        Some(Ok(message)) => {
                            if !self.handle_message(message).await? {
                                return Ok(());
                            }
                        }
                        Some(Err(FrameError::Closed)) | None => {
                            info!("Server closed the connection");
                            return Ok(());
                        }
                        Some(Err(e)) => {
                            error!("Error receiving from server: {}", e);
                            return Err(e.into());
                        }
                    }
                },

                _ = input_interval.tick() => {
                    self.drive_input().await?;
                },

                _ = heartbeat_interval.tick() => {
                    self.send(&ClientMessage::Heartbeat).await?;
                },
            }
        }
    }

    /// Returns false once the server has said goodbye.
    async fn handle_message(&mut self, message: ServerMessage) -> Result<bool, FrameError> {
        match message {
            ServerMessage::Welcome { connection, role } => {
                info!("Welcome! We are {} playing {:?}", connection, role);
                self.connection = Some(connection);
                self.role = Some(role);
                self.mirror.set_local_connection(connection);
                self.send(&ClientMessage::RequestSpawn).await?;
            }
            ServerMessage::Tick { tick, events } => {
                debug!("Tick {}: {} events", tick, events.len());
                self.mirror.apply_tick(tick, &events, &mut self.sink);
            }
            ServerMessage::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn drive_input(&mut self) -> Result<(), FrameError> {
        let Some(autopilot) = self.autopilot.as_mut() else {
            return Ok(());
        };
        if self.mirror.owned_entity().is_none() {
            return Ok(());
        }

        let controls = autopilot.control(&self.mirror);
        for command in self.sampler.sample(controls) {
            self.send_command(command).await?;
        }
        Ok(())
    }
}

impl<S: PresentationSink> Drop for Client<S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
