//! Integration tests for the duel server and client over real TCP sockets
//!
//! Each test starts its own server on an ephemeral port and talks to it with
//! the same framing the real client uses.

use assert_approx_eq::assert_approx_eq;
use duel_client::mirror::{ClientMirror, MirroredEntity};
use duel_client::presentation::PresentationSink;
use duel_server::config::{CombatTuning, ServerConfig};
use duel_server::network::Server;
use duel_shared::framing::{read_frame, write_frame, FrameError};
use duel_shared::{
    ClientMessage, Command, ConnectionId, EntityId, EntitySnapshot, Event, EventKind, Role, ServerMessage, Vector2,
    PROTOCOL_VERSION,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

async fn start_server(tuning: CombatTuning) -> SocketAddr {
    let config = ServerConfig {
        port: 0,
        tuning,
        ..ServerConfig::default()
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

/// Tuning with the fighters one unit either side of the centre, in reach.
fn close_quarters() -> CombatTuning {
    CombatTuning {
        host_spawn: Vector2::new(-1.0, 2.5),
        challenger_spawn: Vector2::new(1.0, 2.5),
        ..CombatTuning::default()
    }
}

/// A raw protocol peer
struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Every tick's events received so far
    history: Vec<Vec<Event>>,
}

impl Peer {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            history: Vec::new(),
        }
    }

    /// Connects and completes the handshake.
    async fn join(addr: SocketAddr) -> (Self, ConnectionId, Role) {
        let mut peer = Self::connect(addr).await;
        peer.send(ClientMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
        })
        .await;

        match peer.recv().await {
            ServerMessage::Welcome { connection, role } => (peer, connection, role),
            other => panic!("expected Welcome, got {:?}", other),
        }
    }

    async fn send(&mut self, message: ClientMessage) {
        write_frame(&mut self.writer, &message).await.unwrap();
    }

    async fn try_recv(&mut self) -> Result<ServerMessage, FrameError> {
        timeout(RECV_TIMEOUT, read_frame(&mut self.reader))
            .await
            .expect("timed out waiting for the server")
    }

    async fn recv(&mut self) -> ServerMessage {
        self.try_recv().await.unwrap()
    }

    /// Reads tick messages until `done` accepts one, returning each tick's events.
    async fn ticks_until<F>(&mut self, mut done: F) -> Vec<Vec<Event>>
    where
        F: FnMut(&[Event]) -> bool,
    {
        let mut ticks = Vec::new();
        loop {
            match self.recv().await {
                ServerMessage::Tick { events, .. } => {
                    let finished = done(&events);
                    self.history.push(events.clone());
                    ticks.push(events);
                    if finished {
                        return ticks;
                    }
                }
                other => panic!("expected Tick, got {:?}", other),
            }
        }
    }

    /// Reads until both listed entities have reported landing.
    async fn until_landed(&mut self, entities: &[EntityId]) -> Vec<Vec<Event>> {
        let mut pending: HashSet<EntityId> = entities.iter().copied().collect();
        self.ticks_until(|events| {
            for event in events {
                if event.kind == (EventKind::GroundedChanged { grounded: true }) {
                    pending.remove(&event.entity);
                }
            }
            pending.is_empty()
        })
        .await
    }
}

fn spawned_entity(ticks: &[Vec<Event>], owner: ConnectionId) -> Option<(EntityId, EntitySnapshot)> {
    ticks.iter().flatten().find_map(|event| match &event.kind {
        EventKind::Spawned(snapshot) if snapshot.owner == owner => {
            Some((event.entity, snapshot.clone()))
        }
        _ => None,
    })
}

/// Two spawned fighters, both standing on the floor
async fn spawned_pair(
    tuning: CombatTuning,
) -> ((Peer, ConnectionId, EntityId), (Peer, ConnectionId, EntityId)) {
    let addr = start_server(tuning).await;

    let (mut host, host_conn, _) = Peer::join(addr).await;
    host.send(ClientMessage::RequestSpawn).await;
    let ticks = host
        .ticks_until(|events| events.iter().any(|e| matches!(e.kind, EventKind::Spawned(_))))
        .await;
    let (host_entity, _) = spawned_entity(&ticks, host_conn).unwrap();

    let (mut challenger, challenger_conn, _) = Peer::join(addr).await;
    challenger.send(ClientMessage::RequestSpawn).await;
    let ticks = challenger
        .ticks_until(|events| events.iter().any(|e| matches!(e.kind, EventKind::Spawned(_))))
        .await;
    let (challenger_entity, _) = spawned_entity(&ticks, challenger_conn).unwrap();

    host.until_landed(&[host_entity, challenger_entity]).await;
    challenger.until_landed(&[challenger_entity]).await;

    (
        (host, host_conn, host_entity),
        (challenger, challenger_conn, challenger_entity),
    )
}

/// SESSION TESTS
mod session_tests {
    use super::*;

    /// First connection hosts, second challenges
    #[tokio::test]
    async fn handshake_assigns_roles() {
        let addr = start_server(CombatTuning::default()).await;

        let (_a, conn_a, role_a) = Peer::join(addr).await;
        let (_b, conn_b, role_b) = Peer::join(addr).await;

        assert_eq!(conn_a, ConnectionId(1));
        assert_eq!(role_a, Role::Host);
        assert_eq!(conn_b, ConnectionId(2));
        assert_eq!(role_b, Role::Challenger);
    }

    /// A third connection is told the server is full
    #[tokio::test]
    async fn third_connection_is_turned_away() {
        let addr = start_server(CombatTuning::default()).await;
        let (_a, _, _) = Peer::join(addr).await;
        let (_b, _, _) = Peer::join(addr).await;

        let mut late = Peer::connect(addr).await;
        late.send(ClientMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
        })
        .await;

        assert_eq!(
            late.recv().await,
            ServerMessage::Disconnected {
                reason: "Server full".to_string()
            }
        );
    }

    /// Incompatible clients are refused during the handshake
    #[tokio::test]
    async fn protocol_version_mismatch() {
        let addr = start_server(CombatTuning::default()).await;
        let mut peer = Peer::connect(addr).await;

        peer.send(ClientMessage::Hello {
            protocol_version: PROTOCOL_VERSION + 1,
        })
        .await;

        assert_eq!(
            peer.recv().await,
            ServerMessage::Disconnected {
                reason: "Protocol version mismatch".to_string()
            }
        );
    }

    /// Garbage on one connection terminates only that connection
    #[tokio::test]
    async fn malformed_frame_closes_connection() {
        let addr = start_server(CombatTuning::default()).await;
        let (mut bad, _, _) = Peer::join(addr).await;
        let (mut good, good_conn, _) = Peer::join(addr).await;

        bad.writer
            .write_all(&[0, 0, 0, 4, 0xff, 0xff, 0xff, 0xff])
            .await
            .unwrap();

        loop {
            match bad.recv().await {
                ServerMessage::Tick { .. } => continue,
                ServerMessage::Disconnected { reason } => {
                    assert_eq!(reason, "Malformed message");
                    break;
                }
                other => panic!("expected disconnect, got {:?}", other),
            }
        }
        assert!(matches!(bad.try_recv().await, Err(FrameError::Closed)));

        good.send(ClientMessage::RequestSpawn).await;
        let ticks = good
            .ticks_until(|events| events.iter().any(|e| matches!(e.kind, EventKind::Spawned(_))))
            .await;
        assert!(spawned_entity(&ticks, good_conn).is_some());
    }

    /// Leaving removes the fighter for everyone else
    #[tokio::test]
    async fn disconnect_despawns_entity() {
        let ((mut host, _, _), (mut challenger, _, challenger_entity)) =
            spawned_pair(CombatTuning::default()).await;

        challenger.send(ClientMessage::Disconnect).await;

        let ticks = host
            .ticks_until(|events| events.iter().any(|e| e.kind == EventKind::Despawned))
            .await;
        let despawned = ticks.iter().flatten().find(|e| e.kind == EventKind::Despawned);
        assert_eq!(despawned.map(|e| e.entity), Some(challenger_entity));
    }
}

/// REPLICATION TESTS
mod replication_tests {
    use super::*;

    /// Fighters appear at their role's spawn point, facing the centre
    #[tokio::test]
    async fn spawn_placement_and_late_join() {
        let addr = start_server(CombatTuning::default()).await;

        let (mut host, host_conn, _) = Peer::join(addr).await;
        host.send(ClientMessage::RequestSpawn).await;
        let ticks = host
            .ticks_until(|events| events.iter().any(|e| matches!(e.kind, EventKind::Spawned(_))))
            .await;
        let (host_entity, own) = spawned_entity(&ticks, host_conn).unwrap();
        assert_approx_eq!(own.position.x, -7.5, 1e-6);
        assert_approx_eq!(own.position.y, 2.5, 1e-6);
        assert_eq!(own.facing, 1);
        assert_eq!(own.health, Some(100.0));

        let (mut challenger, challenger_conn, _) = Peer::join(addr).await;
        challenger.send(ClientMessage::RequestSpawn).await;
        let ticks = challenger
            .ticks_until(|events| events.iter().any(|e| matches!(e.kind, EventKind::Spawned(_))))
            .await;

        let (_, own) = spawned_entity(&ticks, challenger_conn).unwrap();
        assert_approx_eq!(own.position.x, 7.5, 1e-6);
        assert_approx_eq!(own.position.y, 2.5, 1e-6);
        assert_eq!(own.facing, -1);
        assert_eq!(own.health, Some(100.0));

        let (seen_host, other) = spawned_entity(&ticks, host_conn).unwrap();
        assert_eq!(seen_host, host_entity);
        assert_eq!(other.role, Role::Host);
        assert_eq!(other.health, None);
    }

    /// A second spawn request leaves the existing fighter alone
    #[tokio::test]
    async fn duplicate_spawn_is_ignored() {
        let addr = start_server(CombatTuning::default()).await;
        let (mut peer, conn, _) = Peer::join(addr).await;

        // Commands before spawning are dropped without closing the session
        peer.send(ClientMessage::Command(Command::Jump)).await;
        peer.send(ClientMessage::RequestSpawn).await;
        peer.send(ClientMessage::RequestSpawn).await;

        let ticks = peer.until_landed(&[EntityId(1)]).await;
        let spawns: Vec<&Event> = ticks
            .iter()
            .flatten()
            .filter(|e| matches!(e.kind, EventKind::Spawned(_)))
            .collect();

        assert_eq!(spawns.len(), 1);
        assert_eq!(spawned_entity(&ticks, conn).map(|(id, _)| id), Some(EntityId(1)));
    }

    #[derive(Default)]
    struct Recorder {
        kinds: Vec<EventKind>,
    }

    impl PresentationSink for Recorder {
        fn on_event(&mut self, _view: &MirroredEntity, kind: &EventKind) {
            self.kinds.push(kind.clone());
        }
    }

    /// A landed stage-one hit: owner sees the health drop, the attacker never does
    #[tokio::test]
    async fn attack_end_to_end_with_health_scoping() {
        let ((mut host, host_conn, host_entity), (mut challenger, challenger_conn, challenger_entity)) =
            spawned_pair(close_quarters()).await;

        host.send(ClientMessage::Command(Command::Attack)).await;

        let attacker_ticks = host
            .ticks_until(|events| {
                events
                    .iter()
                    .any(|e| e.entity == challenger_entity && e.kind == EventKind::HurtTriggered)
            })
            .await;
        let hurt_tick = attacker_ticks.last().unwrap();
        assert!(hurt_tick.contains(&Event::new(
            host_entity,
            EventKind::AttackTriggered { stage: 1 }
        )));
        assert!(attacker_ticks
            .iter()
            .flatten()
            .all(|e| !matches!(e.kind, EventKind::HealthChanged { .. })));

        let owner_ticks = challenger
            .ticks_until(|events| events.iter().any(|e| e.kind == EventKind::HurtTriggered))
            .await;
        let hurt_tick = owner_ticks.last().unwrap();
        let health_at = hurt_tick
            .iter()
            .position(|e| e.kind == (EventKind::HealthChanged { value: 90.0 }));
        let hurt_at = hurt_tick
            .iter()
            .position(|e| e.kind == EventKind::HurtTriggered);
        assert!(health_at.is_some());
        assert!(health_at < hurt_at);
        assert!(hurt_tick
            .iter()
            .all(|e| e.entity == challenger_entity || !matches!(e.kind, EventKind::HealthChanged { .. })));

        // Replaying what each side received through a mirror
        let mut recorder = Recorder::default();
        let mut owner_mirror = ClientMirror::new();
        owner_mirror.set_local_connection(challenger_conn);
        for (tick, events) in challenger.history.iter().enumerate() {
            owner_mirror.apply_tick(tick as u64, events, &mut recorder);
        }

        let mut attacker_mirror = ClientMirror::new();
        attacker_mirror.set_local_connection(host_conn);
        for (tick, events) in host.history.iter().enumerate() {
            attacker_mirror.apply_tick(tick as u64, events, &mut Recorder::default());
        }

        let me = owner_mirror.owned_entity().unwrap();
        assert_eq!(me.health, Some(90.0));
        assert!(me.invincible);
        let them = attacker_mirror.get(challenger_entity).unwrap();
        assert_eq!(them.health, None);
        assert!(them.invincible);
        assert!(recorder.kinds.contains(&EventKind::HurtTriggered));
    }

    /// A blocking fighter takes no damage
    #[tokio::test]
    async fn blocked_attack_deals_no_damage() {
        let ((mut host, _, host_entity), (mut challenger, _, challenger_entity)) =
            spawned_pair(close_quarters()).await;

        challenger
            .send(ClientMessage::Command(Command::Block { engage: true }))
            .await;
        host.ticks_until(|events| {
            events
                .iter()
                .any(|e| e.entity == challenger_entity && e.kind == EventKind::BlockStarted)
        })
        .await;

        host.send(ClientMessage::Command(Command::Attack)).await;
        host.send(ClientMessage::Command(Command::Jump)).await;

        // The jump lands after the attack would have resolved
        let ticks = host
            .ticks_until(|events| {
                events.iter().any(|e| {
                    e.entity == host_entity && e.kind == (EventKind::GroundedChanged { grounded: true })
                })
            })
            .await;

        let events: Vec<&Event> = ticks.iter().flatten().collect();
        assert!(events
            .iter()
            .any(|e| e.kind == EventKind::AttackTriggered { stage: 1 }));
        assert!(events.iter().all(|e| e.kind != EventKind::HurtTriggered));
    }
}

/// CLIENT TESTS
mod client_tests {
    use super::*;
    use duel_client::autopilot::Autopilot;
    use duel_client::network::Client;

    /// Counts what the presentation layer was shown
    #[derive(Default)]
    struct Tally {
        events: usize,
        spawns: usize,
    }

    impl PresentationSink for Tally {
        fn on_event(&mut self, _view: &MirroredEntity, kind: &EventKind) {
            self.events += 1;
            if matches!(kind, EventKind::Spawned(_)) {
                self.spawns += 1;
            }
        }
    }

    /// Two autopilot clients spawn and see each other
    #[tokio::test]
    async fn autopilot_clients_duel() {
        let addr = start_server(close_quarters()).await.to_string();

        let mut a = Client::connect(&addr, Tally::default())
            .await
            .unwrap()
            .with_autopilot(Autopilot::new(1));
        let mut b = Client::connect(&addr, Tally::default())
            .await
            .unwrap()
            .with_autopilot(Autopilot::new(2));

        let window = Duration::from_secs(2);
        let (ra, rb) = tokio::join!(
            timeout(window, a.run(60, Duration::from_millis(500))),
            timeout(window, b.run(60, Duration::from_millis(500)))
        );

        // Both sessions were still running when the window closed
        assert!(ra.is_err());
        assert!(rb.is_err());

        for client in [&a, &b] {
            assert!(client.connection().is_some());
            assert_eq!(client.mirror().len(), 2);
            assert!(client.mirror().owned_entity().is_some());
            assert_eq!(client.sink().spawns, 2);
            assert!(client.sink().events >= client.sink().spawns);
        }
        assert_ne!(a.role(), b.role());
    }
}
