//! Connection bookkeeping for the TCP transport
//!
//! This module tracks the connections admitted by the server:
//! - Capacity enforcement and connection id assignment
//! - Role assignment (the first free slot is Host, everyone else Challenger)
//! - Outbound message queues feeding each connection's writer task
//! - Liveness tracking for timeout detection
//!
//! The manager is owned by the server loop, so none of this needs locking.

use duel_shared::{ConnectionId, EntityId, Role, ServerMessage};
use log::{info, warn};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// A connection admitted by the server
///
/// Each connection carries:
/// - Its identity and assigned role
/// - Handshake and spawn progress
/// - The queue its writer task drains
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub role: Role,
    /// Last time any message arrived from this connection
    pub last_seen: Instant,
    /// Set once a compatible `Hello` has been answered with `Welcome`
    pub greeted: bool,
    /// The entity this connection controls, once spawned
    pub entity: Option<EntityId>,
    outbound: UnboundedSender<ServerMessage>,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    fn new(
        id: ConnectionId,
        addr: SocketAddr,
        role: Role,
        outbound: UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            addr,
            role,
            last_seen: Instant::now(),
            greeted: false,
            entity: None,
            outbound,
            reader: None,
        }
    }

    /// Queues a message for the writer task. Returns false if the writer is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbound.send(message).is_ok()
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Dropping `outbound` lets the writer drain and exit on its own
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Registry of live connections
pub struct SessionManager {
    connections: BTreeMap<ConnectionId, Connection>,
    next_connection_id: u32,
    max_connections: usize,
}

impl SessionManager {
    /// Creates an empty manager admitting at most `max_connections`.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: BTreeMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    pub fn is_full(&self) -> bool {
        self.connections.len() >= self.max_connections
    }

    /// Admits a new connection
    ///
    /// Returns the assigned id and role, or None when the server is at
    /// capacity. The Host role goes to the new connection whenever no live
    /// connection holds it.
    pub fn accept(
        &mut self,
        addr: SocketAddr,
        outbound: UnboundedSender<ServerMessage>,
    ) -> Option<(ConnectionId, Role)> {
        if self.is_full() {
            return None;
        }

        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;

        let host_taken = self.connections.values().any(|c| c.role == Role::Host);
        let role = if host_taken { Role::Challenger } else { Role::Host };

        info!("{} connected from {} as {:?}", id, addr, role);
        self.connections
            .insert(id, Connection::new(id, addr, role, outbound));

        Some((id, role))
    }

    /// Hands the connection its reader task so it is aborted on removal.
    pub fn attach_reader(&mut self, id: ConnectionId, reader: JoinHandle<()>) {
        match self.connections.get_mut(&id) {
            Some(connection) => connection.reader = Some(reader),
            None => reader.abort(),
        }
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.remove(&id);
        if let Some(connection) = &removed {
            info!("{} ({}) disconnected", connection.id, connection.addr);
        }
        removed
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Refreshes the liveness timestamp.
    pub fn touch(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.last_seen = Instant::now();
        }
    }

    pub fn mark_greeted(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.greeted = true;
        }
    }

    pub fn bind_entity(&mut self, id: ConnectionId, entity: EntityId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.entity = Some(entity);
        }
    }

    pub fn entity_of(&self, id: ConnectionId) -> Option<EntityId> {
        self.connections.get(&id).and_then(|c| c.entity)
    }

    /// Ids of every live connection, ascending.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Queues a message for one connection.
    pub fn send(&self, id: ConnectionId, message: ServerMessage) -> bool {
        match self.connections.get(&id) {
            Some(connection) => connection.send(message),
            None => {
                warn!("Dropping message for unknown {}", id);
                false
            }
        }
    }

    /// Connections that have been silent for longer than `timeout`.
    /// They are left in place for the caller to tear down.
    pub fn check_timeouts(&self, timeout: Duration) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|connection| connection.is_timed_out(timeout))
            .map(|connection| connection.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
