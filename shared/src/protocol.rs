//! Wire protocol between the duel client and the authoritative server.

use crate::vector::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bumped whenever a message layout changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Server-assigned identifier of a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

/// Stable identifier of a fighter, assigned at spawn and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Seat a connection occupies in the match. Decides spawn point and facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Host,
    Challenger,
}

impl Role {
    /// Facing at spawn: the host looks right, the challenger left.
    pub fn spawn_facing(&self) -> i8 {
        match self {
            Role::Host => 1,
            Role::Challenger => -1,
        }
    }
}

/// Intent submitted by the owner of an entity. The server validates every field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Move { axis: f32 },
    StopMove,
    Jump,
    Attack,
    Block { engage: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Hello { protocol_version: u32 },
    RequestSpawn,
    Command(Command),
    Heartbeat,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Welcome { connection: ConnectionId, role: Role },
    /// Every event one tick produced for the receiving connection, in order.
    Tick { tick: u64, events: Vec<Event> },
    Disconnected { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementState {
    Idle,
    Moving,
}

/// Full placement of an entity, sent when it spawns or when a client joins late.
///
/// `health` is only filled in for the owning connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub owner: ConnectionId,
    pub role: Role,
    pub position: Vector2,
    pub facing: i8,
    pub grounded: bool,
    pub blocking: bool,
    pub dead: bool,
    pub max_health: f32,
    pub health: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    Spawned(EntitySnapshot),
    Despawned,
    PositionChanged { position: Vector2 },
    FacingChanged { direction: i8 },
    GroundedChanged { grounded: bool },
    MovementStateChanged { state: MovementState },
    JumpTriggered,
    AttackTriggered { stage: u8 },
    BlockStarted,
    BlockEnded,
    HurtTriggered,
    DeathTriggered,
    InvincibilityEnded,
    HealthChanged { value: f32 },
}

impl EventKind {
    /// Events only the owner of the entity may receive.
    pub fn is_owner_scoped(&self) -> bool {
        matches!(self, EventKind::HealthChanged { .. })
    }
}

/// A replicated change to one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub entity: EntityId,
    pub kind: EventKind,
}

impl Event {
    pub fn new(entity: EntityId, kind: EventKind) -> Self {
        Event { entity, kind }
    }
}
