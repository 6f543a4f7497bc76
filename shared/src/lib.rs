//! Types and constants shared by the duel server and client.
//!
//! The server is the only process that mutates combat state. Everything here
//! is either plain data that travels over the wire or pure geometry that both
//! sides evaluate the same way.

pub mod framing;
pub mod protocol;
pub mod vector;

pub use protocol::{
    ClientMessage, Command, ConnectionId, EntityId, EntitySnapshot, Event, EventKind,
    MovementState, Role, ServerMessage, PROTOCOL_VERSION,
};
pub use vector::{Aabb, Vector2};

pub const MOVE_SPEED: f32 = 5.0;
pub const JUMP_FORCE: f32 = 10.0;
pub const GRAVITY: f32 = 25.0;
pub const MAX_HEALTH: f32 = 100.0;

/// Minimum seconds between two accepted attacks.
pub const ATTACK_COOLDOWN: f32 = 0.25;
/// Attacks closer together than this continue the combo; slower ones restart it.
pub const COMBO_WINDOW: f32 = 1.0;
pub const STAGE_DAMAGE: [f32; 3] = [10.0, 15.0, 20.0];
pub const INVINCIBILITY_DURATION: f32 = 1.0;

/// Horizontal offset of the attack box centre, multiplied by facing.
pub const ATTACK_REACH: f32 = 1.5;
pub const ATTACK_BOX_SIZE: Vector2 = Vector2 { x: 2.0, y: 1.0 };
pub const BODY_SIZE: Vector2 = Vector2 { x: 1.0, y: 2.0 };

pub const HOST_SPAWN: Vector2 = Vector2 { x: -7.5, y: 2.5 };
pub const CHALLENGER_SPAWN: Vector2 = Vector2 { x: 7.5, y: 2.5 };

pub const FLOOR_Y: f32 = 0.0;
pub const ARENA_HALF_WIDTH: f32 = 12.0;
