//! Client-side copy of the arena, rebuilt purely from replicated events.
//!
//! The mirror accepts server events only; it has no way to originate state.
//! Remote fighters follow every update. The locally owned fighter keeps the
//! position and facing it spawned with, since its on-screen pose belongs to
//! local presentation, but everything the server decides (health, death,
//! blocking, grounded) applies to it like any other entity.

use crate::presentation::PresentationSink;
use duel_shared::{
    ConnectionId, EntityId, EntitySnapshot, Event, EventKind, MovementState, Role, Vector2,
};
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct MirroredEntity {
    pub id: EntityId,
    pub owner: ConnectionId,
    pub role: Role,
    /// Presented position. Frozen at the spawn point for the owned fighter.
    pub position: Vector2,
    /// Latest position the server reported, for every fighter.
    pub server_position: Vector2,
    pub facing: i8,
    pub grounded: bool,
    pub blocking: bool,
    pub dead: bool,
    pub invincible: bool,
    pub movement: MovementState,
    pub attack_stage: u8,
    pub max_health: f32,
    /// Only known for the owned fighter.
    pub health: Option<f32>,
}

impl MirroredEntity {
    fn from_snapshot(id: EntityId, snapshot: &EntitySnapshot) -> Self {
        Self {
            id,
            owner: snapshot.owner,
            role: snapshot.role,
            position: snapshot.position,
            server_position: snapshot.position,
            facing: snapshot.facing,
            grounded: snapshot.grounded,
            blocking: snapshot.blocking,
            dead: snapshot.dead,
            invincible: false,
            movement: MovementState::Idle,
            attack_stage: 0,
            max_health: snapshot.max_health,
            health: snapshot.health,
        }
    }
}

/// What applying one event did to the mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Updated,
    /// The entity was removed; carries its last known state.
    Removed(MirroredEntity),
    Ignored,
}

#[derive(Debug, Default)]
pub struct ClientMirror {
    local: Option<ConnectionId>,
    entities: BTreeMap<EntityId, MirroredEntity>,
    last_tick: u64,
}

impl ClientMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records which connection this client is, as told by `Welcome`.
    pub fn set_local_connection(&mut self, connection: ConnectionId) {
        self.local = Some(connection);
    }

    pub fn local_connection(&self) -> Option<ConnectionId> {
        self.local
    }

    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }

    pub fn get(&self, id: EntityId) -> Option<&MirroredEntity> {
        self.entities.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MirroredEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn is_owned(&self, entity: &MirroredEntity) -> bool {
        self.local == Some(entity.owner)
    }

    /// The fighter this client controls, once spawned.
    pub fn owned_entity(&self) -> Option<&MirroredEntity> {
        let local = self.local?;
        self.entities.values().find(|e| e.owner == local)
    }

    /// Every fighter controlled by someone else.
    pub fn opponents(&self) -> impl Iterator<Item = &MirroredEntity> {
        let local = self.local;
        self.entities
            .values()
            .filter(move |e| Some(e.owner) != local)
    }

    /// Applies one tick's events in order, reporting each applied event to `sink`.
    pub fn apply_tick<S>(&mut self, tick: u64, events: &[Event], sink: &mut S)
    where
        S: PresentationSink + ?Sized,
    {
        self.last_tick = tick;

        for event in events {
            match self.apply(event) {
                Applied::Updated => {
                    if let Some(view) = self.entities.get(&event.entity) {
                        sink.on_event(view, &event.kind);
                    }
                }
                Applied::Removed(view) => sink.on_event(&view, &event.kind),
                Applied::Ignored => {}
            }
        }
    }

    pub fn apply(&mut self, event: &Event) -> Applied {
        let id = event.entity;

        match &event.kind {
            EventKind::Spawned(snapshot) => {
                self.entities
                    .insert(id, MirroredEntity::from_snapshot(id, snapshot));
                return Applied::Updated;
            }
            EventKind::Despawned => {
                return match self.entities.remove(&id) {
                    Some(removed) => Applied::Removed(removed),
                    None => {
                        debug!("Despawn for unknown {}", id);
                        Applied::Ignored
                    }
                };
            }
            _ => {}
        }

        let local = self.local;
        let Some(entity) = self.entities.get_mut(&id) else {
            debug!("Ignoring {:?} for unknown {}", event.kind, id);
            return Applied::Ignored;
        };
        let owned = local == Some(entity.owner);

        match &event.kind {
            EventKind::PositionChanged { position } => {
                entity.server_position = *position;
                if !owned {
                    entity.position = *position;
                }
            }
            EventKind::FacingChanged { direction } => {
                if !owned {
                    entity.facing = *direction;
                }
            }
            EventKind::GroundedChanged { grounded } => entity.grounded = *grounded,
            EventKind::MovementStateChanged { state } => entity.movement = *state,
            EventKind::AttackTriggered { stage } => entity.attack_stage = *stage,
            EventKind::BlockStarted => entity.blocking = true,
            EventKind::BlockEnded => entity.blocking = false,
            EventKind::HurtTriggered => entity.invincible = true,
            EventKind::InvincibilityEnded => entity.invincible = false,
            EventKind::DeathTriggered => {
                entity.dead = true;
                entity.invincible = false;
            }
            EventKind::HealthChanged { value } => entity.health = Some(*value),
            EventKind::JumpTriggered => {}
            EventKind::Spawned(_) | EventKind::Despawned => {}
        }

        Applied::Updated
    }
}
