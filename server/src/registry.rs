//! Authoritative entity records, owned by the simulation.
//!
//! Only code inside this crate can obtain a mutable record; everything that
//! leaves the crate is a shared reference or an `EntitySnapshot`.

use crate::config::CombatTuning;
use crate::error::SpawnError;
use duel_shared::{Aabb, ConnectionId, EntityId, EntitySnapshot, MovementState, Role, Vector2};
use log::info;
use std::collections::BTreeMap;

/// Damage state machine: `Alive <-> Invincible`, either of them `-> Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Invincible,
    Dead,
}

/// Server-side state of one fighter.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub id: EntityId,
    pub owner: ConnectionId,
    pub role: Role,
    pub position: Vector2,
    pub velocity: Vector2,
    /// -1 or +1.
    pub facing: i8,
    pub grounded: bool,
    pub health: f32,
    pub max_health: f32,
    pub blocking: bool,
    pub life: LifeState,
    /// 0 before the first attack, then cycles 1, 2, 3.
    pub attack_stage: u8,
    /// Simulation clock of the last accepted attack.
    pub last_attack_time: Option<f64>,
    pub movement: MovementState,
}

impl EntityState {
    fn new(id: EntityId, owner: ConnectionId, role: Role, tuning: &CombatTuning) -> Self {
        EntityState {
            id,
            owner,
            role,
            position: tuning.spawn_point(role),
            velocity: Vector2::ZERO,
            facing: role.spawn_facing(),
            grounded: false,
            health: tuning.max_health,
            max_health: tuning.max_health,
            blocking: false,
            life: LifeState::Alive,
            attack_stage: 0,
            last_attack_time: None,
            movement: MovementState::Idle,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.life == LifeState::Dead
    }

    pub fn is_invincible(&self) -> bool {
        self.life == LifeState::Invincible
    }

    pub fn body(&self, size: Vector2) -> Aabb {
        Aabb::new(self.position, size)
    }

    /// Placement sent to observers. Health is attached only for the owner.
    pub fn snapshot(&self, include_health: bool) -> EntitySnapshot {
        EntitySnapshot {
            owner: self.owner,
            role: self.role,
            position: self.position,
            facing: self.facing,
            grounded: self.grounded,
            blocking: self.blocking,
            dead: self.is_dead(),
            max_health: self.max_health,
            health: include_health.then_some(self.health),
        }
    }
}

#[derive(Debug)]
pub struct EntityRegistry {
    entities: BTreeMap<EntityId, EntityState>,
    next_entity_id: u32,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_entity_id: 1,
        }
    }

    /// Creates the single entity a connection may control.
    pub(crate) fn spawn(
        &mut self,
        owner: ConnectionId,
        role: Role,
        tuning: &CombatTuning,
    ) -> Result<EntityId, SpawnError> {
        if let Some(existing) = self.entity_of(owner) {
            return Err(SpawnError::AlreadySpawned(owner, existing));
        }

        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;

        let entity = EntityState::new(id, owner, role, tuning);
        info!(
            "Spawned {} for {} as {:?} at ({}, {})",
            id, owner, role, entity.position.x, entity.position.y
        );
        self.entities.insert(id, entity);
        Ok(id)
    }

    pub(crate) fn despawn(&mut self, id: EntityId) -> Option<EntityState> {
        let removed = self.entities.remove(&id);
        if let Some(entity) = &removed {
            info!("Despawned {} (owner {})", entity.id, entity.owner);
        }
        removed
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityState> {
        self.entities.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityState> {
        self.entities.get_mut(&id)
    }

    pub fn entity_of(&self, owner: ConnectionId) -> Option<EntityId> {
        self.entities
            .values()
            .find(|entity| entity.owner == owner)
            .map(|entity| entity.id)
    }

    /// Iterates in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut EntityState> {
        self.entities.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
