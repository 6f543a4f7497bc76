//! The authoritative simulation: the only place combat state changes.
//!
//! `Simulation` is owned by the server loop and driven from a single task, so
//! commands for an entity apply in submission order and hits against a target
//! are resolved one at a time.

use crate::combat::{self, DamageOutcome};
use crate::config::CombatTuning;
use crate::error::{CommandError, Rejection, SpawnError};
use crate::intake::{self, PendingHit};
use crate::physics::{ArenaPhysics, Body, PhysicsProvider};
use crate::registry::{EntityRegistry, EntityState};
use crate::replication::{Audience, Outbox, TickReport};
use crate::timers::TimerQueue;
use duel_shared::{Command, ConnectionId, EntityId, EventKind, MovementState, Role};
use log::{debug, warn};

/// Position changes smaller than this are not replicated.
const POSITION_EPSILON: f32 = 1e-4;

pub struct Simulation {
    tick: u64,
    /// Seconds of simulated time since start.
    clock: f64,
    tuning: CombatTuning,
    registry: EntityRegistry,
    timers: TimerQueue,
    pending_hits: Vec<PendingHit>,
    outbox: Outbox,
    physics: Box<dyn PhysicsProvider>,
}

impl Simulation {
    pub fn new(tuning: CombatTuning) -> Self {
        let physics = Box::new(ArenaPhysics::from_tuning(&tuning));
        Self::with_physics(tuning, physics)
    }

    pub fn with_physics(tuning: CombatTuning, physics: Box<dyn PhysicsProvider>) -> Self {
        Self {
            tick: 0,
            clock: 0.0,
            tuning,
            registry: EntityRegistry::new(),
            timers: TimerQueue::new(),
            pending_hits: Vec::new(),
            outbox: Outbox::new(),
            physics,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn tuning(&self) -> &CombatTuning {
        &self.tuning
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityState> {
        self.registry.get(id)
    }

    /// Creates the entity for `owner` and queues its placement.
    ///
    /// The owner receives its own snapshot with health attached, everyone
    /// else receives it without, and the owner is caught up on every entity
    /// that already exists.
    pub fn spawn(&mut self, owner: ConnectionId, role: Role) -> Result<EntityId, SpawnError> {
        let id = self.registry.spawn(owner, role, &self.tuning)?;

        if let Some(entity) = self.registry.get(id) {
            self.outbox.push(
                Audience::Only(owner),
                id,
                EventKind::Spawned(entity.snapshot(true)),
            );
            self.outbox.push(
                Audience::AllExcept(owner),
                id,
                EventKind::Spawned(entity.snapshot(false)),
            );
        }

        for other in self.registry.iter().filter(|e| e.id != id) {
            self.outbox.push(
                Audience::Only(owner),
                other.id,
                EventKind::Spawned(other.snapshot(false)),
            );
        }

        Ok(id)
    }

    /// Removes an entity. Its pending timer and queued hits are dropped.
    pub fn despawn(&mut self, id: EntityId) -> Option<EntityState> {
        let removed = self.registry.despawn(id)?;
        self.timers.cancel(id);
        self.pending_hits.retain(|hit| hit.attacker != id);
        self.outbox.push(Audience::All, id, EventKind::Despawned);
        Some(removed)
    }

    pub fn despawn_owned_by(&mut self, owner: ConnectionId) -> Option<EntityId> {
        let id = self.registry.entity_of(owner)?;
        self.despawn(id).map(|entity| entity.id)
    }

    /// Validates and applies a command from `origin` against `entity`.
    pub fn submit(
        &mut self,
        origin: ConnectionId,
        entity: EntityId,
        command: Command,
    ) -> Result<(), CommandError> {
        let state = self
            .registry
            .get_mut(entity)
            .ok_or(CommandError::UnknownEntity(entity))?;

        if state.owner != origin {
            return Err(Rejection::NotOwner.into());
        }
        if state.is_dead() {
            return Err(Rejection::Dead.into());
        }

        let hit = intake::apply_command(state, command, self.clock, &self.tuning, &mut self.outbox)?;
        if let Some(hit) = hit {
            self.pending_hits.push(hit);
        }
        Ok(())
    }

    /// Applies damage to `target`. Unknown targets are a logged no-op.
    pub fn apply_damage(&mut self, target: EntityId, amount: f32) -> DamageOutcome {
        match self.registry.get_mut(target) {
            Some(state) => combat::apply_damage(
                state,
                amount,
                self.clock,
                &self.tuning,
                &mut self.timers,
                &mut self.outbox,
            ),
            None => {
                warn!("Damage against unknown {}", target);
                DamageOutcome::Ignored
            }
        }
    }

    /// Advances the simulation by `dt` seconds and returns every event the
    /// tick produced, including those queued by commands since the last tick.
    pub fn step(&mut self, dt: f32) -> TickReport {
        self.tick += 1;
        self.clock += dt as f64;

        self.expire_invincibility();
        self.resolve_hits();
        self.integrate(dt);

        TickReport {
            tick: self.tick,
            deliveries: self.outbox.drain(),
        }
    }

    fn expire_invincibility(&mut self) {
        for id in self.timers.pop_expired(self.clock) {
            if let Some(state) = self.registry.get_mut(id) {
                combat::end_invincibility(state, &mut self.outbox);
            }
        }
    }

    fn resolve_hits(&mut self) {
        let hits = std::mem::take(&mut self.pending_hits);
        let body_size = self.tuning.body_size;

        for hit in hits {
            let attacker_alive = self
                .registry
                .get(hit.attacker)
                .is_some_and(|attacker| !attacker.is_dead());
            if !attacker_alive {
                debug!("Dropping hit from {}: attacker gone or dead", hit.attacker);
                continue;
            }

            let targets: Vec<EntityId> = self
                .registry
                .iter()
                .filter(|entity| entity.id != hit.attacker)
                .filter(|entity| entity.body(body_size).overlaps(&hit.area))
                .map(|entity| entity.id)
                .collect();

            for target in targets {
                let outcome = self.apply_damage(target, hit.damage);
                debug!("{} hit {} for {}: {:?}", hit.attacker, target, hit.damage, outcome);
            }
        }
    }

    fn integrate(&mut self, dt: f32) {
        let body_size = self.tuning.body_size;

        for entity in self.registry.iter_mut() {
            let before = entity.position;
            let was_grounded = entity.grounded;

            let mut body = Body {
                position: entity.position,
                velocity: entity.velocity,
                size: body_size,
                grounded: entity.grounded,
            };
            let contact = self.physics.integrate(&mut body, dt);

            entity.position = body.position;
            entity.velocity = body.velocity;
            entity.grounded = contact.grounded;

            if before.distance(&entity.position) > POSITION_EPSILON {
                self.outbox.emit(
                    entity.owner,
                    entity.id,
                    EventKind::PositionChanged {
                        position: entity.position,
                    },
                );
            }

            if was_grounded != entity.grounded {
                self.outbox.emit(
                    entity.owner,
                    entity.id,
                    EventKind::GroundedChanged {
                        grounded: entity.grounded,
                    },
                );
                if entity.grounded && entity.velocity.x == 0.0 {
                    intake::set_movement(entity, MovementState::Idle, &mut self.outbox);
                }
            }
        }
    }
}
