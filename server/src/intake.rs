//! Command validation. Each accepted command mutates the entity immediately
//! and queues its replication events; attacks also yield a hit that the next
//! simulation step resolves.

use crate::config::CombatTuning;
use crate::error::Rejection;
use crate::registry::EntityState;
use crate::replication::Outbox;
use duel_shared::{Aabb, Command, EntityId, EventKind, MovementState, Vector2};

/// An accepted attack waiting for hit resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHit {
    pub attacker: EntityId,
    pub damage: f32,
    /// World-space attack box captured when the attack was accepted.
    pub area: Aabb,
}

/// Validates `command` against the entity's current state and applies it.
///
/// The caller has already checked ownership and that the entity is alive.
pub(crate) fn apply_command(
    entity: &mut EntityState,
    command: Command,
    now: f64,
    tuning: &CombatTuning,
    outbox: &mut Outbox,
) -> Result<Option<PendingHit>, Rejection> {
    match command {
        Command::Move { axis } => apply_move(entity, axis, tuning, outbox).map(|_| None),
        Command::StopMove => {
            stop_moving(entity, outbox);
            Ok(None)
        }
        Command::Jump => apply_jump(entity, tuning, outbox).map(|_| None),
        Command::Attack => apply_attack(entity, now, tuning, outbox).map(Some),
        Command::Block { engage } => {
            apply_block(entity, engage, outbox);
            Ok(None)
        }
    }
}

fn apply_move(
    entity: &mut EntityState,
    axis: f32,
    tuning: &CombatTuning,
    outbox: &mut Outbox,
) -> Result<(), Rejection> {
    if !axis.is_finite() {
        return Err(Rejection::InvalidAxis);
    }
    let axis = axis.clamp(-1.0, 1.0);
    if axis == 0.0 {
        stop_moving(entity, outbox);
        return Ok(());
    }
    if entity.blocking {
        return Err(Rejection::Blocking);
    }

    entity.velocity.x = axis * tuning.move_speed;

    let direction = if axis > 0.0 { 1 } else { -1 };
    if direction != entity.facing {
        entity.facing = direction;
        outbox.emit(entity.owner, entity.id, EventKind::FacingChanged { direction });
    }

    set_movement(entity, MovementState::Moving, outbox);
    Ok(())
}

fn stop_moving(entity: &mut EntityState, outbox: &mut Outbox) {
    entity.velocity.x = 0.0;
    set_movement(entity, MovementState::Idle, outbox);
}

fn apply_jump(
    entity: &mut EntityState,
    tuning: &CombatTuning,
    outbox: &mut Outbox,
) -> Result<(), Rejection> {
    if entity.blocking {
        return Err(Rejection::Blocking);
    }
    if !entity.grounded {
        return Err(Rejection::Airborne);
    }

    entity.velocity.y = tuning.jump_force;
    entity.grounded = false;
    outbox.emit(entity.owner, entity.id, EventKind::JumpTriggered);
    outbox.emit(
        entity.owner,
        entity.id,
        EventKind::GroundedChanged { grounded: false },
    );
    Ok(())
}

fn apply_attack(
    entity: &mut EntityState,
    now: f64,
    tuning: &CombatTuning,
    outbox: &mut Outbox,
) -> Result<PendingHit, Rejection> {
    if entity.blocking {
        return Err(Rejection::Blocking);
    }

    let elapsed = entity.last_attack_time.map(|at| now - at);
    if let Some(elapsed) = elapsed {
        if elapsed <= tuning.attack_cooldown as f64 {
            return Err(Rejection::Cooldown);
        }
    }

    let stage = match elapsed {
        Some(elapsed) if elapsed <= tuning.combo_window as f64 => entity.attack_stage % 3 + 1,
        _ => 1,
    };

    entity.attack_stage = stage;
    entity.last_attack_time = Some(now);
    outbox.emit(entity.owner, entity.id, EventKind::AttackTriggered { stage });

    let offset = Vector2::new(entity.facing as f32 * tuning.attack_reach, 0.0);
    Ok(PendingHit {
        attacker: entity.id,
        damage: tuning.damage_for(stage),
        area: Aabb::new(entity.position.add(&offset), tuning.attack_box),
    })
}

fn apply_block(entity: &mut EntityState, engage: bool, outbox: &mut Outbox) {
    if entity.blocking == engage {
        return;
    }

    entity.blocking = engage;
    if engage {
        stop_moving(entity, outbox);
        outbox.emit(entity.owner, entity.id, EventKind::BlockStarted);
    } else {
        outbox.emit(entity.owner, entity.id, EventKind::BlockEnded);
    }
}

/// Emits a movement-state event only when the state actually changes.
pub(crate) fn set_movement(entity: &mut EntityState, state: MovementState, outbox: &mut Outbox) {
    if entity.movement != state {
        entity.movement = state;
        outbox.emit(
            entity.owner,
            entity.id,
            EventKind::MovementStateChanged { state },
        );
    }
}
