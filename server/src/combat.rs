//! Damage resolution and the `Alive -> Invincible -> Alive`, `-> Dead`
//! state machine.

use crate::config::CombatTuning;
use crate::intake::set_movement;
use crate::registry::{EntityState, LifeState};
use crate::replication::Outbox;
use crate::timers::TimerQueue;
use duel_shared::{EventKind, MovementState, Vector2};
use log::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Target was blocking, invincible, dead or the amount was not a
    /// positive number. Nothing changed.
    Ignored,
    Hurt { health: f32 },
    Killed,
}

/// Applies `amount` to `target`. Emits, in order: the owner-scoped health
/// update, the hurt trigger and, on a killing blow, the death trigger.
pub(crate) fn apply_damage(
    target: &mut EntityState,
    amount: f32,
    now: f64,
    tuning: &CombatTuning,
    timers: &mut TimerQueue,
    outbox: &mut Outbox,
) -> DamageOutcome {
    if target.blocking || target.is_invincible() || target.is_dead() || target.health <= 0.0 {
        return DamageOutcome::Ignored;
    }
    if !amount.is_finite() || amount <= 0.0 {
        return DamageOutcome::Ignored;
    }

    target.health = (target.health - amount).clamp(0.0, target.max_health);

    outbox.emit(
        target.owner,
        target.id,
        EventKind::HealthChanged {
            value: target.health,
        },
    );
    outbox.emit(target.owner, target.id, EventKind::HurtTriggered);

    if target.health == 0.0 {
        target.life = LifeState::Dead;
        target.velocity = Vector2::ZERO;
        timers.cancel(target.id);
        set_movement(target, MovementState::Idle, outbox);
        outbox.emit(target.owner, target.id, EventKind::DeathTriggered);
        info!("{} (owner {}) died", target.id, target.owner);
        DamageOutcome::Killed
    } else {
        target.life = LifeState::Invincible;
        timers.schedule(target.id, now + tuning.invincibility_duration as f64);
        DamageOutcome::Hurt {
            health: target.health,
        }
    }
}

/// Ends an invincibility window. Dead or already vulnerable entities are left
/// untouched.
pub(crate) fn end_invincibility(target: &mut EntityState, outbox: &mut Outbox) {
    if target.life == LifeState::Invincible {
        target.life = LifeState::Alive;
        outbox.emit(target.owner, target.id, EventKind::InvincibilityEnded);
    }
}
