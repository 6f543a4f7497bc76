//! Headless controller for demos and soak runs.
//!
//! Walks toward the nearest living opponent, swings when in reach and now and
//! then raises a guard for a random stretch. Seeded, so a run can be replayed.

use crate::input::ControlState;
use crate::mirror::{ClientMirror, MirroredEntity};
use duel_shared::ATTACK_REACH;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Horizontal distance at which the autopilot stops walking and swings.
const ENGAGE_DISTANCE: f32 = ATTACK_REACH;

pub struct Autopilot {
    rng: StdRng,
    /// Per-frame chance of starting a block while engaged
    block_chance: f64,
    /// Per-frame chance of a jump while closing distance
    jump_chance: f64,
    block_frames: u32,
    /// Last direction we walked, which is the direction the server has us facing
    facing: Option<i8>,
    attack_held: bool,
}

impl Autopilot {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            block_chance: 0.02,
            jump_chance: 0.005,
            block_frames: 0,
            facing: None,
            attack_held: false,
        }
    }

    pub fn with_chances(mut self, block_chance: f64, jump_chance: f64) -> Self {
        self.block_chance = block_chance.clamp(0.0, 1.0);
        self.jump_chance = jump_chance.clamp(0.0, 1.0);
        self
    }

    /// Decides this frame's controls from the mirrored arena.
    pub fn control(&mut self, mirror: &ClientMirror) -> ControlState {
        let Some(me) = mirror.owned_entity() else {
            return ControlState::default();
        };
        if me.dead {
            return ControlState::default();
        }
        let facing = *self.facing.get_or_insert(me.facing);

        let Some(target) = nearest_opponent(mirror, me) else {
            self.block_frames = 0;
            return ControlState::default();
        };

        if self.block_frames > 0 {
            self.block_frames -= 1;
            return ControlState {
                block: true,
                ..ControlState::default()
            };
        }

        let dx = target.server_position.x - me.server_position.x;
        let direction: i8 = if dx >= 0.0 { 1 } else { -1 };

        if dx.abs() > ENGAGE_DISTANCE {
            self.facing = Some(direction);
            self.attack_held = false;
            return ControlState {
                axis: direction as f32,
                jump: self.rng.gen_bool(self.jump_chance),
                ..ControlState::default()
            };
        }

        if facing != direction {
            // One frame of movement turns us around
            self.facing = Some(direction);
            return ControlState {
                axis: direction as f32,
                ..ControlState::default()
            };
        }

        if self.rng.gen_bool(self.block_chance) {
            self.block_frames = self.rng.gen_range(10..40);
            self.attack_held = false;
            return ControlState {
                block: true,
                ..ControlState::default()
            };
        }

        // Alternate press and release so every other frame is a fresh swing
        self.attack_held = !self.attack_held;
        ControlState {
            attack: self.attack_held,
            ..ControlState::default()
        }
    }
}

fn nearest_opponent<'a>(
    mirror: &'a ClientMirror,
    me: &MirroredEntity,
) -> Option<&'a MirroredEntity> {
    mirror
        .opponents()
        .filter(|e| !e.dead)
        .min_by(|a, b| {
            let da = a.server_position.distance(&me.server_position);
            let db = b.server_position.distance(&me.server_position);
            da.total_cmp(&db)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_shared::{ConnectionId, EntityId, EntitySnapshot, Event, EventKind, Role, Vector2};

    fn mirror_with(me_x: f32, them_x: f32) -> ClientMirror {
        let mut mirror = ClientMirror::new();
        mirror.set_local_connection(ConnectionId(1));
        for (id, owner, role, x) in [
            (1, 1, Role::Host, me_x),
            (2, 2, Role::Challenger, them_x),
        ] {
            mirror.apply(&Event::new(
                EntityId(id),
                EventKind::Spawned(EntitySnapshot {
                    owner: ConnectionId(owner),
                    role,
                    position: Vector2::new(x, 1.0),
                    facing: role.spawn_facing(),
                    grounded: true,
                    blocking: false,
                    dead: false,
                    max_health: 100.0,
                    health: None,
                }),
            ));
        }
        mirror
    }

    fn calm(seed: u64) -> Autopilot {
        Autopilot::new(seed).with_chances(0.0, 0.0)
    }

    #[test]
    fn test_idle_before_spawn() {
        let mut pilot = calm(1);
        assert_eq!(pilot.control(&ClientMirror::new()), ControlState::default());
    }

    #[test]
    fn test_walks_toward_opponent() {
        let mut pilot = calm(1);

        let controls = pilot.control(&mirror_with(-7.5, 7.5));
        assert_eq!(controls.axis, 1.0);
        assert!(!controls.attack);

        let mut pilot = calm(1);
        let controls = pilot.control(&mirror_with(5.0, -5.0));
        assert_eq!(controls.axis, -1.0);
    }

    #[test]
    fn test_attacks_in_reach() {
        let mut pilot = calm(7);
        let mirror = mirror_with(-0.5, 0.5);

        let presses: Vec<bool> = (0..4).map(|_| pilot.control(&mirror).attack).collect();
        assert_eq!(presses, vec![true, false, true, false]);
    }

    #[test]
    fn test_turns_before_swinging() {
        let mut pilot = calm(3);
        // Host spawns facing +1 but the opponent is behind
        let mirror = mirror_with(0.5, -0.5);

        let first = pilot.control(&mirror);
        assert_eq!(first.axis, -1.0);
        assert!(!first.attack);

        let second = pilot.control(&mirror);
        assert_eq!(second.axis, 0.0);
        assert!(second.attack);
    }

    #[test]
    fn test_guard_lasts_several_frames() {
        let mut pilot = Autopilot::new(11).with_chances(1.0, 0.0);
        let mirror = mirror_with(-0.5, 0.5);

        let frames: Vec<ControlState> = (0..10).map(|_| pilot.control(&mirror)).collect();
        assert!(frames.iter().all(|c| c.block && !c.attack));
    }

    #[test]
    fn test_stands_still_when_dead() {
        let mut pilot = calm(5);
        let mut mirror = mirror_with(-0.5, 0.5);
        mirror.apply(&Event::new(EntityId(1), EventKind::DeathTriggered));

        assert_eq!(pilot.control(&mirror), ControlState::default());
    }

    #[test]
    fn test_ignores_dead_opponents() {
        let mut pilot = calm(5);
        let mut mirror = mirror_with(-0.5, 0.5);
        mirror.apply(&Event::new(EntityId(2), EventKind::DeathTriggered));

        assert_eq!(pilot.control(&mirror), ControlState::default());
    }
}
