//! Physics provider seam. The simulation hands each body to a provider once
//! per tick and only consumes the resulting velocity, position and grounded
//! contact.

use crate::config::CombatTuning;
use duel_shared::Vector2;

///A dynamic body as seen by the physics provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    ///The positional center of the body.
    pub position: Vector2,
    pub velocity: Vector2,
    pub size: Vector2,
    pub grounded: bool,
}

///Contact signals reported after integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub grounded: bool,
}

pub trait PhysicsProvider: Send {
    ///Integrates velocity into position for one step and reports contacts.
    fn integrate(&mut self, body: &mut Body, dt: f32) -> Contact;
}

///Flat floor between two walls with constant gravity.
#[derive(Debug, Clone, Copy)]
pub struct ArenaPhysics {
    pub gravity: f32,
    pub floor_y: f32,
    pub half_width: f32,
}

impl ArenaPhysics {
    pub fn from_tuning(tuning: &CombatTuning) -> Self {
        ArenaPhysics {
            gravity: tuning.gravity,
            floor_y: tuning.floor_y,
            half_width: tuning.arena_half_width,
        }
    }
}

impl PhysicsProvider for ArenaPhysics {
    fn integrate(&mut self, body: &mut Body, dt: f32) -> Contact {
        // Resting bodies skip gravity so they do not sink into the floor
        if !body.grounded || body.velocity.y > 0.0 {
            body.velocity.y -= self.gravity * dt;
        }

        body.position = body.position.add(&body.velocity.scale(dt));

        let min_x = -self.half_width + body.size.x / 2.0;
        let max_x = self.half_width - body.size.x / 2.0;
        body.position.x = body.position.x.clamp(min_x, max_x);

        let bottom = body.position.y - body.size.y / 2.0;
        let grounded = bottom <= self.floor_y && body.velocity.y <= 0.0;
        if grounded {
            body.position.y = self.floor_y + body.size.y / 2.0;
            body.velocity.y = 0.0;
        }

        body.grounded = grounded;
        Contact { grounded }
    }
}
