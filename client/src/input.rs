//! Turns sampled control state into discrete commands with edge detection

use duel_shared::Command;

/// One frame of player controls
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlState {
    /// Horizontal intent in [-1, 1]
    pub axis: f32,
    pub jump: bool,
    pub attack: bool,
    pub block: bool,
}

impl ControlState {
    fn sanitized(mut self) -> Self {
        self.axis = if self.axis.is_finite() {
            self.axis.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

/// Remembers the previous frame so only transitions become commands
#[derive(Debug, Default)]
pub struct InputSampler {
    previous: ControlState,
}

impl InputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands for the transition from the previous frame to `current`.
    ///
    /// Movement changes are held back while blocking, since the server refuses
    /// them; releasing the block resends the held direction.
    pub fn sample(&mut self, current: ControlState) -> Vec<Command> {
        let current = current.sanitized();
        let previous = self.previous;
        let mut commands = Vec::new();

        if current.block && !previous.block {
            commands.push(Command::Block { engage: true });
        }

        if previous.block && !current.block {
            commands.push(Command::Block { engage: false });
            if current.axis != 0.0 {
                commands.push(Command::Move { axis: current.axis });
            }
        } else if !current.block && current.axis != previous.axis {
            if current.axis == 0.0 {
                commands.push(Command::StopMove);
            } else {
                commands.push(Command::Move { axis: current.axis });
            }
        }

        if current.jump && !previous.jump {
            commands.push(Command::Jump);
        }
        if current.attack && !previous.attack {
            commands.push(Command::Attack);
        }

        self.previous = current;
        commands
    }

    pub fn previous(&self) -> ControlState {
        self.previous
    }
}
