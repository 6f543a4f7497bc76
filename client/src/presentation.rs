//! The seam between replicated state and whatever shows it to a player.

use crate::mirror::MirroredEntity;
use duel_shared::EventKind;
use log::{debug, info};

/// Receives every event the mirror applied, with a read-only view of the
/// entity after the change. For `Despawned` the view is the entity's last state.
pub trait PresentationSink {
    fn on_event(&mut self, view: &MirroredEntity, kind: &EventKind);
}

/// Headless presentation: writes gameplay moments to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl PresentationSink for LogSink {
    fn on_event(&mut self, view: &MirroredEntity, kind: &EventKind) {
        match kind {
            EventKind::Spawned(_) => info!(
                "{} ({:?}) entered at ({:.2}, {:.2})",
                view.id, view.role, view.position.x, view.position.y
            ),
            EventKind::Despawned => info!("{} left the arena", view.id),
            EventKind::AttackTriggered { stage } => info!("{} attacks (stage {})", view.id, stage),
            EventKind::HurtTriggered => info!("{} is hit", view.id),
            EventKind::HealthChanged { value } => {
                info!("Health {:.0}/{:.0}", value, view.max_health)
            }
            EventKind::DeathTriggered => info!("{} is down", view.id),
            EventKind::BlockStarted => info!("{} blocks", view.id),
            EventKind::BlockEnded => info!("{} lowers guard", view.id),
            EventKind::PositionChanged { position } => {
                debug!("{} at ({:.2}, {:.2})", view.id, position.x, position.y)
            }
            other => debug!("{} {:?}", view.id, other),
        }
    }
}
