//! Collects replication events during a tick and routes them per connection.
//!
//! Nothing is sent while a tick is being computed. The simulation pushes
//! into an `Outbox`; `step` drains it into a `TickReport` once every
//! mutation of the tick is done, so observers never see half a tick.

use duel_shared::{ConnectionId, EntityId, Event, EventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Only(ConnectionId),
    AllExcept(ConnectionId),
}

impl Audience {
    pub fn includes(&self, connection: ConnectionId) -> bool {
        match self {
            Audience::All => true,
            Audience::Only(only) => *only == connection,
            Audience::AllExcept(excluded) => *excluded != connection,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub audience: Audience,
    pub event: Event,
}

#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<Delivery>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an event about an entity owned by `owner`, picking the audience
    /// from the event kind.
    pub fn emit(&mut self, owner: ConnectionId, entity: EntityId, kind: EventKind) {
        let audience = if kind.is_owner_scoped() {
            Audience::Only(owner)
        } else {
            Audience::All
        };
        self.push(audience, entity, kind);
    }

    pub fn push(&mut self, audience: Audience, entity: EntityId, kind: EventKind) {
        self.pending.push(Delivery {
            audience,
            event: Event::new(entity, kind),
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.pending)
    }
}

/// Everything one simulation step produced, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub deliveries: Vec<Delivery>,
}

impl TickReport {
    pub fn events_for(&self, connection: ConnectionId) -> Vec<Event> {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.audience.includes(connection))
            .map(|delivery| delivery.event.clone())
            .collect()
    }

    /// Splits the report into one ordered event list per connection.
    /// Connections with nothing to receive are left out.
    pub fn route(&self, connections: &[ConnectionId]) -> Vec<(ConnectionId, Vec<Event>)> {
        connections
            .iter()
            .map(|connection| (*connection, self.events_for(*connection)))
            .filter(|(_, events)| !events.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }
}
