//! Deadlines keyed by entity, fired by the simulation clock.

use duel_shared::EntityId;
use std::collections::HashMap;

/// At most one pending deadline per entity. Scheduling again replaces the
/// old deadline; cancelling a missing entry is a no-op.
#[derive(Debug, Default)]
pub struct TimerQueue {
    deadlines: HashMap<EntityId, f64>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, entity: EntityId, at: f64) {
        self.deadlines.insert(entity, at);
    }

    pub fn cancel(&mut self, entity: EntityId) -> bool {
        self.deadlines.remove(&entity).is_some()
    }

    pub fn deadline(&self, entity: EntityId) -> Option<f64> {
        self.deadlines.get(&entity).copied()
    }

    /// Removes and returns every entity whose deadline is at or before `now`,
    /// earliest first.
    pub fn pop_expired(&mut self, now: f64) -> Vec<EntityId> {
        let mut expired: Vec<(f64, EntityId)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(entity, at)| (*at, *entity))
            .collect();

        expired.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (_, entity) in &expired {
            self.deadlines.remove(entity);
        }

        expired.into_iter().map(|(_, entity)| entity).collect()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
