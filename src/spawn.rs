//! Staggered reveal of entities into the active working set.

use crate::entity::EntityStore;
use crate::layout::LayoutIntegrator;

/// Promotes pending entities to active, one per `delay_ms`, in dataset order.
#[derive(Debug, Clone)]
pub struct SpawnScheduler {
    delay_ms: f64,
    max_active: usize,
    next: usize,
    last_spawn: Option<f64>,
}

impl SpawnScheduler {
    pub fn new(delay_ms: f32, max_active: usize) -> Self {
        Self {
            delay_ms: delay_ms as f64,
            max_active,
            next: 0,
            last_spawn: None,
        }
    }

    pub fn set_delay(&mut self, delay_ms: f32) {
        self.delay_ms = delay_ms as f64;
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Number of entities promoted since the last reset.
    pub fn spawned(&self) -> usize {
        self.next
    }

    /// Called once per frame. Promotes at most one entity and reheats the
    /// layout when it does. Returns the promoted index.
    pub fn tick(
        &mut self,
        timestamp_ms: f64,
        store: &mut EntityStore,
        layout: &mut LayoutIntegrator,
    ) -> Option<usize> {
        let cap = self.max_active.min(store.len());
        if self.next >= cap {
            return None;
        }
        if let Some(last) = self.last_spawn {
            if timestamp_ms - last <= self.delay_ms {
                return None;
            }
        }

        let index = self.next;
        self.next += 1;
        self.last_spawn = Some(timestamp_ms);
        if store.activate(index) {
            layout.reheat(1.0);
            tracing::debug!(index, at_ms = timestamp_ms, "spawned entity");
            Some(index)
        } else {
            None
        }
    }

    /// Start over from the first entity. The caller returns the store to
    /// pending.
    pub fn reset(&mut self) {
        self.next = 0;
        self.last_spawn = None;
    }
}
