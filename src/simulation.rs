//! CPU side of the engine: entity state, layout, spawning and trails.
//!
//! [`Simulation`] owns everything the render pipeline reads each frame. One
//! call to [`Simulation::step`] is one logical tick: spawn, integrate,
//! sample trails.

use glam::{Vec2, Vec3};

use crate::entity::{Entity, EntityRecord, EntityStore};
use crate::layout::LayoutIntegrator;
use crate::palette::CategoryPalette;
use crate::params::{ParamChange, ParamEffect, Params};
use crate::spawn::SpawnScheduler;
use crate::trail::{TrailAccumulator, TrailPoint};

/// Simulation state for one session.
#[derive(Debug, Clone)]
pub struct Simulation {
    params: Params,
    palette: CategoryPalette,
    store: EntityStore,
    layout: LayoutIntegrator,
    spawn: SpawnScheduler,
    trails: TrailAccumulator,
    tick_count: u64,
    extent: Vec2,
}

impl Simulation {
    /// Create an empty simulation over a canvas of `extent` pixels.
    pub fn new(params: Params, extent: Vec2) -> Self {
        Self::with_palette(params, extent, CategoryPalette::default())
    }

    pub fn with_palette(params: Params, extent: Vec2, palette: CategoryPalette) -> Self {
        let params = params.clamped();
        Self {
            layout: LayoutIntegrator::new(&params, extent),
            spawn: SpawnScheduler::new(params.spawn_delay_ms, params.max_active),
            store: EntityStore::default(),
            trails: TrailAccumulator::new(),
            tick_count: 0,
            palette,
            params,
            extent,
        }
    }

    /// Replace the dataset. All entities start pending; spawning starts over.
    pub fn set_data(&mut self, records: &[EntityRecord]) {
        self.store =
            EntityStore::from_records(records, &mut self.palette, self.extent, self.params.seed);
        self.layout.clear();
        self.layout.add_entities(self.store.as_slice());
        self.spawn.reset();
        self.trails.clear();
        self.tick_count = 0;
        tracing::info!(
            entities = self.store.len(),
            categories = self.store.categories().len(),
            "dataset loaded"
        );
    }

    /// Advance one frame at `timestamp_ms`.
    pub fn step(&mut self, timestamp_ms: f64) {
        self.spawn
            .tick(timestamp_ms, &mut self.store, &mut self.layout);
        self.layout.tick(self.store.as_mut_slice());
        self.tick_count += 1;
        self.trails
            .tick(self.tick_count, self.store.as_slice(), &self.params.trail);
    }

    /// Store a parameter change and apply its side effect.
    pub fn apply(&mut self, change: ParamChange) {
        let stored = self.params.set(change);
        if stored != change {
            tracing::warn!(requested = ?change, applied = ?stored, "parameter clamped");
        } else {
            tracing::debug!(?change, "parameter changed");
        }
        match stored.effect() {
            ParamEffect::RenderOnly => {}
            ParamEffect::Spawn => self.spawn.set_delay(self.params.spawn_delay_ms),
            ParamEffect::Forces | ParamEffect::Anchors => {
                self.layout.configure(&self.params);
                self.layout.reheat(1.0);
            }
            ParamEffect::Radius => {
                self.store.set_radius(self.params.node_size / 2.0);
                self.layout.reheat(1.0);
            }
        }
    }

    /// Send every entity back to pending and start spawning from the first.
    pub fn restart(&mut self) {
        self.spawn.reset();
        self.store.reset_spawn();
        self.trails.clear();
        self.layout.reheat(1.0);
        tracing::info!("animation restarted");
    }

    /// Clear the canvas of nodes and trails. Spawning carries on from the
    /// next entity in dataset order.
    pub fn remove_all(&mut self) {
        let removed = self.store.remove_active();
        self.trails.clear();
        self.layout.reheat(1.0);
        tracing::info!(removed, next = self.spawn.spawned(), "active entities removed");
    }

    /// Recolor a category. Entities with a dataset color keep it.
    pub fn set_category_color(&mut self, category: &str, color: Vec3) -> usize {
        self.palette.set(category, color);
        self.store.recolor_category(category, color)
    }

    /// The canvas changed size. Anchors and the boundary follow.
    pub fn resize(&mut self, extent: Vec2) {
        self.extent = extent;
        self.layout.set_extent(extent);
        self.layout.reheat(1.0);
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn layout(&self) -> &LayoutIntegrator {
        &self.layout
    }

    pub fn palette(&self) -> &CategoryPalette {
        &self.palette
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.store.find(id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Entity> + Clone {
        self.store.active()
    }

    pub fn trail_points(&self) -> impl ExactSizeIterator<Item = &TrailPoint> + Clone {
        self.trails.points()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn extent(&self) -> Vec2 {
        self.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<EntityRecord> {
        (0..n)
            .map(|i| EntityRecord {
                id: format!("e{i}"),
                name: format!("Entity {i}"),
                supertype: Some(["a", "b", "c"][i % 3].to_string()),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_step_spawns_and_samples() {
        let mut sim = Simulation::new(Params::default(), Vec2::new(400.0, 400.0));
        sim.set_data(&records(5));
        for frame in 0..3 {
            sim.step(frame as f64 * 16.0);
        }
        assert_eq!(sim.active().count(), 1);
        // tick 3 samples the single active entity
        assert_eq!(sim.trail_points().len(), 1);
    }

    #[test]
    fn test_render_only_change_does_not_reheat() {
        let mut sim = Simulation::new(Params::default(), Vec2::new(400.0, 400.0));
        sim.set_data(&records(2));
        for frame in 0..200 {
            sim.step(frame as f64);
        }
        let alpha = sim.layout().alpha();
        sim.apply(ParamChange::RotateG(1.0));
        assert_eq!(sim.layout().alpha(), alpha);
        sim.apply(ParamChange::CollideRadius(4.0));
        assert_eq!(sim.layout().alpha(), 1.0);
    }

    #[test]
    fn test_node_size_sets_radius() {
        let mut sim = Simulation::new(Params::default(), Vec2::new(400.0, 400.0));
        sim.set_data(&records(3));
        sim.apply(ParamChange::NodeSize(30.0));
        assert!(sim.store().iter().all(|e| e.radius == 15.0));
    }

    #[test]
    fn test_restart_returns_to_pending() {
        let mut sim = Simulation::new(Params::default(), Vec2::new(400.0, 400.0));
        sim.set_data(&records(3));
        for frame in 0..100 {
            sim.step(frame as f64 * 16.0);
        }
        assert_eq!(sim.active().count(), 3);
        sim.restart();
        assert_eq!(sim.active().count(), 0);
        assert_eq!(sim.trail_points().len(), 0);
        sim.step(5000.0);
        assert_eq!(sim.active().next().map(|e| e.id.as_str()), Some("e0"));
    }

    #[test]
    fn test_set_category_color() {
        let mut sim = Simulation::new(Params::default(), Vec2::new(400.0, 400.0));
        sim.set_data(&records(6));
        let changed = sim.set_category_color("b", Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(changed, 2);
        assert_eq!(sim.palette().get("b"), Some(Vec3::new(0.0, 0.0, 1.0)));
        assert_eq!(sim.entity("e1").map(|e| e.color), Some(Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_empty_dataset_steps() {
        let mut sim = Simulation::new(Params::default(), Vec2::new(400.0, 400.0));
        for frame in 0..10 {
            sim.step(frame as f64 * 16.0);
        }
        assert_eq!(sim.active().count(), 0);
    }
}
