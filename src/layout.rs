//! Force-directed layout integrator.
//!
//! Advances active entity positions one tick at a time. Three forces add to
//! velocity: centering, pairwise collision, and category grouping. Velocity
//! is then damped, integrated into position, and the position is clamped to
//! the canvas margin.
//!
//! A temperature `alpha` scales the centering and grouping forces. It starts
//! at 1 on [`LayoutIntegrator::reheat`] and decays geometrically toward a
//! floor; ticking continues at the floor.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::entity::Entity;
use crate::params::Params;

/// Fraction of alpha lost per tick.
pub const ALPHA_DECAY: f32 = 0.005;
/// Alpha never drops below this.
pub const ALPHA_MIN: f32 = 0.005;

/// Force configuration, applied with [`LayoutIntegrator::set_force`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Force {
    /// Pull toward the canvas center.
    Center { strength: f32 },
    /// Keep `radius + margin` circles from overlapping.
    Collide { margin: f32, strength: f32 },
    /// Pull toward the entity's category anchor.
    Grouping {
        enabled: bool,
        strength: f32,
        radius: f32,
    },
}

/// Target points for the grouping force, one per category, evenly spaced on
/// a circle around the canvas center.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryAnchors {
    labels: Vec<String>,
    points: Vec<Vec2>,
}

impl CategoryAnchors {
    /// Anchor for category `i` of `count` around `center`.
    pub fn anchor_point(center: Vec2, radius: f32, i: usize, count: usize) -> Vec2 {
        let angle = TAU * i as f32 / count.max(1) as f32;
        center + Vec2::new(angle.cos(), angle.sin()) * radius
    }

    fn register(&mut self, label: &str) -> bool {
        if self.labels.iter().any(|l| l == label) {
            return false;
        }
        self.labels.push(label.to_string());
        true
    }

    fn recompute(&mut self, center: Vec2, radius: f32) {
        let count = self.labels.len();
        self.points = (0..count)
            .map(|i| Self::anchor_point(center, radius, i, count))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<Vec2> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.points[i])
    }

    fn by_index(&self, index: usize) -> Option<Vec2> {
        self.points.get(index).copied()
    }
}

/// Steps active entities through the force model.
#[derive(Debug, Clone)]
pub struct LayoutIntegrator {
    alpha: f32,
    extent: Vec2,
    margin: f32,
    damping: f32,
    center_strength: f32,
    collide_margin: f32,
    collide_strength: f32,
    grouping: bool,
    grouping_strength: f32,
    grouping_radius: f32,
    anchors: CategoryAnchors,
    rng: SmallRng,
}

impl LayoutIntegrator {
    pub fn new(params: &Params, extent: Vec2) -> Self {
        let mut integrator = Self {
            alpha: 1.0,
            extent,
            margin: params.margin,
            damping: params.damping,
            center_strength: params.center_strength,
            collide_margin: params.collide_radius,
            collide_strength: params.collide_strength,
            grouping: params.grouping,
            grouping_strength: params.grouping_strength,
            grouping_radius: params.grouping_radius,
            anchors: CategoryAnchors::default(),
            rng: SmallRng::seed_from_u64(params.seed),
        };
        integrator.anchors.recompute(integrator.center(), integrator.grouping_radius);
        integrator
    }

    /// Re-read every force setting from `params` without touching alpha.
    pub fn configure(&mut self, params: &Params) {
        self.damping = params.damping;
        self.margin = params.margin;
        self.set_force(Force::Center {
            strength: params.center_strength,
        });
        self.set_force(Force::Collide {
            margin: params.collide_radius,
            strength: params.collide_strength,
        });
        self.set_force(Force::Grouping {
            enabled: params.grouping,
            strength: params.grouping_strength,
            radius: params.grouping_radius,
        });
    }

    /// Register the categories of `entities` for grouping and reheat.
    ///
    /// Categories are anchored in order of first appearance, so feeding the
    /// store slice keeps anchor indices equal to `Entity::category_index`.
    pub fn add_entities(&mut self, entities: &[Entity]) {
        let mut changed = false;
        for entity in entities {
            changed |= self.anchors.register(&entity.category);
        }
        if changed {
            self.anchors.recompute(self.center(), self.grouping_radius);
            tracing::debug!(categories = self.anchors.len(), "category anchors recomputed");
        }
        self.reheat(1.0);
    }

    /// Forget all categories.
    pub fn clear(&mut self) {
        self.anchors = CategoryAnchors::default();
    }

    pub fn set_force(&mut self, force: Force) {
        match force {
            Force::Center { strength } => self.center_strength = strength,
            Force::Collide { margin, strength } => {
                self.collide_margin = margin;
                self.collide_strength = strength;
            }
            Force::Grouping {
                enabled,
                strength,
                radius,
            } => {
                self.grouping = enabled;
                self.grouping_strength = strength;
                if radius != self.grouping_radius {
                    self.grouping_radius = radius;
                    self.anchors.recompute(self.center(), radius);
                }
            }
        }
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping;
    }

    /// Resize the canvas. Anchors follow the new center.
    pub fn set_extent(&mut self, extent: Vec2) {
        self.extent = extent;
        self.anchors.recompute(self.center(), self.grouping_radius);
    }

    pub fn reheat(&mut self, alpha: f32) {
        self.alpha = if alpha.is_finite() {
            alpha.max(ALPHA_MIN)
        } else {
            1.0
        };
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// True once alpha has decayed to its floor.
    pub fn is_settled(&self) -> bool {
        self.alpha <= ALPHA_MIN
    }

    pub fn center(&self) -> Vec2 {
        self.extent * 0.5
    }

    pub fn extent(&self) -> Vec2 {
        self.extent
    }

    pub fn anchors(&self) -> &CategoryAnchors {
        &self.anchors
    }

    /// Advance all active entities by one tick.
    pub fn tick(&mut self, entities: &mut [Entity]) {
        self.alpha = (self.alpha * (1.0 - ALPHA_DECAY)).max(ALPHA_MIN);
        let alpha = self.alpha;

        self.apply_center(entities, alpha);
        self.apply_collide(entities);
        self.apply_grouping(entities, alpha);

        let lo = Vec2::splat(self.margin);
        let hi = self.extent - lo;
        for entity in entities.iter_mut().filter(|e| e.is_active()) {
            entity.velocity *= self.damping;
            entity.position += entity.velocity;
            // lower bound last: a canvas narrower than two margins pins to the margin
            entity.position = entity.position.min(hi).max(lo);
        }
    }

    fn apply_center(&self, entities: &mut [Entity], alpha: f32) {
        // grouping replaces centering while enabled
        let strength = if self.grouping { 0.0 } else { self.center_strength };
        if strength == 0.0 {
            return;
        }
        let target = self.center();
        for entity in entities.iter_mut().filter(|e| e.is_active()) {
            entity.velocity += (target - entity.position) * strength * alpha;
        }
    }

    fn apply_collide(&mut self, entities: &mut [Entity]) {
        if self.collide_strength == 0.0 {
            return;
        }
        let active: Vec<usize> = (0..entities.len())
            .filter(|&i| entities[i].is_active())
            .collect();

        for (n, &i) in active.iter().enumerate() {
            let ri = entities[i].radius + self.collide_margin;
            let predicted = entities[i].position + entities[i].velocity;
            for &j in &active[n + 1..] {
                let rj = entities[j].radius + self.collide_margin;
                let r = ri + rj;
                let mut d = predicted - entities[j].position - entities[j].velocity;
                let mut l2 = d.length_squared();
                if l2 >= r * r {
                    continue;
                }
                if d.x == 0.0 {
                    d.x = self.jiggle();
                    l2 += d.x * d.x;
                }
                if d.y == 0.0 {
                    d.y = self.jiggle();
                    l2 += d.y * d.y;
                }
                let l = l2.sqrt();
                let k = (r - l) / l * self.collide_strength;
                let push = d * k;
                let w = (rj * rj) / (ri * ri + rj * rj);
                entities[i].velocity += push * w;
                entities[j].velocity -= push * (1.0 - w);
            }
        }
    }

    fn apply_grouping(&self, entities: &mut [Entity], alpha: f32) {
        if !self.grouping || self.grouping_strength == 0.0 {
            return;
        }
        let k = self.grouping_strength * alpha;
        for entity in entities.iter_mut().filter(|e| e.is_active()) {
            let anchor = self
                .anchors
                .by_index(entity.category_index)
                .or_else(|| self.anchors.get(&entity.category))
                .unwrap_or_else(|| self.center());
            entity.velocity += (anchor - entity.position) * k;
        }
    }

    fn jiggle(&mut self) -> f32 {
        (self.rng.gen::<f32>() - 0.5) * 1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityRecord, EntityStore};
    use crate::palette::CategoryPalette;

    fn store(categories: &[&str], extent: Vec2) -> EntityStore {
        let records: Vec<EntityRecord> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| EntityRecord {
                id: i.to_string(),
                supertype: Some(c.to_string()),
                ..Default::default()
            })
            .collect();
        let mut store =
            EntityStore::from_records(&records, &mut CategoryPalette::default(), extent, 3);
        for i in 0..store.len() {
            store.activate(i);
        }
        store
    }

    #[test]
    fn test_alpha_decays_to_floor_and_stays() {
        let extent = Vec2::new(400.0, 400.0);
        let mut layout = LayoutIntegrator::new(&Params::default(), extent);
        let mut s = store(&["a"], extent);
        for _ in 0..3000 {
            layout.tick(s.as_mut_slice());
        }
        assert!(layout.is_settled());
        assert_eq!(layout.alpha(), ALPHA_MIN);
        layout.reheat(1.0);
        assert!(!layout.is_settled());
    }

    #[test]
    fn test_anchors_evenly_spaced() {
        let extent = Vec2::new(800.0, 600.0);
        let mut layout = LayoutIntegrator::new(&Params::default(), extent);
        let s = store(&["a", "b", "c", "d"], extent);
        layout.add_entities(s.as_slice());
        let center = Vec2::new(400.0, 300.0);
        assert_eq!(layout.anchors().len(), 4);
        let a = layout.anchors().get("a").unwrap();
        let c = layout.anchors().get("c").unwrap();
        assert!((a - Vec2::new(700.0, 300.0)).length() < 1e-3);
        assert!((c - Vec2::new(100.0, 300.0)).length() < 1e-3);
        for label in ["a", "b", "c", "d"] {
            let p = layout.anchors().get(label).unwrap();
            assert!(((p - center).length() - 300.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_positions_stay_inside_margin() {
        let extent = Vec2::new(300.0, 200.0);
        let params = Params {
            collide_radius: 10.0,
            ..Default::default()
        };
        let mut layout = LayoutIntegrator::new(&params, extent);
        let categories = ["a"; 40];
        let mut s = store(&categories, extent);
        for _ in 0..200 {
            layout.tick(s.as_mut_slice());
            for e in s.iter() {
                assert!(e.position.x >= 50.0 && e.position.x <= 250.0, "{:?}", e.position);
                assert!(e.position.y >= 50.0 && e.position.y <= 150.0, "{:?}", e.position);
            }
        }
    }

    #[test]
    fn test_collision_separates_overlapping_pair() {
        let extent = Vec2::new(400.0, 400.0);
        let params = Params {
            center_strength: 0.0,
            ..Default::default()
        };
        let mut layout = LayoutIntegrator::new(&params, extent);
        let mut s = store(&["a", "a"], extent);
        s.as_mut_slice()[0].position = Vec2::new(200.0, 200.0);
        s.as_mut_slice()[1].position = Vec2::new(205.0, 200.0);
        for _ in 0..100 {
            layout.tick(s.as_mut_slice());
        }
        let gap = s.get(0).unwrap().position.distance(s.get(1).unwrap().position);
        assert!(gap > 25.0, "gap {gap}");
    }

    #[test]
    fn test_coincident_pair_is_split() {
        let extent = Vec2::new(400.0, 400.0);
        let mut layout = LayoutIntegrator::new(&Params::default(), extent);
        let mut s = store(&["a", "a"], extent);
        for e in s.as_mut_slice() {
            e.position = Vec2::new(200.0, 200.0);
        }
        for _ in 0..50 {
            layout.tick(s.as_mut_slice());
        }
        let (a, b) = (s.get(0).unwrap().position, s.get(1).unwrap().position);
        assert!(a.is_finite() && b.is_finite());
        assert!(a != b);
    }

    #[test]
    fn test_pending_entities_do_not_move() {
        let extent = Vec2::new(400.0, 400.0);
        let mut layout = LayoutIntegrator::new(&Params::default(), extent);
        let mut s = store(&["a"], extent);
        s.reset_spawn();
        let before = s.get(0).unwrap().position;
        for _ in 0..10 {
            layout.tick(s.as_mut_slice());
        }
        assert_eq!(s.get(0).unwrap().position, before);
    }
}
