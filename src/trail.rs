//! Trail accumulator: aging position samples of active entities.

use glam::{Vec2, Vec3};

use crate::entity::Entity;
use crate::palette::trail_tone;
use crate::params::TrailParams;

/// One sampled position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub position: Vec2,
    /// Source entity color at sampling time.
    pub color: Vec3,
    /// Ticks since the sample was taken.
    pub age: u32,
}

impl TrailPoint {
    /// Alpha for drawing: fades linearly from `opacity` to zero over the
    /// trail length.
    pub fn alpha(&self, trail: &TrailParams) -> f32 {
        let length = trail.length.max(1) as f32;
        (trail.opacity * (1.0 - self.age as f32 / length)).max(0.0)
    }

    /// Draw color after the trail tone adjustment.
    pub fn tone(&self, trail: &TrailParams) -> Vec3 {
        trail_tone(self.color, trail)
    }
}

/// Insertion-ordered trail points.
#[derive(Debug, Clone, Default)]
pub struct TrailAccumulator {
    points: Vec<TrailPoint>,
}

impl TrailAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample on interval ticks, then age everything and drop expired points.
    pub fn tick(&mut self, tick_count: u64, entities: &[Entity], trail: &TrailParams) {
        let interval = trail.interval.max(1) as u64;
        if tick_count % interval == 0 {
            self.points.extend(entities.iter().filter(|e| e.is_active()).map(|e| TrailPoint {
                position: e.position,
                color: e.color,
                age: 0,
            }));
        }
        for point in &mut self.points {
            point.age += 1;
        }
        self.points.retain(|p| p.age < trail.length);
    }

    /// Live points for the current frame, oldest first.
    pub fn points(&self) -> impl ExactSizeIterator<Item = &TrailPoint> + Clone {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[TrailPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityRecord, EntityStore};
    use crate::palette::CategoryPalette;

    fn active_store(n: usize) -> EntityStore {
        let records: Vec<EntityRecord> = (0..n)
            .map(|i| EntityRecord {
                id: i.to_string(),
                supertype: Some("a".into()),
                ..Default::default()
            })
            .collect();
        let mut store = EntityStore::from_records(
            &records,
            &mut CategoryPalette::default(),
            Vec2::new(100.0, 100.0),
            0,
        );
        for i in 0..n {
            store.activate(i);
        }
        store
    }

    #[test]
    fn test_samples_on_interval_only() {
        let store = active_store(2);
        let trail = TrailParams {
            interval: 3,
            length: 100,
            ..Default::default()
        };
        let mut acc = TrailAccumulator::new();
        for tick in 1..=6 {
            acc.tick(tick, store.as_slice(), &trail);
        }
        // ticks 3 and 6
        assert_eq!(acc.len(), 4);
    }

    #[test]
    fn test_ages_stay_below_length() {
        let store = active_store(3);
        let trail = TrailParams {
            interval: 1,
            length: 10,
            ..Default::default()
        };
        let mut acc = TrailAccumulator::new();
        for tick in 1..=50 {
            acc.tick(tick, store.as_slice(), &trail);
            assert!(acc.points().all(|p| p.age < trail.length));
        }
        // steady state: 3 entities x (length - 1) live ages
        assert_eq!(acc.len(), 3 * 9);
    }

    #[test]
    fn test_count_never_grows_without_sampling() {
        let store = active_store(4);
        let trail = TrailParams {
            interval: 1,
            length: 20,
            ..Default::default()
        };
        let mut acc = TrailAccumulator::new();
        for tick in 1..=10 {
            acc.tick(tick, store.as_slice(), &trail);
        }
        let sampling = TrailParams {
            interval: 1000,
            ..trail
        };
        let mut last = acc.len();
        for tick in 1..=30 {
            acc.tick(tick, store.as_slice(), &sampling);
            assert!(acc.len() <= last);
            last = acc.len();
        }
        assert!(acc.is_empty());
    }

    #[test]
    fn test_alpha_fades_linearly() {
        let trail = TrailParams {
            length: 10,
            opacity: 0.5,
            ..Default::default()
        };
        let mut point = TrailPoint {
            position: Vec2::ZERO,
            color: Vec3::ONE,
            age: 0,
        };
        assert_eq!(point.alpha(&trail), 0.5);
        point.age = 5;
        assert_eq!(point.alpha(&trail), 0.25);
    }

    #[test]
    fn test_points_is_restartable() {
        let store = active_store(2);
        let mut acc = TrailAccumulator::new();
        acc.tick(3, store.as_slice(), &TrailParams::default());
        let iter = acc.points();
        assert_eq!(iter.clone().count(), iter.count());
    }
}
