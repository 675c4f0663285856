//! Entity store: the loaded dataset plus per-entity render state.
//!
//! Entities are created once by [`EntityStore::from_records`] and live until the
//! store is dropped. Dataset order is spawn order.

use std::path::Path;

use glam::{Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DatasetError;
use crate::palette::{parse_hex, CategoryPalette};

/// Category assigned to records that carry none.
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Collision radius for records without an explicit radius.
pub const DEFAULT_RADIUS: f32 = 5.0;

/// One record of the input dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Category label.
    #[serde(default, alias = "category")]
    pub supertype: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "whatSimplified")]
    pub description: Option<String>,
    /// `#rrggbb` color overriding the category color.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub radius: Option<f32>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(n) => n.to_string(),
    })
}

/// Parse a JSON array of records.
pub fn parse_records(json: &str) -> Result<Vec<EntityRecord>, DatasetError> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse a JSON dataset file.
pub fn load_records(path: &Path) -> Result<Vec<EntityRecord>, DatasetError> {
    let json = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&json)
}

/// Whether the spawn scheduler has revealed an entity yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnState {
    #[default]
    Pending,
    Active,
    /// Cleared from the canvas; hidden until the next restart.
    Removed,
}

/// A dataset entity with its simulation and render state.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Index into [`EntityStore::categories`].
    pub category_index: usize,
    pub kind: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub position: Vec2,
    /// Owned by the layout integrator.
    pub velocity: Vec2,
    pub radius: f32,
    /// RGB, 0.0-1.0.
    pub color: Vec3,
    /// True when the dataset supplied its own color.
    pub color_override: bool,
    pub spawn: SpawnState,
}

impl Entity {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.spawn == SpawnState::Active
    }
}

/// Holds every entity of the session in dataset order.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: Vec<Entity>,
    categories: Vec<String>,
}

impl EntityStore {
    /// Build entities from records, scattering them uniformly over `extent`.
    ///
    /// Records without a category land in [`DEFAULT_CATEGORY`]. Colors come
    /// from `palette` unless the record overrides them.
    pub fn from_records(
        records: &[EntityRecord],
        palette: &mut CategoryPalette,
        extent: Vec2,
        seed: u64,
    ) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut categories: Vec<String> = Vec::new();

        let entities = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let category = match record.supertype.as_deref().map(str::trim) {
                    Some(label) if !label.is_empty() => label.to_string(),
                    _ => {
                        tracing::warn!(index = i, id = %record.id, "entity has no category, using default");
                        DEFAULT_CATEGORY.to_string()
                    }
                };
                let category_index = match categories.iter().position(|c| *c == category) {
                    Some(idx) => idx,
                    None => {
                        categories.push(category.clone());
                        categories.len() - 1
                    }
                };

                let override_color = record.color.as_deref().and_then(parse_hex);
                let color = override_color.unwrap_or_else(|| palette.color(&category));

                let radius = record
                    .radius
                    .filter(|r| r.is_finite() && *r > 0.0)
                    .unwrap_or(DEFAULT_RADIUS);

                Entity {
                    id: record.id.clone(),
                    name: record.name.clone(),
                    category,
                    category_index,
                    kind: record.kind.clone(),
                    tags: record.tags.clone(),
                    description: record.description.clone(),
                    position: Vec2::new(
                        rng.gen::<f32>() * extent.x.max(0.0),
                        rng.gen::<f32>() * extent.y.max(0.0),
                    ),
                    velocity: Vec2::ZERO,
                    radius,
                    color,
                    color_override: override_color.is_some(),
                    spawn: SpawnState::Pending,
                }
            })
            .collect();

        Self {
            entities,
            categories,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Distinct category labels in order of first appearance.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index)
    }

    /// Look up an entity by its dataset identifier.
    pub fn find(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn as_slice(&self) -> &[Entity] {
        &self.entities
    }

    pub fn as_mut_slice(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    /// Active entities in activation order.
    pub fn active(&self) -> impl Iterator<Item = &Entity> + Clone {
        self.entities.iter().filter(|e| e.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Promote a pending entity. Returns false if it was already active or
    /// does not exist.
    pub fn activate(&mut self, index: usize) -> bool {
        match self.entities.get_mut(index) {
            Some(entity) if entity.spawn == SpawnState::Pending => {
                entity.spawn = SpawnState::Active;
                entity.velocity = Vec2::ZERO;
                true
            }
            _ => false,
        }
    }

    /// Return every entity to `Pending`. Only used by an explicit restart.
    pub fn reset_spawn(&mut self) {
        for entity in &mut self.entities {
            entity.spawn = SpawnState::Pending;
            entity.velocity = Vec2::ZERO;
        }
    }

    /// Take every active entity off the canvas. Returns how many were removed.
    pub fn remove_active(&mut self) -> usize {
        let mut removed = 0;
        for entity in self.entities.iter_mut().filter(|e| e.is_active()) {
            entity.spawn = SpawnState::Removed;
            entity.velocity = Vec2::ZERO;
            removed += 1;
        }
        removed
    }

    /// Recolor every entity of `category` that has no dataset override.
    pub fn recolor_category(&mut self, category: &str, color: Vec3) -> usize {
        let mut changed = 0;
        for entity in self
            .entities
            .iter_mut()
            .filter(|e| e.category == category && !e.color_override)
        {
            entity.color = color;
            changed += 1;
        }
        changed
    }

    /// Set the collision radius of every entity.
    pub fn set_radius(&mut self, radius: f32) {
        for entity in &mut self.entities {
            entity.radius = radius;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, category: Option<&str>) -> EntityRecord {
        EntityRecord {
            id: id.to_string(),
            name: format!("Entity {id}"),
            supertype: category.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_records_accepts_numeric_ids_and_aliases() {
        let json = r##"[
            {"id": 7, "name": "Seven", "supertype": "A", "whatSimplified": "desc", "tags": ["x"]},
            {"id": "b", "name": "Bee", "category": "B", "type": "lab", "color": "#ff0000"}
        ]"##;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "7");
        assert_eq!(records[0].description.as_deref(), Some("desc"));
        assert_eq!(records[1].supertype.as_deref(), Some("B"));
        assert_eq!(records[1].kind.as_deref(), Some("lab"));
    }

    #[test]
    fn test_missing_category_gets_default() {
        let mut palette = CategoryPalette::default();
        let store = EntityStore::from_records(
            &[record("a", None), record("b", Some("  ")), record("c", Some("X"))],
            &mut palette,
            Vec2::new(100.0, 100.0),
            1,
        );
        assert_eq!(store.get(0).unwrap().category, DEFAULT_CATEGORY);
        assert_eq!(store.get(1).unwrap().category, DEFAULT_CATEGORY);
        assert_eq!(store.categories(), &[DEFAULT_CATEGORY.to_string(), "X".to_string()]);
    }

    #[test]
    fn test_positions_within_extent_and_deterministic() {
        let records: Vec<_> = (0..20).map(|i| record(&i.to_string(), Some("A"))).collect();
        let mut palette = CategoryPalette::default();
        let a = EntityStore::from_records(&records, &mut palette, Vec2::new(640.0, 480.0), 9);
        let b = EntityStore::from_records(&records, &mut palette, Vec2::new(640.0, 480.0), 9);
        for (ea, eb) in a.iter().zip(b.iter()) {
            assert_eq!(ea.position, eb.position);
            assert!(ea.position.x >= 0.0 && ea.position.x <= 640.0);
            assert!(ea.position.y >= 0.0 && ea.position.y <= 480.0);
        }
    }

    #[test]
    fn test_activate_once() {
        let mut palette = CategoryPalette::default();
        let mut store =
            EntityStore::from_records(&[record("a", Some("A"))], &mut palette, Vec2::ONE, 0);
        assert!(store.activate(0));
        assert!(!store.activate(0));
        assert!(!store.activate(5));
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_removed_entities_cannot_be_activated() {
        let records = [record("a", Some("x")), record("b", Some("x"))];
        let extent = Vec2::new(100.0, 100.0);
        let mut store = EntityStore::from_records(&records, &mut CategoryPalette::default(), extent, 0);
        assert!(store.activate(0));
        assert_eq!(store.remove_active(), 1);
        assert_eq!(store.get(0).map(|e| e.spawn), Some(SpawnState::Removed));
        assert!(!store.activate(0));
        assert!(store.activate(1));
        assert_eq!(store.active_count(), 1);

        store.reset_spawn();
        assert!(store.iter().all(|e| e.spawn == SpawnState::Pending));
    }

    #[test]
    fn test_recolor_skips_overrides() {
        let mut palette = CategoryPalette::default();
        let mut overridden = record("b", Some("A"));
        overridden.color = Some("#00ff00".into());
        let mut store = EntityStore::from_records(
            &[record("a", Some("A")), overridden],
            &mut palette,
            Vec2::ONE,
            0,
        );
        let changed = store.recolor_category("A", Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(changed, 1);
        assert_eq!(store.get(0).unwrap().color, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(store.get(1).unwrap().color, Vec3::new(0.0, 1.0, 0.0));
    }
}
