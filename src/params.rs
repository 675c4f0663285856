//! Simulation parameters.
//!
//! One owned [`Params`] value configures the whole engine. A control panel
//! mutates it through [`ParamChange`] values applied by the engine, which
//! triggers only the side effect each field needs. Every numeric field has a
//! documented range; out-of-range or non-finite input is clamped, never a
//! fault.

use std::f32::consts::TAU;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::halftone::{BlendMode, HalftoneParams, Shape};

pub const NODE_SIZE_RANGE: RangeInclusive<f32> = 10.0..=50.0;
pub const CENTER_STRENGTH_RANGE: RangeInclusive<f32> = 0.0..=0.2;
pub const COLLIDE_RADIUS_RANGE: RangeInclusive<f32> = 0.0..=10.0;
pub const COLLIDE_STRENGTH_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const GROUPING_STRENGTH_RANGE: RangeInclusive<f32> = 0.0..=0.5;
pub const GROUPING_RADIUS_RANGE: RangeInclusive<f32> = 50.0..=300.0;
pub const DAMPING_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const SPAWN_DELAY_RANGE: RangeInclusive<f32> = 50.0..=1000.0;
pub const MAX_ACTIVE_RANGE: RangeInclusive<usize> = 1..=4096;
pub const MARGIN_RANGE: RangeInclusive<f32> = 0.0..=500.0;

pub const TRAIL_LENGTH_RANGE: RangeInclusive<u32> = 10..=200;
pub const TRAIL_OPACITY_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const TRAIL_SIZE_RANGE: RangeInclusive<f32> = 1.0..=300.0;
pub const TRAIL_INTERVAL_RANGE: RangeInclusive<u32> = 1..=10;
pub const SATURATION_SCALE_RANGE: RangeInclusive<f32> = 0.1..=3.0;
pub const LIGHTNESS_BASE_RANGE: RangeInclusive<f32> = 0.1..=1.0;
pub const LIGHTNESS_CONTRAST_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const BLUR_SIZE_RANGE: RangeInclusive<f32> = 0.0..=50.0;

pub const HALFTONE_RADIUS_RANGE: RangeInclusive<f32> = 0.5..=10.0;
pub const ROTATION_RANGE: RangeInclusive<f32> = 0.0..=TAU;
pub const SCATTER_RANGE: RangeInclusive<f32> = 0.0..=5.0;
pub const BLENDING_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// Clamp into `range`; non-finite values fall back to `default`.
pub(crate) fn clamp_f32(value: f32, range: &RangeInclusive<f32>, default: f32) -> f32 {
    if value.is_finite() {
        value.clamp(*range.start(), *range.end())
    } else {
        default
    }
}

fn clamp_ord<T: Ord + Copy>(value: T, range: &RangeInclusive<T>) -> T {
    value.clamp(*range.start(), *range.end())
}

/// Trail sampling and drawing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrailParams {
    /// Ticks a trail point lives.
    pub length: u32,
    /// Alpha of a fresh trail point.
    pub opacity: f32,
    /// Sprite diameter in pixels.
    pub size: f32,
    /// Ticks between samples.
    pub interval: u32,
    pub saturation_scale: f32,
    pub lightness_base: f32,
    pub lightness_contrast: f32,
    /// Blur tap spacing in pixels.
    pub blur_size: f32,
}

impl Default for TrailParams {
    fn default() -> Self {
        Self {
            length: 86,
            opacity: 0.082,
            size: 180.0,
            interval: 3,
            saturation_scale: 0.7,
            lightness_base: 0.72,
            lightness_contrast: 0.16,
            blur_size: 20.0,
        }
    }
}

impl TrailParams {
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        Self {
            length: clamp_ord(self.length, &TRAIL_LENGTH_RANGE),
            opacity: clamp_f32(self.opacity, &TRAIL_OPACITY_RANGE, d.opacity),
            size: clamp_f32(self.size, &TRAIL_SIZE_RANGE, d.size),
            interval: clamp_ord(self.interval, &TRAIL_INTERVAL_RANGE),
            saturation_scale: clamp_f32(self.saturation_scale, &SATURATION_SCALE_RANGE, d.saturation_scale),
            lightness_base: clamp_f32(self.lightness_base, &LIGHTNESS_BASE_RANGE, d.lightness_base),
            lightness_contrast: clamp_f32(
                self.lightness_contrast,
                &LIGHTNESS_CONTRAST_RANGE,
                d.lightness_contrast,
            ),
            blur_size: clamp_f32(self.blur_size, &BLUR_SIZE_RANGE, d.blur_size),
        }
    }
}

/// Every tunable of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Params {
    /// Node overlay sprite diameter in pixels.
    pub node_size: f32,
    pub center_strength: f32,
    /// Extra margin added to each entity radius for collision.
    pub collide_radius: f32,
    pub collide_strength: f32,
    pub grouping: bool,
    pub grouping_strength: f32,
    /// Radius of the circle the category anchors sit on.
    pub grouping_radius: f32,
    /// Velocity multiplier applied each tick (0 = full stop, 1 = no damping).
    pub damping: f32,
    pub spawn_delay_ms: f32,
    /// Working-set cap. Fixed for the lifetime of an engine.
    pub max_active: usize,
    /// Hard boundary inset from each canvas edge.
    pub margin: f32,
    /// Final frame clear color (RGB, 0.0-1.0).
    pub background: [f32; 3],
    /// Seed for initial entity placement.
    pub seed: u64,
    pub trail: TrailParams,
    pub halftone: HalftoneParams,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            node_size: 18.0,
            center_strength: 0.05,
            collide_radius: 10.0,
            collide_strength: 1.0,
            grouping: false,
            grouping_strength: 0.2,
            grouping_radius: 300.0,
            damping: 0.9,
            spawn_delay_ms: 100.0,
            max_active: 70,
            margin: 50.0,
            background: [1.0, 1.0, 1.0],
            seed: 0x5eed,
            trail: TrailParams::default(),
            halftone: HalftoneParams::default(),
        }
    }
}

impl Params {
    /// Read parameters from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let params: Params = serde_json::from_str(json)?;
        Ok(params.clamped())
    }

    /// Copy with every field forced into its documented range.
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        Self {
            node_size: clamp_f32(self.node_size, &NODE_SIZE_RANGE, d.node_size),
            center_strength: clamp_f32(self.center_strength, &CENTER_STRENGTH_RANGE, d.center_strength),
            collide_radius: clamp_f32(self.collide_radius, &COLLIDE_RADIUS_RANGE, d.collide_radius),
            collide_strength: clamp_f32(self.collide_strength, &COLLIDE_STRENGTH_RANGE, d.collide_strength),
            grouping: self.grouping,
            grouping_strength: clamp_f32(
                self.grouping_strength,
                &GROUPING_STRENGTH_RANGE,
                d.grouping_strength,
            ),
            grouping_radius: clamp_f32(self.grouping_radius, &GROUPING_RADIUS_RANGE, d.grouping_radius),
            damping: clamp_f32(self.damping, &DAMPING_RANGE, d.damping),
            spawn_delay_ms: clamp_f32(self.spawn_delay_ms, &SPAWN_DELAY_RANGE, d.spawn_delay_ms),
            max_active: clamp_ord(self.max_active, &MAX_ACTIVE_RANGE),
            margin: clamp_f32(self.margin, &MARGIN_RANGE, d.margin),
            background: self.background.map(|c| clamp_f32(c, &(0.0..=1.0), 1.0)),
            seed: self.seed,
            trail: self.trail.clamped(),
            halftone: self.halftone.clamped(),
        }
    }

    /// Store one change, clamped. Returns the value actually stored.
    pub fn set(&mut self, change: ParamChange) -> ParamChange {
        use ParamChange::*;
        let d = Self::default();
        let h = &mut self.halftone;
        let t = &mut self.trail;
        match change {
            NodeSize(v) => {
                self.node_size = clamp_f32(v, &NODE_SIZE_RANGE, d.node_size);
                NodeSize(self.node_size)
            }
            CenterStrength(v) => {
                self.center_strength = clamp_f32(v, &CENTER_STRENGTH_RANGE, d.center_strength);
                CenterStrength(self.center_strength)
            }
            CollideRadius(v) => {
                self.collide_radius = clamp_f32(v, &COLLIDE_RADIUS_RANGE, d.collide_radius);
                CollideRadius(self.collide_radius)
            }
            CollideStrength(v) => {
                self.collide_strength = clamp_f32(v, &COLLIDE_STRENGTH_RANGE, d.collide_strength);
                CollideStrength(self.collide_strength)
            }
            Grouping(on) => {
                self.grouping = on;
                Grouping(on)
            }
            GroupingStrength(v) => {
                self.grouping_strength =
                    clamp_f32(v, &GROUPING_STRENGTH_RANGE, d.grouping_strength);
                GroupingStrength(self.grouping_strength)
            }
            GroupingRadius(v) => {
                self.grouping_radius = clamp_f32(v, &GROUPING_RADIUS_RANGE, d.grouping_radius);
                GroupingRadius(self.grouping_radius)
            }
            Damping(v) => {
                self.damping = clamp_f32(v, &DAMPING_RANGE, d.damping);
                Damping(self.damping)
            }
            SpawnDelay(v) => {
                self.spawn_delay_ms = clamp_f32(v, &SPAWN_DELAY_RANGE, d.spawn_delay_ms);
                SpawnDelay(self.spawn_delay_ms)
            }
            Background(rgb) => {
                self.background = rgb.map(|c| clamp_f32(c, &(0.0..=1.0), 1.0));
                Background(self.background)
            }
            TrailLength(v) => {
                t.length = clamp_ord(v, &TRAIL_LENGTH_RANGE);
                TrailLength(t.length)
            }
            TrailOpacity(v) => {
                t.opacity = clamp_f32(v, &TRAIL_OPACITY_RANGE, d.trail.opacity);
                TrailOpacity(t.opacity)
            }
            TrailSize(v) => {
                t.size = clamp_f32(v, &TRAIL_SIZE_RANGE, d.trail.size);
                TrailSize(t.size)
            }
            TrailInterval(v) => {
                t.interval = clamp_ord(v, &TRAIL_INTERVAL_RANGE);
                TrailInterval(t.interval)
            }
            SaturationScale(v) => {
                t.saturation_scale = clamp_f32(v, &SATURATION_SCALE_RANGE, d.trail.saturation_scale);
                SaturationScale(t.saturation_scale)
            }
            LightnessBase(v) => {
                t.lightness_base = clamp_f32(v, &LIGHTNESS_BASE_RANGE, d.trail.lightness_base);
                LightnessBase(t.lightness_base)
            }
            LightnessContrast(v) => {
                t.lightness_contrast =
                    clamp_f32(v, &LIGHTNESS_CONTRAST_RANGE, d.trail.lightness_contrast);
                LightnessContrast(t.lightness_contrast)
            }
            BlurSize(v) => {
                t.blur_size = clamp_f32(v, &BLUR_SIZE_RANGE, d.trail.blur_size);
                BlurSize(t.blur_size)
            }
            HalftoneRadius(v) => {
                h.radius = clamp_f32(v, &HALFTONE_RADIUS_RANGE, d.halftone.radius);
                HalftoneRadius(h.radius)
            }
            RotateR(v) => {
                h.rotate_r = clamp_f32(v, &ROTATION_RANGE, d.halftone.rotate_r);
                RotateR(h.rotate_r)
            }
            RotateG(v) => {
                h.rotate_g = clamp_f32(v, &ROTATION_RANGE, d.halftone.rotate_g);
                RotateG(h.rotate_g)
            }
            RotateB(v) => {
                h.rotate_b = clamp_f32(v, &ROTATION_RANGE, d.halftone.rotate_b);
                RotateB(h.rotate_b)
            }
            Scatter(v) => {
                h.scatter = clamp_f32(v, &SCATTER_RANGE, d.halftone.scatter);
                Scatter(h.scatter)
            }
            HalftoneShape(shape) => {
                h.shape = shape;
                HalftoneShape(shape)
            }
            Blending(v) => {
                h.blending = clamp_f32(v, &BLENDING_RANGE, d.halftone.blending);
                Blending(h.blending)
            }
            BlendingMode(mode) => {
                h.blending_mode = mode;
                BlendingMode(mode)
            }
            Greyscale(on) => {
                h.greyscale = on;
                Greyscale(on)
            }
            DisableHalftone(on) => {
                h.disable = on;
                DisableHalftone(on)
            }
        }
    }
}

/// A single live edit from the control panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamChange {
    NodeSize(f32),
    CenterStrength(f32),
    CollideRadius(f32),
    CollideStrength(f32),
    Grouping(bool),
    GroupingStrength(f32),
    GroupingRadius(f32),
    Damping(f32),
    SpawnDelay(f32),
    Background([f32; 3]),
    TrailLength(u32),
    TrailOpacity(f32),
    TrailSize(f32),
    TrailInterval(u32),
    SaturationScale(f32),
    LightnessBase(f32),
    LightnessContrast(f32),
    BlurSize(f32),
    HalftoneRadius(f32),
    RotateR(f32),
    RotateG(f32),
    RotateB(f32),
    Scatter(f32),
    HalftoneShape(Shape),
    Blending(f32),
    BlendingMode(BlendMode),
    Greyscale(bool),
    DisableHalftone(bool),
}

/// What the engine must do after a change is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEffect {
    /// Picked up by the next render, nothing else to do.
    RenderOnly,
    /// Spawn cadence changed.
    Spawn,
    /// Forces must be reconfigured and the layout reheated.
    Forces,
    /// Category anchors must be recomputed and the layout reheated.
    Anchors,
    /// Entity radii follow the node size; forces reconfigured and reheated.
    Radius,
}

impl ParamChange {
    pub fn effect(&self) -> ParamEffect {
        use ParamChange::*;
        match self {
            NodeSize(_) => ParamEffect::Radius,
            CenterStrength(_) | CollideRadius(_) | CollideStrength(_) | Grouping(_)
            | GroupingStrength(_) | Damping(_) => ParamEffect::Forces,
            GroupingRadius(_) => ParamEffect::Anchors,
            SpawnDelay(_) => ParamEffect::Spawn,
            _ => ParamEffect::RenderOnly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_in_range() {
        let params = Params::default();
        assert_eq!(params.clamped(), params);
    }

    #[test]
    fn test_set_clamps_out_of_range() {
        let mut params = Params::default();
        assert_eq!(params.set(ParamChange::Damping(4.0)), ParamChange::Damping(1.0));
        assert_eq!(params.damping, 1.0);
        assert_eq!(
            params.set(ParamChange::TrailInterval(0)),
            ParamChange::TrailInterval(1)
        );
        assert_eq!(params.set(ParamChange::Scatter(f32::NAN)), ParamChange::Scatter(0.0));
    }

    #[test]
    fn test_from_json_fills_defaults_and_clamps() {
        let params = Params::from_json(
            r#"{ "damping": 0.5, "trail": { "length": 1000 }, "halftone": { "shape": "square", "blendingMode": "multiply" } }"#,
        )
        .unwrap();
        assert_eq!(params.damping, 0.5);
        assert_eq!(params.trail.length, 200);
        assert_eq!(params.trail.opacity, TrailParams::default().opacity);
        assert_eq!(params.halftone.shape, Shape::Square);
        assert_eq!(params.halftone.blending_mode, BlendMode::Multiply);
        assert_eq!(params.node_size, 18.0);
    }

    #[test]
    fn test_effects() {
        assert_eq!(ParamChange::RotateR(1.0).effect(), ParamEffect::RenderOnly);
        assert_eq!(ParamChange::CollideRadius(3.0).effect(), ParamEffect::Forces);
        assert_eq!(ParamChange::GroupingRadius(100.0).effect(), ParamEffect::Anchors);
        assert_eq!(ParamChange::NodeSize(20.0).effect(), ParamEffect::Radius);
        assert_eq!(ParamChange::SpawnDelay(200.0).effect(), ParamEffect::Spawn);
    }
}
