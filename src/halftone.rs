//! Halftone screen: shapes, blend modes and a CPU reference implementation.
//!
//! Each color channel is screened independently on a square grid of step
//! `radius`, rotated by that channel's angle. A pixel looks at the grid cell
//! it falls in plus three neighbours, estimates the channel intensity at each
//! of the four dot centers, turns that into a dot radius through the active
//! [`Shape`], and sums the anti-aliased coverage. The result is mixed back
//! with the unscreened value through a [`BlendMode`].
//!
//! The GPU pass in `gpu::halftone` runs the same math; its WGSL is generated
//! from the variants here so both sides stay in step. [`HalftoneScreen`] is
//! the single-shot CPU path used by the `still` command and by tests.

use std::f32::consts::TAU;
use std::path::Path;

use glam::{Vec2, Vec4};
use image::{DynamicImage, Rgba, Rgba32FImage};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::params::{
    clamp_f32, BLENDING_RANGE, HALFTONE_RADIUS_RANGE, ROTATION_RANGE, SCATTER_RANGE,
};

pub(crate) const SQRT2_MINUS_ONE: f32 = 0.41421356;
pub(crate) const SQRT2_HALF_MINUS_ONE: f32 = 0.20710678;

/// Ring samples around each dot center, in addition to the center itself.
pub const RING_SAMPLES: usize = 8;

/// Ring distance as a fraction of the dot radius.
pub const RING_DISTANCE: f32 = 0.66;

/// Footprint of a single halftone dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Round dot, `|i|^1.125`.
    #[default]
    Dot,
    /// Dot stretched along the grid normal.
    Ellipse,
    /// Band along the grid line, `|i|^1.5`.
    Line,
    /// Square rotated with the grid, `|i|^1.4`.
    Square,
}

impl Shape {
    pub const ALL: [Shape; 4] = [Shape::Dot, Shape::Ellipse, Shape::Line, Shape::Square];

    /// Tag written into the uniform buffer and matched by the shader.
    pub fn id(self) -> u32 {
        match self {
            Shape::Dot => 1,
            Shape::Ellipse => 2,
            Shape::Line => 3,
            Shape::Square => 4,
        }
    }

    /// Signed distance from `p` to the edge of the dot centered at `center`.
    ///
    /// Positive inside the dot. `intensity` is the sampled channel value,
    /// `normal` the grid normal and `angle` the grid rotation.
    pub fn edge_distance(
        self,
        intensity: f32,
        center: Vec2,
        normal: Vec2,
        p: Vec2,
        angle: f32,
        radius_max: f32,
    ) -> f32 {
        let mut dist = center.distance(p);
        let rad = match self {
            Shape::Dot => intensity.abs().powf(1.125) * radius_max,
            Shape::Ellipse => {
                if dist != 0.0 {
                    let d = (p - center) / dist;
                    let along = (d.x * normal.x + d.y * normal.y).abs();
                    dist = dist * (1.0 - SQRT2_HALF_MINUS_ONE) + along * dist * SQRT2_MINUS_ONE;
                }
                intensity.abs().powf(1.125) * radius_max
            }
            Shape::Line => {
                let along = (p - center).dot(normal);
                dist = (normal * along).length();
                intensity.abs().powf(1.5) * radius_max
            }
            Shape::Square => {
                let theta = (p.y - center.y).atan2(p.x - center.x) - angle;
                let sin_t = theta.sin().abs();
                let cos_t = theta.cos().abs();
                let r = intensity.abs().powf(1.4);
                let edge = if sin_t > cos_t { r - sin_t * r } else { r - cos_t * r };
                radius_max * (r + edge)
            }
        };
        rad - dist
    }

    /// WGSL body of this shape's `switch` arm. Reads `channel`, `coord`,
    /// `normal`, `p`, `angle`, `rad_max`; writes `rad` and `dist`.
    pub fn to_wgsl(self) -> &'static str {
        match self {
            Shape::Dot => "rad = pow(abs(channel), 1.125) * rad_max;",
            Shape::Ellipse => {
                r#"rad = pow(abs(channel), 1.125) * rad_max;
            if (dist != 0.0) {
                let d = (p - coord) / dist;
                let along = abs(d.x * normal.x + d.y * normal.y);
                dist = dist * (1.0 - SQRT2_HALF_MINUS_ONE) + along * dist * SQRT2_MINUS_ONE;
            }"#
            }
            Shape::Line => {
                r#"rad = pow(abs(channel), 1.5) * rad_max;
            let along = dot(p - coord, normal);
            dist = length(normal * along);"#
            }
            Shape::Square => {
                r#"let theta = atan2(p.y - coord.y, p.x - coord.x) - angle;
            let sin_t = abs(sin(theta));
            let cos_t = abs(cos(theta));
            let r = pow(abs(channel), 1.4);
            let edge = select(r - cos_t * r, r - sin_t * r, sin_t > cos_t);
            rad = rad_max * (r + edge);"#
            }
        }
    }
}

/// How the screened value `h` is mixed with the original value `o`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// `blend(h, o, 1 - t)`: `t = 1` shows only the screen.
    #[default]
    Linear,
    Multiply,
    Add,
    Lighter,
    Darker,
}

impl BlendMode {
    pub const ALL: [BlendMode; 5] = [
        BlendMode::Linear,
        BlendMode::Multiply,
        BlendMode::Add,
        BlendMode::Lighter,
        BlendMode::Darker,
    ];

    pub fn id(self) -> u32 {
        match self {
            BlendMode::Linear => 1,
            BlendMode::Multiply => 2,
            BlendMode::Add => 3,
            BlendMode::Lighter => 4,
            BlendMode::Darker => 5,
        }
    }

    pub fn apply(self, h: f32, o: f32, t: f32) -> f32 {
        match self {
            BlendMode::Linear => blend(h, o, 1.0 - t),
            BlendMode::Multiply => blend(h, (h * o).max(0.0), t),
            BlendMode::Add => blend(h, (h + o).min(1.0), t),
            BlendMode::Lighter => blend(h, h.max(o), t),
            BlendMode::Darker => blend(h, h.min(o), t),
        }
    }

    /// WGSL expression over `a` (screened), `b` (original) and `t`.
    pub fn to_wgsl_expr(self) -> &'static str {
        match self {
            BlendMode::Linear => "blend(a, b, 1.0 - t)",
            BlendMode::Multiply => "blend(a, max(0.0, a * b), t)",
            BlendMode::Add => "blend(a, min(1.0, a + b), t)",
            BlendMode::Lighter => "blend(a, max(a, b), t)",
            BlendMode::Darker => "blend(a, min(a, b), t)",
        }
    }
}

/// `a * (1 - u) + b * u`
#[inline]
pub fn blend(a: f32, b: f32, u: f32) -> f32 {
    a * (1.0 - u) + b * u
}

/// Hash of a 2D seed into `[0, 1)`.
#[inline]
pub fn rand(seed: Vec2) -> f32 {
    let x = (seed.dot(Vec2::new(12.9898, 78.233))).sin() * 43758.5453;
    x - x.floor()
}

/// Floored modulo, matching the shading-language `mod`.
#[inline]
fn floor_mod(x: f32, y: f32) -> f32 {
    x - y * (x / y).floor()
}

/// Halftone screen settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HalftoneParams {
    /// Grid step and maximum dot radius, in pixels.
    pub radius: f32,
    pub rotate_r: f32,
    pub rotate_g: f32,
    pub rotate_b: f32,
    /// Jitter of dot centers, in units of half a grid step.
    pub scatter: f32,
    pub shape: Shape,
    pub blending: f32,
    pub blending_mode: BlendMode,
    pub greyscale: bool,
    /// Pass the input through untouched.
    pub disable: bool,
}

impl Default for HalftoneParams {
    fn default() -> Self {
        Self {
            radius: 3.6,
            rotate_r: 1.9,
            rotate_g: 5.9,
            rotate_b: 0.79,
            scatter: 0.0,
            shape: Shape::Dot,
            blending: 1.0,
            blending_mode: BlendMode::Linear,
            greyscale: false,
            disable: false,
        }
    }
}

impl HalftoneParams {
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        Self {
            radius: clamp_f32(self.radius, &HALFTONE_RADIUS_RANGE, d.radius),
            rotate_r: clamp_f32(self.rotate_r, &ROTATION_RANGE, d.rotate_r),
            rotate_g: clamp_f32(self.rotate_g, &ROTATION_RANGE, d.rotate_g),
            rotate_b: clamp_f32(self.rotate_b, &ROTATION_RANGE, d.rotate_b),
            scatter: clamp_f32(self.scatter, &SCATTER_RANGE, d.scatter),
            blending: clamp_f32(self.blending, &BLENDING_RANGE, d.blending),
            ..*self
        }
    }

    /// Anti-aliasing width for the dot edge.
    pub fn antialias(&self) -> f32 {
        if self.radius < 2.5 {
            self.radius * 0.5
        } else {
            1.25
        }
    }
}

/// The four candidate dot centers around a pixel on one channel's grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub normal: Vec2,
    pub centers: [Vec2; 4],
}

/// Find the grid cell containing `p` on a grid rotated by `grid_angle`
/// around `origin`, plus its three neighbours toward `p`.
pub fn reference_cell(p: Vec2, origin: Vec2, grid_angle: f32, step: f32, scatter: f32) -> Cell {
    let n = Vec2::new(grid_angle.cos(), grid_angle.sin());
    let tangent = Vec2::new(n.y, -n.x);
    let threshold = step * 0.5;
    let rel = p - origin;
    let dot_normal = n.dot(rel);
    let dot_line = -n.y * rel.x + n.x * rel.y;
    let offset = n * dot_normal;

    let offset_normal = floor_mod(offset.length(), step);
    let normal_dir = if dot_normal < 0.0 { 1.0 } else { -1.0 };
    let normal_scale = if offset_normal < threshold {
        -offset_normal
    } else {
        step - offset_normal
    } * normal_dir;

    let offset_line = floor_mod((p - offset - origin).length(), step);
    let line_dir = if dot_line < 0.0 { 1.0 } else { -1.0 };
    let line_scale = if offset_line < threshold {
        -offset_line
    } else {
        step - offset_line
    } * line_dir;

    let mut p1 = p - n * normal_scale + tangent * line_scale;
    if scatter != 0.0 {
        let magnitude = scatter * threshold * 0.5;
        let angle = rand(p1.floor()) * TAU;
        p1 += Vec2::new(angle.cos(), angle.sin()) * magnitude;
    }

    let normal_step = normal_dir * if offset_normal < threshold { step } else { -step };
    let line_step = line_dir * if offset_line < threshold { step } else { -step };
    Cell {
        normal: n,
        centers: [
            p1,
            p1 - n * normal_step,
            p1 + tangent * line_step,
            p1 - n * normal_step + tangent * line_step,
        ],
    }
}

/// CPU halftone filter over float RGBA images.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalftoneScreen {
    params: HalftoneParams,
}

impl HalftoneScreen {
    pub fn new(params: HalftoneParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }

    pub fn params(&self) -> &HalftoneParams {
        &self.params
    }

    /// Screen `input`. Alpha of the output is 1 unless the filter is disabled,
    /// in which case the input is returned unchanged.
    pub fn apply(&self, input: &Rgba32FImage) -> Rgba32FImage {
        if self.params.disable {
            return input.clone();
        }
        let (width, height) = input.dimensions();
        let hp = &self.params;
        let size = Vec2::new(width as f32, height as f32);
        let origin = size * 0.5;
        let aa = hp.antialias();
        let angles = [hp.rotate_r, hp.rotate_g, hp.rotate_b];

        Rgba32FImage::from_fn(width, height, |x, y| {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let original = input.get_pixel(x, y).0;
            let mut rgb = [0.0f32; 3];
            for (channel, &angle) in angles.iter().enumerate() {
                let cell = reference_cell(p, origin, angle, hp.radius, hp.scatter);
                let screened = self.coverage(input, &cell, p, channel, angle, aa);
                rgb[channel] = hp.blending_mode.apply(screened, original[channel], hp.blending);
            }
            if hp.greyscale {
                let avg = (rgb[0] + rgb[1] + rgb[2]) / 3.0;
                rgb = [avg; 3];
            }
            Rgba([rgb[0], rgb[1], rgb[2], 1.0])
        })
    }

    fn coverage(
        &self,
        input: &Rgba32FImage,
        cell: &Cell,
        p: Vec2,
        channel: usize,
        angle: f32,
        aa: f32,
    ) -> f32 {
        let sum: f32 = cell
            .centers
            .iter()
            .map(|&center| {
                let intensity = self.ring_sample(input, center)[channel];
                let d = self.params.shape.edge_distance(
                    intensity,
                    center,
                    cell.normal,
                    p,
                    angle,
                    self.params.radius,
                );
                if d > 0.0 {
                    (d / aa).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            })
            .sum();
        sum.clamp(0.0, 1.0)
    }

    /// Average of the center sample and a ring of samples around it.
    fn ring_sample(&self, input: &Rgba32FImage, point: Vec2) -> Vec4 {
        let base = rand(point.floor()) * TAU;
        let step = TAU / RING_SAMPLES as f32;
        let dist = self.params.radius * RING_DISTANCE;
        let mut acc = sample_bilinear(input, point);
        for i in 0..RING_SAMPLES {
            let r = base + step * i as f32;
            acc += sample_bilinear(input, point + Vec2::new(r.cos(), r.sin()) * dist);
        }
        acc / (RING_SAMPLES as f32 + 1.0)
    }
}

/// Linear filtering with clamp-to-edge, `point` in pixel units.
fn sample_bilinear(image: &Rgba32FImage, point: Vec2) -> Vec4 {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Vec4::ZERO;
    }
    let t = point - Vec2::splat(0.5);
    let x0 = t.x.floor();
    let y0 = t.y.floor();
    let fx = t.x - x0;
    let fy = t.y - y0;
    let texel = |x: f32, y: f32| {
        let xi = (x as i64).clamp(0, w as i64 - 1) as u32;
        let yi = (y as i64).clamp(0, h as i64 - 1) as u32;
        Vec4::from_array(image.get_pixel(xi, yi).0)
    };
    let top = texel(x0, y0).lerp(texel(x0 + 1.0, y0), fx);
    let bottom = texel(x0, y0 + 1.0).lerp(texel(x0 + 1.0, y0 + 1.0), fx);
    top.lerp(bottom, fy)
}

/// Screen an image file and write the result.
pub fn halftone_file(input: &Path, output: &Path, params: &HalftoneParams) -> Result<(), EngineError> {
    let source = image::open(input)?.to_rgba32f();
    tracing::info!(
        path = %input.display(),
        width = source.width(),
        height = source.height(),
        shape = ?params.shape,
        "screening image"
    );
    let screened = HalftoneScreen::new(*params).apply(&source);
    DynamicImage::ImageRgba32F(screened).to_rgba8().save(output)?;
    tracing::info!(path = %output.display(), "wrote halftone image");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, value: f32) -> Rgba32FImage {
        Rgba32FImage::from_pixel(w, h, Rgba([value, value, value, 1.0]))
    }

    #[test]
    fn test_blend_formulas() {
        let (a, b, t) = (0.3, 0.7, 0.25);
        assert_eq!(BlendMode::Linear.apply(a, b, t), blend(a, b, 1.0 - t));
        assert_eq!(BlendMode::Add.apply(a, b, t), blend(a, 1.0, t));
        assert_eq!(BlendMode::Multiply.apply(a, b, t), blend(a, a * b, t));
        assert_eq!(BlendMode::Lighter.apply(a, b, t), blend(a, b, t));
        assert_eq!(BlendMode::Darker.apply(a, b, t), blend(a, a, t));
    }

    #[test]
    fn test_multiply_full_blend() {
        assert_eq!(BlendMode::Multiply.apply(0.8, 0.5, 1.0), 0.4);
    }

    #[test]
    fn test_ids_are_unique() {
        let shapes: Vec<u32> = Shape::ALL.iter().map(|s| s.id()).collect();
        assert_eq!(shapes, vec![1, 2, 3, 4]);
        let modes: Vec<u32> = BlendMode::ALL.iter().map(|m| m.id()).collect();
        assert_eq!(modes, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_rand_in_unit_range() {
        for i in 0..100 {
            let v = rand(Vec2::new(i as f32 * 3.7, i as f32 * 1.3));
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_reference_cell_contains_nearest_center() {
        let step = 4.0;
        for &angle in &[0.0, 0.79, 1.9, 5.9] {
            let p = Vec2::new(37.3, 21.8);
            let cell = reference_cell(p, Vec2::new(50.0, 50.0), angle, step, 0.0);
            let nearest = cell
                .centers
                .iter()
                .map(|c| c.distance(p))
                .fold(f32::MAX, f32::min);
            assert!(nearest <= step * std::f32::consts::SQRT_2 / 2.0 + 1e-3);
        }
    }

    #[test]
    fn test_zero_intensity_has_no_dot() {
        for shape in Shape::ALL {
            let d = shape.edge_distance(0.0, Vec2::ZERO, Vec2::X, Vec2::new(1.0, 1.0), 0.0, 3.6);
            assert!(d <= 0.0, "{shape:?}");
        }
    }

    #[test]
    fn test_disabled_is_identity() {
        let input = Rgba32FImage::from_fn(8, 6, |x, y| Rgba([x as f32 / 8.0, y as f32 / 6.0, 0.25, 0.5]));
        let screen = HalftoneScreen::new(HalftoneParams {
            disable: true,
            radius: 9.0,
            greyscale: true,
            ..Default::default()
        });
        assert_eq!(screen.apply(&input), input);
    }

    #[test]
    fn test_black_stays_black() {
        let out = HalftoneScreen::default().apply(&solid(16, 16, 0.0));
        assert!(out.pixels().all(|p| p.0[..3] == [0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_white_is_mostly_covered() {
        let out = HalftoneScreen::new(HalftoneParams::default()).apply(&solid(16, 16, 1.0));
        assert!(out.pixels().all(|p| p.0[0] > 0.8 && p.0[1] > 0.8 && p.0[2] > 0.8));
    }

    #[test]
    fn test_greyscale_equalizes_channels() {
        let input = Rgba32FImage::from_fn(12, 12, |x, _| Rgba([x as f32 / 12.0, 0.2, 0.9, 1.0]));
        let out = HalftoneScreen::new(HalftoneParams {
            greyscale: true,
            blending: 0.5,
            ..Default::default()
        })
        .apply(&input);
        assert!(out.pixels().all(|p| p.0[0] == p.0[1] && p.0[1] == p.0[2]));
    }
}
