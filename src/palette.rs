//! Category colors and the tone adjustment applied to trail samples.
//!
//! [`CategoryPalette`] behaves like an ordinal scale: labels are assigned
//! range colors in the order they are first seen, cycling when the range runs
//! out. Explicit assignments replace the color for that label only.

use glam::Vec3;

use crate::params::TrailParams;

/// Default category range.
pub const DEFAULT_RANGE: [&str; 8] = [
    "#C3CF19", "#559A69", "#438FB5", "#2A4E90", "#282C68", "#77247F", "#D21F75", "#E77E9B",
];

/// Parse `#rrggbb` (or `rrggbb`, or `#rgb`) into RGB 0.0-1.0.
pub fn parse_hex(hex: &str) -> Option<Vec3> {
    let digits = hex.trim().trim_start_matches('#');
    if !digits.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
    match digits.len() {
        6 => Some(Vec3::new(
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )),
        3 => {
            let expand = |i: usize| channel(&digits[i..i + 1].repeat(2));
            Some(Vec3::new(expand(0)?, expand(1)?, expand(2)?))
        }
        _ => None,
    }
}

/// Order-preserving category → color mapping.
#[derive(Debug, Clone)]
pub struct CategoryPalette {
    domain: Vec<String>,
    colors: Vec<Vec3>,
    range: Vec<Vec3>,
}

impl Default for CategoryPalette {
    fn default() -> Self {
        Self::new(DEFAULT_RANGE.iter().filter_map(|h| parse_hex(h)).collect())
    }
}

impl CategoryPalette {
    /// Create a palette cycling through `range`. An empty range falls back to black.
    pub fn new(range: Vec<Vec3>) -> Self {
        Self {
            domain: Vec::new(),
            colors: Vec::new(),
            range: if range.is_empty() { vec![Vec3::ZERO] } else { range },
        }
    }

    /// Seed the domain with labels in a fixed order.
    pub fn with_domain<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for label in labels {
            let label = label.into();
            self.color(&label);
        }
        self
    }

    /// Color for `label`, assigning the next range color on first sight.
    pub fn color(&mut self, label: &str) -> Vec3 {
        if let Some(idx) = self.domain.iter().position(|d| d == label) {
            return self.colors[idx];
        }
        let color = self.range[self.domain.len() % self.range.len()];
        self.domain.push(label.to_string());
        self.colors.push(color);
        color
    }

    /// Color for `label` without extending the domain.
    pub fn get(&self, label: &str) -> Option<Vec3> {
        self.domain
            .iter()
            .position(|d| d == label)
            .map(|idx| self.colors[idx])
    }

    /// Override the color for one label.
    pub fn set(&mut self, label: &str, color: Vec3) {
        match self.domain.iter().position(|d| d == label) {
            Some(idx) => self.colors[idx] = color,
            None => {
                self.domain.push(label.to_string());
                self.colors.push(color);
            }
        }
    }

    pub fn domain(&self) -> &[String] {
        &self.domain
    }
}

/// RGB (0-1) to HSL with hue in degrees.
pub fn rgb_to_hsl(rgb: Vec3) -> (f32, f32, f32) {
    let max = rgb.max_element();
    let min = rgb.min_element();
    let l = (max + min) / 2.0;
    let d = max - min;
    if d == 0.0 {
        return (0.0, 0.0, l);
    }
    let s = if l < 0.5 { d / (max + min) } else { d / (2.0 - max - min) };
    let h = if max == rgb.x {
        (rgb.y - rgb.z) / d + if rgb.y < rgb.z { 6.0 } else { 0.0 }
    } else if max == rgb.y {
        (rgb.z - rgb.x) / d + 2.0
    } else {
        (rgb.x - rgb.y) / d + 4.0
    };
    (h * 60.0, s, l)
}

/// HSL (hue in degrees) back to RGB.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Vec3 {
    let h = h.rem_euclid(360.0);
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    let hue = |h: f32| {
        let h = h.rem_euclid(360.0);
        let v = if h < 60.0 {
            m1 + (m2 - m1) * h / 60.0
        } else if h < 180.0 {
            m2
        } else if h < 240.0 {
            m1 + (m2 - m1) * (240.0 - h) / 60.0
        } else {
            m1
        };
        v.clamp(0.0, 1.0)
    };
    Vec3::new(hue(h + 120.0), hue(h), hue(h - 120.0))
}

/// Soften a node color for its trail: saturation is scaled against the
/// original lightness, lightness is remapped around `lightness_base`.
///
/// Saturation is only capped above: a lightness past `saturation_scale`
/// yields a negative saturation, which flips the hue to its complement.
pub fn trail_tone(color: Vec3, trail: &TrailParams) -> Vec3 {
    let (h, s, l) = rgb_to_hsl(color);
    let saturation = (s * (trail.saturation_scale - l)).min(1.0);
    let lightness = (trail.lightness_base
        - trail.lightness_contrast * (std::f32::consts::PI * l).cos())
    .clamp(0.0, 1.0);
    hsl_to_rgb(h, saturation, lightness)
}
