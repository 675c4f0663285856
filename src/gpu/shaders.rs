//! WGSL sources for the render passes.
//!
//! Sprite and blur shaders are fixed. The halftone shader is assembled from
//! the [`Shape`] and [`BlendMode`] variants so the GPU switch and the CPU
//! reference cannot drift apart.

use crate::halftone::{BlendMode, Shape, RING_DISTANCE, RING_SAMPLES};

/// Blur weights indexed by tap distance; tap 0 is the center.
pub const BLUR_WEIGHTS: [f32; 8] = [
    0.1541, 0.1414, 0.1239, 0.1041, 0.0839, 0.0647, 0.0478, 0.0338,
];

/// Full-screen triangle shared by the blur and halftone passes. Emits `uv`
/// with a top-left origin.
const FULLSCREEN_VERTEX: &str = r#"
struct FullscreenOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> FullscreenOut {
    let x = f32((vi << 1u) & 2u);
    let y = f32(vi & 2u);
    var out: FullscreenOut;
    out.position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
    out.uv = vec2<f32>(x, y);
    return out;
}
"#;

/// Instanced quad sprites in pixel space (y down). `fs_trail` fades from
/// the center outward, `fs_node` is a hard disc.
pub const SPRITE_SHADER: &str = r#"
struct SpriteUniforms {
    resolution: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: SpriteUniforms;

struct SpriteIn {
    @location(0) center: vec2<f32>,
    @location(1) size: f32,
    @location(2) color: vec4<f32>,
};

struct SpriteOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32, sprite: SpriteIn) -> SpriteOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let uv = corners[vi];
    let pixel = sprite.center + uv * sprite.size * 0.5;
    var out: SpriteOut;
    out.clip = vec4<f32>(
        pixel.x / u.resolution.x * 2.0 - 1.0,
        1.0 - pixel.y / u.resolution.y * 2.0,
        0.0,
        1.0,
    );
    out.uv = uv;
    out.color = sprite.color;
    return out;
}

@fragment
fn fs_trail(in: SpriteOut) -> @location(0) vec4<f32> {
    let falloff = 1.0 - smoothstep(0.4, 1.0, length(in.uv));
    return vec4<f32>(in.color.rgb, in.color.a * falloff);
}

@fragment
fn fs_node(in: SpriteOut) -> @location(0) vec4<f32> {
    if (length(in.uv) > 1.0) {
        discard;
    }
    return in.color;
}
"#;

/// Separable 15-tap Gaussian blur along `direction`.
pub fn blur_shader() -> String {
    let weights = BLUR_WEIGHTS
        .iter()
        .map(|w| format!("{w:.4}"))
        .collect::<Vec<_>>()
        .join(", ");
    let taps = BLUR_WEIGHTS.len() as i32 - 1;
    format!(
        r#"
struct BlurUniforms {{
    direction: vec2<f32>,
    resolution: vec2<f32>,
    blur_size: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}};

@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var samp: sampler;
@group(0) @binding(2) var<uniform> u: BlurUniforms;

var<private> WEIGHTS: array<f32, {len}> = array<f32, {len}>({weights});
{FULLSCREEN_VERTEX}
@fragment
fn fs_main(in: FullscreenOut) -> @location(0) vec4<f32> {{
    let stride = u.blur_size / u.resolution * u.direction;
    var color = vec4<f32>(0.0);
    var total = 0.0;
    for (var i = -{taps}; i <= {taps}; i += 1) {{
        let w = WEIGHTS[abs(i)];
        color += textureSampleLevel(src, samp, in.uv + f32(i) * stride, 0.0) * w;
        total += w;
    }}
    return color / total;
}}
"#,
        len = BLUR_WEIGHTS.len(),
    )
}

fn shape_switch() -> String {
    let arms: String = Shape::ALL
        .iter()
        .map(|shape| {
            format!(
                "        case {id}u: {{\n            {body}\n        }}\n",
                id = shape.id(),
                body = shape.to_wgsl()
            )
        })
        .collect();
    format!("    switch u.shape {{\n{arms}        default: {{}}\n    }}\n")
}

fn blend_switch() -> String {
    let arms: String = BlendMode::ALL
        .iter()
        .map(|mode| {
            format!(
                "        case {id}u: {{ out = {expr}; }}\n",
                id = mode.id(),
                expr = mode.to_wgsl_expr()
            )
        })
        .collect();
    format!("    switch u.blending_mode {{\n{arms}        default: {{}}\n    }}\n")
}

/// Per-channel halftone screen over the blurred trail buffer.
pub fn halftone_shader() -> String {
    let shapes = shape_switch();
    let blends = blend_switch();
    let linear = BlendMode::Linear.to_wgsl_expr();
    format!(
        r#"
struct HalftoneUniforms {{
    radius: f32,
    rotate_r: f32,
    rotate_g: f32,
    rotate_b: f32,
    scatter: f32,
    width: f32,
    height: f32,
    blending: f32,
    shape: u32,
    blending_mode: u32,
    greyscale: u32,
    disable: u32,
}};

@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var samp: sampler;
@group(0) @binding(2) var<uniform> u: HalftoneUniforms;

const SQRT2_MINUS_ONE: f32 = 0.41421356;
const SQRT2_HALF_MINUS_ONE: f32 = 0.20710678;
const TAU: f32 = 6.28318531;
const RING_SAMPLES: i32 = {ring_samples};
const RING_DISTANCE: f32 = {ring_distance:.2};
{FULLSCREEN_VERTEX}
struct Cell {{
    normal: vec2<f32>,
    p1: vec2<f32>,
    p2: vec2<f32>,
    p3: vec2<f32>,
    p4: vec2<f32>,
}};

fn blend(a: f32, b: f32, t: f32) -> f32 {{
    return a * (1.0 - t) + b * t;
}}

fn rand(seed: vec2<f32>) -> f32 {{
    return fract(sin(dot(seed, vec2<f32>(12.9898, 78.233))) * 43758.5453);
}}

fn floor_mod(x: f32, y: f32) -> f32 {{
    return x - y * floor(x / y);
}}

fn edge_distance(channel: f32, coord: vec2<f32>, normal: vec2<f32>, p: vec2<f32>, angle: f32, rad_max: f32) -> f32 {{
    var dist = distance(coord, p);
    var rad = channel;
{shapes}    return rad - dist;
}}

fn ring_sample(point: vec2<f32>) -> vec4<f32> {{
    let size = vec2<f32>(u.width, u.height);
    var acc = textureSampleLevel(src, samp, point / size, 0.0);
    let base = rand(floor(point)) * TAU;
    let arc = TAU / f32(RING_SAMPLES);
    let dist = u.radius * RING_DISTANCE;
    for (var i = 0; i < RING_SAMPLES; i += 1) {{
        let r = base + arc * f32(i);
        let coord = point + vec2<f32>(cos(r), sin(r)) * dist;
        acc += textureSampleLevel(src, samp, coord / size, 0.0);
    }}
    return acc / (f32(RING_SAMPLES) + 1.0);
}}

fn reference_cell(p: vec2<f32>, origin: vec2<f32>, grid_angle: f32, grid: f32) -> Cell {{
    let n = vec2<f32>(cos(grid_angle), sin(grid_angle));
    let tangent = vec2<f32>(n.y, -n.x);
    let threshold = grid * 0.5;
    let rel = p - origin;
    let dot_normal = dot(n, rel);
    let dot_line = -n.y * rel.x + n.x * rel.y;
    let offset = n * dot_normal;

    let offset_normal = floor_mod(length(offset), grid);
    let normal_dir = select(-1.0, 1.0, dot_normal < 0.0);
    let normal_scale = select(grid - offset_normal, -offset_normal, offset_normal < threshold) * normal_dir;

    let offset_line = floor_mod(length(p - offset - origin), grid);
    let line_dir = select(-1.0, 1.0, dot_line < 0.0);
    let line_scale = select(grid - offset_line, -offset_line, offset_line < threshold) * line_dir;

    var p1 = p - n * normal_scale + tangent * line_scale;
    if (u.scatter != 0.0) {{
        let magnitude = u.scatter * threshold * 0.5;
        let jitter = rand(floor(p1)) * TAU;
        p1 += vec2<f32>(cos(jitter), sin(jitter)) * magnitude;
    }}

    let normal_step = normal_dir * select(-grid, grid, offset_normal < threshold);
    let line_step = line_dir * select(-grid, grid, offset_line < threshold);
    var c: Cell;
    c.normal = n;
    c.p1 = p1;
    c.p2 = p1 - n * normal_step;
    c.p3 = p1 + tangent * line_step;
    c.p4 = p1 - n * normal_step + tangent * line_step;
    return c;
}}

fn dot_coverage(center: vec2<f32>, normal: vec2<f32>, p: vec2<f32>, channel: u32, angle: f32, aa: f32) -> f32 {{
    let avg = ring_sample(center);
    let d = edge_distance(avg[channel], center, normal, p, angle, u.radius);
    return select(0.0, clamp(d / aa, 0.0, 1.0), d > 0.0);
}}

fn screen(c: Cell, p: vec2<f32>, channel: u32, angle: f32, aa: f32) -> f32 {{
    let sum = dot_coverage(c.p1, c.normal, p, channel, angle, aa)
        + dot_coverage(c.p2, c.normal, p, channel, angle, aa)
        + dot_coverage(c.p3, c.normal, p, channel, angle, aa)
        + dot_coverage(c.p4, c.normal, p, channel, angle, aa);
    return clamp(sum, 0.0, 1.0);
}}

fn blend_mode(a: f32, b: f32, t: f32) -> f32 {{
    var out = {linear};
{blends}    return out;
}}

@fragment
fn fs_main(in: FullscreenOut) -> @location(0) vec4<f32> {{
    let original = textureLoad(src, vec2<i32>(in.position.xy), 0);
    if (u.disable != 0u) {{
        return original;
    }}
    let p = in.position.xy;
    let origin = vec2<f32>(u.width, u.height) * 0.5;
    let aa = select(1.25, u.radius * 0.5, u.radius < 2.5);

    let r = screen(reference_cell(p, origin, u.rotate_r, u.radius), p, 0u, u.rotate_r, aa);
    let g = screen(reference_cell(p, origin, u.rotate_g, u.radius), p, 1u, u.rotate_g, aa);
    let b = screen(reference_cell(p, origin, u.rotate_b, u.radius), p, 2u, u.rotate_b, aa);

    var rgb = vec3<f32>(
        blend_mode(r, original.r, u.blending),
        blend_mode(g, original.g, u.blending),
        blend_mode(b, original.b, u.blending),
    );
    if (u.greyscale != 0u) {{
        rgb = vec3<f32>((rgb.r + rgb.g + rgb.b) / 3.0);
    }}
    return vec4<f32>(rgb, 1.0);
}}
"#,
        ring_samples = RING_SAMPLES,
        ring_distance = RING_DISTANCE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halftone_shader_has_every_variant() {
        let src = halftone_shader();
        for shape in Shape::ALL {
            assert!(src.contains(&format!("case {}u:", shape.id())), "{shape:?}");
        }
        for mode in BlendMode::ALL {
            assert!(src.contains(mode.to_wgsl_expr()), "{mode:?}");
        }
    }

    #[test]
    fn test_blur_shader_embeds_weights() {
        let src = blur_shader();
        assert!(src.contains("array<f32, 8>(0.1541, 0.1414"));
        assert!(src.contains("for (var i = -7; i <= 7; i += 1)"));
    }
}
