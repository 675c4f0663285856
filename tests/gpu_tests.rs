//! Render pipeline tests against a headless device.
//!
//! Ignored by default; run with `cargo test -- --ignored` on a machine with
//! a GPU adapter.

use screenprint::gpu::{create_headless_context, read_rgba8, GpuContext, Renderer};
use screenprint::GpuError;
use screenprint::{
    Engine, EntityRecord, ManualScheduler, ParamChange, Params, PipelineState,
};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn output_texture(gpu: &GpuContext, width: u32, height: u32) -> wgpu::Texture {
    gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Output"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn records(n: usize) -> Vec<EntityRecord> {
    (0..n)
        .map(|i| EntityRecord {
            id: format!("e{i}"),
            name: format!("Entity {i}"),
            supertype: Some(["a", "b"][i % 2].to_string()),
            ..Default::default()
        })
        .collect()
}

/// Run `frames` scheduled frame callbacks.
fn pump(engine: &mut Engine<ManualScheduler>, view: &wgpu::TextureView, frames: usize) {
    for _ in 0..frames {
        if engine.scheduler_mut().take_pending() {
            engine.frame(view);
        }
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn disabled_halftone_passes_blurred_buffer_through() {
    let gpu = create_headless_context().unwrap();
    let (w, h) = (160, 120);
    let params = Params {
        spawn_delay_ms: 50.0,
        ..Default::default()
    };
    let mut engine = Engine::new(&gpu, FORMAT, w, h, params, ManualScheduler::new()).unwrap();
    engine.set_data(&records(4));
    engine.apply(ParamChange::DisableHalftone(true));
    engine.apply(ParamChange::Scatter(3.0));

    let target = output_texture(&gpu, w, h);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    pump(&mut engine, &view, 30);
    assert_eq!(engine.state(), PipelineState::Rendering);

    let output = read_rgba8(&gpu.device, &gpu.queue, &target, w, h).unwrap();
    let blurred = engine.renderer().read_blurred().unwrap();
    assert_eq!(output.len(), blurred.len());

    // nodes are drawn on top of the halftone output; compare everywhere else
    let reach = engine.params().node_size * 0.5 + 1.5;
    let nodes: Vec<_> = engine.simulation().active().map(|e| e.position).collect();
    let mut compared = 0;
    for y in 0..h {
        for x in 0..w {
            let p = glam::Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            if nodes.iter().any(|n| n.distance(p) <= reach) {
                continue;
            }
            let i = ((y * w + x) * 4) as usize;
            assert_eq!(output[i..i + 4], blurred[i..i + 4], "pixel ({x}, {y})");
            compared += 1;
        }
    }
    assert!(compared > 0);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn empty_dataset_renders_background() {
    let gpu = create_headless_context().unwrap();
    let (w, h) = (64, 64);
    let params = Params {
        background: [1.0, 1.0, 1.0],
        ..Default::default()
    };
    let mut engine = Engine::new(&gpu, FORMAT, w, h, params, ManualScheduler::new()).unwrap();
    let target = output_texture(&gpu, w, h);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    pump(&mut engine, &view, 3);

    // the halftone of an all-white buffer saturates every channel
    let output = read_rgba8(&gpu.device, &gpu.queue, &target, w, h).unwrap();
    assert!(output.chunks(4).all(|px| px[0] > 200 && px[1] > 200 && px[2] > 200));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn resize_then_render_at_new_size() {
    let gpu = create_headless_context().unwrap();
    let mut engine =
        Engine::new(&gpu, FORMAT, 100, 80, Params::default(), ManualScheduler::new()).unwrap();
    engine.set_data(&records(3));

    let small = output_texture(&gpu, 100, 80);
    let view = small.create_view(&wgpu::TextureViewDescriptor::default());
    pump(&mut engine, &view, 5);

    engine.resize(220, 140);
    assert_eq!(engine.renderer().size(), Some((220, 140)));
    let large = output_texture(&gpu, 220, 140);
    let view = large.create_view(&wgpu::TextureViewDescriptor::default());
    pump(&mut engine, &view, 5);

    let blurred = engine.renderer().read_blurred().unwrap();
    assert_eq!(blurred.len(), 220 * 140 * 4);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn dispose_is_idempotent_and_final() {
    let gpu = create_headless_context().unwrap();
    let mut engine =
        Engine::new(&gpu, FORMAT, 64, 64, Params::default(), ManualScheduler::new()).unwrap();
    let target = output_texture(&gpu, 64, 64);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    pump(&mut engine, &view, 2);

    engine.dispose();
    engine.dispose();
    assert!(engine.is_disposed());
    assert!(!engine.is_running());
    assert!(!engine.scheduler_mut().is_pending());
    assert!(!engine.frame(&view));
    engine.resize(128, 128);
    assert_eq!(engine.state(), PipelineState::Disposed);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn lost_device_fails_the_pipeline() {
    let gpu = create_headless_context().unwrap();
    let mut engine =
        Engine::new(&gpu, FORMAT, 64, 64, Params::default(), ManualScheduler::new()).unwrap();
    engine.set_data(&records(2));
    let target = output_texture(&gpu, 64, 64);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    pump(&mut engine, &view, 2);
    assert_eq!(engine.state(), PipelineState::Rendering);

    engine.renderer().device_loss().mark_lost();
    assert_eq!(engine.state(), PipelineState::Failed);
    assert!(!engine.frame(&view));
    engine.dispose();
    assert_eq!(engine.state(), PipelineState::Disposed);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn readback_before_initialize_is_not_initialized() {
    let gpu = create_headless_context().unwrap();
    let renderer = Renderer::new(gpu.device.clone(), gpu.queue.clone(), FORMAT, 8);
    assert_eq!(renderer.state(), PipelineState::Uninitialized);
    assert!(matches!(renderer.read_blurred(), Err(GpuError::NotInitialized)));
}
