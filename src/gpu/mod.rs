//! GPU render pipeline.
//!
//! Five passes per frame:
//!
//! 1. trail sprites into an offscreen buffer
//! 2. horizontal blur
//! 3. vertical blur
//! 4. halftone screen of the blurred buffer onto the output view
//! 5. node sprites on top, alpha blended
//!
//! All offscreen buffers are sized to the output and reallocated on
//! [`Renderer::resize`] before the next frame reads them.

pub mod blur;
pub mod halftone;
pub mod shaders;
pub mod sprites;
pub mod targets;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::GpuError;
use crate::params::Params;
use crate::trail::TrailPoint;

use blur::BlurPass;
use halftone::HalftonePass;
use sprites::{SpriteInstance, SpritePass};
use targets::{create_linear_sampler, RenderTargets};

/// Adapter, device and queue shared by the engine and its renderer.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    })
}

/// Request an adapter (compatible with `surface` if given) and a device.
pub async fn request_context(
    instance: wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<GpuContext, GpuError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(GpuError::NoAdapter)?;

    let info = adapter.get_info();
    tracing::info!(adapter = %info.name, backend = ?info.backend, "GPU adapter selected");

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Screenprint Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;

    Ok(GpuContext {
        instance,
        adapter,
        device: Arc::new(device),
        queue: Arc::new(queue),
    })
}

/// Context without a surface, for offscreen rendering and tests.
pub fn create_headless_context() -> Result<GpuContext, GpuError> {
    pollster::block_on(request_context(create_instance(), None))
}

/// Pick a surface format. Non-sRGB is preferred: colors are written as-is.
pub fn preferred_surface_format(caps: &wgpu::SurfaceCapabilities) -> Option<wgpu::TextureFormat> {
    caps.formats
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| caps.formats.first())
        .copied()
}

/// Lifecycle of a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Created, nothing allocated yet.
    Uninitialized,
    /// Programs and buffers allocated.
    Ready,
    /// At least one frame rendered.
    Rendering,
    /// Resources released; every call is a no-op.
    Disposed,
    /// Initialization failed or the device was lost; never renders.
    Failed,
}

impl PipelineState {
    pub fn can_render(self) -> bool {
        matches!(self, PipelineState::Ready | PipelineState::Rendering)
    }

    /// The state once the device is gone. Disposal is final.
    pub fn after_device_loss(self) -> Self {
        match self {
            PipelineState::Disposed => PipelineState::Disposed,
            _ => PipelineState::Failed,
        }
    }
}

/// Set by the device-lost callback, read before every frame.
#[derive(Debug, Clone, Default)]
pub struct DeviceLoss(Arc<AtomicBool>);

impl DeviceLoss {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register on `device`; replaces any callback installed earlier.
    pub fn watch(device: &wgpu::Device) -> Self {
        let loss = Self::new();
        let flag = loss.clone();
        device.set_device_lost_callback(move |reason, message| {
            tracing::error!(?reason, %message, "GPU device lost");
            flag.mark_lost();
        });
        loss
    }

    pub fn mark_lost(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_lost(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Passes {
    targets: RenderTargets,
    sampler: wgpu::Sampler,
    sprites: SpritePass,
    blur: BlurPass,
    halftone: HalftonePass,
}

impl Passes {
    fn destroy(self) {
        let Passes {
            targets,
            sampler,
            sprites,
            blur,
            halftone,
        } = self;
        // bind groups reference the target views; release them first
        halftone.destroy();
        blur.destroy();
        sprites.destroy();
        drop(sampler);
        targets.destroy();
    }
}

/// Owns every GPU resource of the compositor.
pub struct Renderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    output_format: wgpu::TextureFormat,
    max_nodes: usize,
    state: PipelineState,
    loss: DeviceLoss,
    passes: Option<Passes>,
    trail_sprites: Vec<SpriteInstance>,
    node_sprites: Vec<SpriteInstance>,
}

impl Renderer {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        output_format: wgpu::TextureFormat,
        max_nodes: usize,
    ) -> Self {
        let loss = DeviceLoss::watch(&device);
        Self {
            device,
            queue,
            output_format,
            max_nodes,
            state: PipelineState::Uninitialized,
            loss,
            passes: None,
            trail_sprites: Vec::new(),
            node_sprites: Vec::with_capacity(max_nodes),
        }
    }

    pub fn state(&self) -> PipelineState {
        if self.loss.is_lost() {
            self.state.after_device_loss()
        } else {
            self.state
        }
    }

    pub fn device_loss(&self) -> &DeviceLoss {
        &self.loss
    }

    /// Commit a pending device loss. Returns true when rendering may proceed.
    fn check_device(&mut self) -> bool {
        if self.loss.is_lost() && self.state != self.state.after_device_loss() {
            self.state = self.state.after_device_loss();
            tracing::warn!("render pipeline failed: device lost");
        }
        self.state.can_render()
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    /// Current target size, if initialized.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.passes
            .as_ref()
            .map(|p| (p.targets.width, p.targets.height))
    }

    /// Compile every shader and allocate buffers. Any validation error moves
    /// the renderer to `Failed`.
    pub fn initialize(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        if self.state != PipelineState::Uninitialized {
            return Ok(());
        }
        if self.loss.is_lost() {
            self.state = PipelineState::Failed;
            return Err(GpuError::ContextLost);
        }
        let device = &self.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let targets = RenderTargets::new(device, width, height);
        let sampler = create_linear_sampler(device);
        let sprites = SpritePass::new(device, self.output_format, self.max_nodes, width, height);
        let blur = BlurPass::new(device, &targets, &sampler);
        let halftone = HalftonePass::new(device, &targets, &sampler, self.output_format);

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            self.state = PipelineState::Failed;
            tracing::error!(error = %err, "render pipeline failed to build");
            return Err(GpuError::Shader {
                label: "render pipeline",
                message: err.to_string(),
            });
        }

        self.passes = Some(Passes {
            targets,
            sampler,
            sprites,
            blur,
            halftone,
        });
        self.state = PipelineState::Ready;
        tracing::info!(width, height, format = ?self.output_format, "render pipeline ready");
        Ok(())
    }

    /// Reallocate the offscreen buffers for a new output size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.check_device() {
            return;
        }
        let Some(passes) = self.passes.as_mut() else {
            return;
        };
        if (passes.targets.width, passes.targets.height) == (width.max(1), height.max(1)) {
            return;
        }
        let fresh = RenderTargets::new(&self.device, width, height);
        passes.blur.rebind(&self.device, &fresh, &passes.sampler);
        passes.halftone.rebind(&self.device, &fresh, &passes.sampler);
        std::mem::replace(&mut passes.targets, fresh).destroy();
        passes.sprites.resize(&self.queue, width, height);
        tracing::debug!(width, height, "render targets resized");
    }

    /// Draw one frame into `view`, which must match the current size.
    /// Returns false when the renderer is not in a renderable state. A
    /// validation error while encoding, or a lost device, moves it to `Failed`.
    pub fn render_frame<'a>(
        &mut self,
        view: &wgpu::TextureView,
        entities: impl Iterator<Item = &'a Entity>,
        trails: impl Iterator<Item = &'a TrailPoint>,
        params: &Params,
    ) -> bool {
        if !self.check_device() {
            tracing::debug!(state = ?self.state, "render skipped");
            return false;
        }
        let Some(passes) = self.passes.as_mut() else {
            return false;
        };

        let trail = &params.trail;
        self.trail_sprites.clear();
        self.trail_sprites.extend(trails.map(|p| {
            SpriteInstance::new(p.position, trail.size, p.tone(trail).extend(p.alpha(trail)))
        }));
        self.node_sprites.clear();
        self.node_sprites.extend(
            entities.map(|e| SpriteInstance::new(e.position, params.node_size, e.color.extend(1.0))),
        );

        let (width, height) = (passes.targets.width, passes.targets.height);
        passes
            .sprites
            .upload(&self.device, &self.queue, &self.trail_sprites, &self.node_sprites);
        passes.blur.update(&self.queue, trail.blur_size, width, height);
        passes.halftone.update(&self.queue, &params.halftone, width, height);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let [r, g, b] = params.background.map(f64::from);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Trail Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &passes.targets.trail.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a: 0.0 }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            passes.sprites.draw_trails(&mut pass);
        }

        passes.blur.encode(&mut encoder, &passes.targets);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a: 1.0 }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            passes.halftone.draw(&mut pass);
            passes.sprites.draw_nodes(&mut pass);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            self.state = PipelineState::Failed;
            tracing::error!(error = %err, "frame failed validation");
            return false;
        }
        if !self.check_device() {
            return false;
        }
        self.state = PipelineState::Rendering;
        true
    }

    /// Read back the blurred trail buffer (the halftone input) as RGBA8.
    pub fn read_blurred(&self) -> Result<Vec<u8>, GpuError> {
        let passes = self.passes.as_ref().ok_or(GpuError::NotInitialized)?;
        let t = &passes.targets;
        read_rgba8(&self.device, &self.queue, &t.blurred.texture, t.width, t.height)
    }

    /// Release everything. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.state == PipelineState::Disposed {
            return;
        }
        if let Some(passes) = self.passes.take() {
            passes.destroy();
        }
        self.trail_sprites = Vec::new();
        self.node_sprites = Vec::new();
        self.state = PipelineState::Disposed;
        tracing::info!("render pipeline disposed");
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Copy a 4-byte-per-pixel texture back to the CPU, row padding removed.
pub fn read_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, GpuError> {
    let unpadded_bytes_per_row = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: (padded_bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| GpuError::BufferMapping(e.to_string()))?
        .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

    let data = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
    for y in 0..height {
        let start = (y * padded_bytes_per_row) as usize;
        pixels.extend_from_slice(&data[start..start + unpadded_bytes_per_row as usize]);
    }
    drop(data);
    staging.unmap();
    Ok(pixels)
}
