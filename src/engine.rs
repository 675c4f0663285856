//! Engine facade.
//!
//! [`Engine`] ties the CPU simulation, the render pipeline and the animation
//! driver together behind the interface the outside world uses: load a
//! dataset, change parameters, resize, render frames, dispose.

use glam::{Vec2, Vec3};

use crate::driver::{AnimationDriver, FrameScheduler};
use crate::entity::{Entity, EntityRecord};
use crate::error::GpuError;
use crate::gpu::{GpuContext, PipelineState, Renderer};
use crate::palette::CategoryPalette;
use crate::params::{ParamChange, Params};
use crate::simulation::Simulation;
use crate::time::FrameClock;

pub struct Engine<S: FrameScheduler> {
    simulation: Simulation,
    renderer: Renderer,
    driver: AnimationDriver<S>,
    width: u32,
    height: u32,
}

impl<S: FrameScheduler> Engine<S> {
    /// Build the render pipeline and start the animation loop.
    ///
    /// Fails if any pass fails to build; no frame is ever requested then.
    pub fn new(
        gpu: &GpuContext,
        output_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        params: Params,
        scheduler: S,
    ) -> Result<Self, GpuError> {
        Self::with_clock(
            gpu,
            output_format,
            (width, height),
            params,
            CategoryPalette::default(),
            AnimationDriver::new(scheduler),
        )
    }

    /// Like [`Engine::new`] with an explicit palette and frame clock.
    pub fn with_clock(
        gpu: &GpuContext,
        output_format: wgpu::TextureFormat,
        (width, height): (u32, u32),
        params: Params,
        palette: CategoryPalette,
        mut driver: AnimationDriver<S>,
    ) -> Result<Self, GpuError> {
        let (width, height) = (width.max(1), height.max(1));
        let params = params.clamped();
        let mut renderer = Renderer::new(
            gpu.device.clone(),
            gpu.queue.clone(),
            output_format,
            params.max_active,
        );
        renderer.initialize(width, height)?;

        let simulation = Simulation::with_palette(
            params,
            Vec2::new(width as f32, height as f32),
            palette,
        );
        driver.start();

        Ok(Self {
            simulation,
            renderer,
            driver,
            width,
            height,
        })
    }

    /// Replace the dataset. An empty list renders an empty canvas.
    pub fn set_data(&mut self, records: &[EntityRecord]) {
        self.simulation.set_data(records);
    }

    /// Apply one live parameter change.
    pub fn apply(&mut self, change: ParamChange) {
        self.simulation.apply(change);
    }

    /// Apply every change in order.
    pub fn apply_all(&mut self, changes: impl IntoIterator<Item = ParamChange>) {
        for change in changes {
            self.apply(change);
        }
    }

    /// Viewport changed. Buffers are reallocated before the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.renderer.resize(width, height);
        self.simulation
            .resize(Vec2::new(width as f32, height as f32));
        tracing::info!(width, height, "engine resized");
    }

    /// One frame callback: tick the simulation and draw into `view`.
    ///
    /// `view` must be `width × height` in the engine's output format.
    /// Returns false when the loop is stopped or the pipeline cannot render.
    pub fn frame(&mut self, view: &wgpu::TextureView) -> bool {
        if !self.renderer.state().can_render() {
            tracing::debug!(state = ?self.renderer.state(), "frame skipped");
            return false;
        }
        let simulation = &mut self.simulation;
        let renderer = &mut self.renderer;
        let mut rendered = false;
        self.driver.tick(|timestamp_ms| {
            simulation.step(timestamp_ms);
            rendered = renderer.render_frame(
                view,
                simulation.active(),
                simulation.trail_points(),
                simulation.params(),
            );
        });
        rendered
    }

    /// Spawn from the first entity again with fresh trails.
    pub fn restart(&mut self) {
        self.simulation.restart();
        self.driver.reset_clock();
    }

    /// Clear nodes and trails without rewinding the spawn order.
    pub fn remove_all(&mut self) {
        self.simulation.remove_all();
    }

    /// Recolor a category. Returns how many entities changed.
    pub fn set_category_color(&mut self, category: &str, color: Vec3) -> usize {
        self.simulation.set_category_color(category, color)
    }

    /// Details of one entity by id.
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.simulation.entity(id)
    }

    /// Stop the loop, then release every GPU resource. Idempotent.
    pub fn dispose(&mut self) {
        self.driver.stop();
        self.renderer.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.renderer.state() == PipelineState::Disposed
    }

    pub fn state(&self) -> PipelineState {
        self.renderer.state()
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn params(&self) -> &Params {
        self.simulation.params()
    }

    pub fn clock(&self) -> &FrameClock {
        self.driver.clock()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        self.driver.scheduler_mut()
    }
}

impl<S: FrameScheduler> Drop for Engine<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
