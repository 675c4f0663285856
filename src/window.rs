//! Windowed host for the engine.
//!
//! A winit [`ApplicationHandler`] owns the window, its surface and one
//! [`Engine`]. Redraw requests are the frame scheduler: each rendered frame
//! asks for the next one.
//!
//! Keys: `R` restarts the animation, `C` clears the canvas, `G` toggles
//! grouping, `H` toggles the halftone screen, `Y` toggles greyscale, `Esc`
//! quits.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::driver::FrameScheduler;
use crate::engine::Engine;
use crate::entity::EntityRecord;
use crate::error::{EngineError, GpuError};
use crate::gpu::{self, preferred_surface_format};
use crate::params::{ParamChange, Params};

/// Frame scheduler backed by window redraw requests.
pub struct WindowScheduler {
    window: Arc<Window>,
}

impl WindowScheduler {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) {
        self.window.request_redraw();
    }

    /// No-op: a redraw already queued still arrives, and `Host::redraw`
    /// drops it because the engine is no longer running.
    fn cancel(&mut self) {}
}

// Field order is drop order: engine before surface before window.
struct Host {
    engine: Engine<WindowScheduler>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: Arc<wgpu::Device>,
    window: Arc<Window>,
}

impl Host {
    fn new(
        event_loop: &ActiveEventLoop,
        params: &Params,
        records: &[EntityRecord],
    ) -> Result<Self, EngineError> {
        let window_attrs = Window::default_attributes()
            .with_title("screenprint")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 800));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let instance = gpu::create_instance();
        let surface = instance
            .create_surface(window.clone())
            .map_err(GpuError::from)?;
        let ctx = pollster::block_on(gpu::request_context(instance, Some(&surface)))?;

        let caps = surface.get_capabilities(&ctx.adapter);
        let format = preferred_surface_format(&caps).ok_or(GpuError::NoAdapter)?;
        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&ctx.device, &config);

        let mut engine = Engine::new(
            &ctx,
            format,
            config.width,
            config.height,
            params.clone(),
            WindowScheduler::new(window.clone()),
        )?;
        engine.set_data(records);

        Ok(Self {
            engine,
            surface,
            config,
            device: ctx.device.clone(),
            window,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.engine.resize(width, height);
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Returns false when the window should close.
    fn redraw(&mut self) -> bool {
        if !self.engine.is_running() {
            return true;
        }
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::warn!("surface lost or outdated, reconfiguring");
                self.reconfigure();
                self.window.request_redraw();
                return true;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                tracing::error!("surface out of memory");
                self.engine.dispose();
                return false;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "frame dropped");
                self.window.request_redraw();
                return true;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.engine.frame(&view);
        self.window.pre_present_notify();
        frame.present();

        let clock = self.engine.clock();
        if clock.frame() % 60 == 0 {
            self.window.set_title(&format!(
                "screenprint - {} active - {:.0} fps",
                self.engine.simulation().store().active_count(),
                clock.fps()
            ));
        }
        true
    }

    fn key(&mut self, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed || event.repeat {
            return true;
        }
        let params = self.engine.params();
        let (grouping, disable, greyscale) = (
            params.grouping,
            params.halftone.disable,
            params.halftone.greyscale,
        );
        match event.logical_key.as_ref() {
            Key::Named(NamedKey::Escape) => return false,
            Key::Character("r") => self.engine.restart(),
            Key::Character("c") => self.engine.remove_all(),
            Key::Character("g") => self.engine.apply(ParamChange::Grouping(!grouping)),
            Key::Character("h") => self.engine.apply(ParamChange::DisableHalftone(!disable)),
            Key::Character("y") => self.engine.apply(ParamChange::Greyscale(!greyscale)),
            _ => {}
        }
        true
    }
}

/// Application state across the event loop's lifetime.
pub struct App {
    params: Params,
    records: Vec<EntityRecord>,
    host: Option<Host>,
    error: Option<EngineError>,
}

impl App {
    pub fn new(params: Params, records: Vec<EntityRecord>) -> Self {
        Self {
            params,
            records,
            host: None,
            error: None,
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(host) = self.host.as_mut() {
            host.engine.dispose();
        }
        self.host = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.host.is_some() || self.error.is_some() {
            return;
        }
        match Host::new(event_loop, &self.params, &self.records) {
            Ok(host) => {
                tracing::info!(entities = self.records.len(), "window ready");
                self.host = Some(host);
            }
            Err(err) => {
                tracing::error!(error = %err, "engine failed to start");
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        let keep_running = match event {
            WindowEvent::CloseRequested => false,
            WindowEvent::Resized(size) => {
                host.resize(size.width, size.height);
                true
            }
            WindowEvent::KeyboardInput { event, .. } => host.key(&event),
            WindowEvent::RedrawRequested => host.redraw(),
            _ => true,
        };
        if !keep_running {
            self.shutdown(event_loop);
        }
    }
}

/// Open a window and animate `records` until it is closed.
pub fn run(params: Params, records: Vec<EntityRecord>) -> Result<(), EngineError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(params, records);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
