//! Error types for screenprint.
//!
//! GPU initialization failures are fatal for an engine instance. Dataset and
//! config errors only surface from the loaders; the engine itself never fails
//! on malformed entities.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while bringing up or driving the GPU.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found; a WebGPU/Vulkan/Metal/DX12 capable device is required")]
    NoAdapter,

    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),

    /// A shader module or pipeline failed validation.
    #[error("shader '{label}' failed to build: {message}")]
    Shader { label: &'static str, message: String },

    /// The device was lost after initialization.
    #[error("GPU context lost")]
    ContextLost,

    /// A resource was requested before the pipeline was initialized.
    #[error("render pipeline not initialized")]
    NotInitialized,

    /// Failed to map buffer for reading.
    #[error("failed to map GPU buffer: {0}")]
    BufferMapping(String),
}

/// Errors reading an entity dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors reading a parameter file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that can occur when running the engine in a window or on an image.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to create event loop.
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    /// Failed to create window.
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    /// GPU initialization failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to load or save an image for the still filter.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
