//! # screenprint
//!
//! A force-directed swarm of categorized entities, drawn with fading motion
//! trails and composited through a GPU halftone screen.
//!
//! Each frame:
//!
//! 1. the [`SpawnScheduler`] reveals the next pending entity once the spawn
//!    delay has passed
//! 2. the [`LayoutIntegrator`] advances every active entity one tick
//! 3. the [`TrailAccumulator`] samples positions into aging trail points
//! 4. the render pipeline draws trails, blurs them, screens the result per
//!    color channel and draws the nodes on top
//!
//! ## Quick Start
//!
//! ```ignore
//! use screenprint::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     let records = load_records("entities.json".as_ref())?;
//!     screenprint::window::run(Params::default(), records)
//! }
//! ```
//!
//! ## Without a window
//!
//! [`Simulation`] is the CPU half on its own and needs no GPU:
//!
//! ```
//! use screenprint::{EntityRecord, Params, Simulation, Vec2};
//!
//! let records: Vec<EntityRecord> = serde_json::from_str(
//!     r#"[{"id": "a", "name": "A", "supertype": "x"},
//!         {"id": "b", "name": "B", "supertype": "y"}]"#,
//! ).unwrap();
//!
//! let mut sim = Simulation::new(Params::default(), Vec2::new(800.0, 600.0));
//! sim.set_data(&records);
//! sim.step(0.0);
//! assert_eq!(sim.store().active_count(), 1);
//! ```
//!
//! ## Parameters
//!
//! Every live knob is a [`ParamChange`]. Changes are clamped to their
//! documented range and trigger only the side effect they need: halftone
//! changes affect the next frame, force changes reheat the layout.
//!
//! ## Static images
//!
//! [`HalftoneScreen`] applies the same screen to a single image on the CPU.

pub mod driver;
pub mod engine;
pub mod entity;
pub mod error;
pub mod gpu;
pub mod halftone;
pub mod layout;
pub mod palette;
pub mod params;
pub mod simulation;
pub mod spawn;
pub mod time;
pub mod trail;
pub mod window;

pub use driver::{AnimationDriver, FrameScheduler, ManualScheduler};
pub use engine::Engine;
pub use entity::{load_records, parse_records, Entity, EntityRecord, EntityStore, SpawnState};
pub use error::{ConfigError, DatasetError, EngineError, GpuError};
pub use glam::{Vec2, Vec3, Vec4};
pub use gpu::{GpuContext, PipelineState, Renderer};
pub use halftone::{BlendMode, HalftoneParams, HalftoneScreen, Shape};
pub use layout::{CategoryAnchors, Force, LayoutIntegrator};
pub use palette::CategoryPalette;
pub use params::{ParamChange, ParamEffect, Params, TrailParams};
pub use simulation::Simulation;
pub use spawn::SpawnScheduler;
pub use trail::{TrailAccumulator, TrailPoint};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use screenprint::prelude::*;
/// ```
pub mod prelude {
    pub use crate::driver::{AnimationDriver, FrameScheduler, ManualScheduler};
    pub use crate::engine::Engine;
    pub use crate::entity::{load_records, EntityRecord};
    pub use crate::error::EngineError;
    pub use crate::halftone::{BlendMode, HalftoneParams, Shape};
    pub use crate::params::{ParamChange, Params, TrailParams};
    pub use crate::simulation::Simulation;
    pub use crate::time::FrameClock;
    pub use crate::{Vec2, Vec3, Vec4};
}
