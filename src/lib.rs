//! # pixdust - image particle fields
//!
//! Turns raster images into interactive fields of point particles: every
//! bright pixel becomes one instanced quad that scatters, breathes, reacts to
//! the pointer, and flies in or dissolves away when the image changes.
//!
//! pixdust is the engine, not the renderer. It decides which pixels become
//! particles, keeps the per-particle instance data, tracks pointer influence,
//! and sequences transitions. Drawing is delegated to a [`RenderBackend`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use pixdust::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut controller = Controller::builder()
//!         .source(FsImageSource::with_root("assets"))
//!         .backend(RecordingBackend::new())
//!         .images(["one.png", "two.png"])
//!         .build()?;
//!
//!     let mut clock = FrameClock::new();
//!     controller.next();
//!     loop {
//!         controller.tick(clock.tick());
//!     }
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Density
//!
//! A one-off [performance probe](performance) picks a brightness threshold;
//! only pixels strictly above it become particles, so weaker devices draw
//! fewer of them. The threshold and channel can be overridden through
//! [`DensityOverrides`].
//!
//! ### Fields
//!
//! A [`ParticleField`] holds the instance buffers for one image together with
//! its shape parameters (`size`, `randomness`, `depth`). Its lifecycle is
//! `Loading → Materializing → Visible → Dissolving → Destroyed`.
//!
//! ### Touch
//!
//! Pointer moves are projected onto the field's [hit-plane](projection) and
//! recorded in a [`TouchInfluenceMap`], a small grid that decays over time and
//! pushes nearby particles aside.
//!
//! ### Motion
//!
//! The [motion model](motion) displaces each particle from its grid position.
//! Several [`MotionVariant`]s are available:
//!
//! | Variant | Effect |
//! |---------|--------|
//! | [`MotionVariant::Scatter`] | Plain image motion (default) |
//! | [`MotionVariant::Flow`] | Drifting currents |
//! | [`MotionVariant::Explode`] | Touch blows particles outward |
//! | [`MotionVariant::Wave`] | Travelling wave |
//! | [`MotionVariant::Spiral`] | Per-particle circling |
//! | [`MotionVariant::Magnetic`] | Touch attracts particles |

pub mod cache;
pub mod config;
pub mod controller;
pub mod density;
pub mod error;
pub mod field;
pub mod input;
pub mod instances;
pub mod motion;
pub mod performance;
pub mod projection;
pub mod render;
pub mod source;
pub mod time;
pub mod timeline;
pub mod touch;

pub use bytemuck;
pub use glam::{Vec2, Vec3};

pub use cache::ImageCache;
pub use config::{Config, DensityOverrides};
pub use controller::{Controller, ControllerBuilder, ControllerEvent, ControllerState};
pub use density::{filter, filter_with, Channel, DecodedImage};
pub use error::{ConfigError, ControllerError, DecodeError, ProjectError};
pub use field::{FieldId, FieldState, ParticleField};
pub use input::{PointerEvent, PointerTracker};
pub use instances::{build_instances, InstanceGpu, ParticleInstances};
pub use motion::{MotionModel, MotionVariant};
pub use performance::{classify, CapabilitySignals, PerformanceLevel, PerformanceProfile};
pub use projection::{project, CameraConfig, CameraState, HitPlane};
pub use render::{CameraProvider, Frame, FrameUniforms, RecordingBackend, RenderBackend};
pub use source::{Dispatch, FsImageSource, ImageLoader, ImageSource, MemoryImageSource};
pub use time::FrameClock;
pub use timeline::{CurveSpec, Easing, FieldParams, TransitionConfig, TransitionKind};
pub use touch::{TouchConfig, TouchInfluenceMap};

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::config::{Config, DensityOverrides};
    pub use crate::controller::{Controller, ControllerEvent, ControllerState};
    pub use crate::density::{Channel, DecodedImage};
    pub use crate::field::{FieldState, ParticleField};
    pub use crate::input::{PointerEvent, PointerTracker};
    pub use crate::motion::MotionVariant;
    pub use crate::performance::PerformanceProfile;
    pub use crate::render::{Frame, RecordingBackend, RenderBackend};
    pub use crate::source::{Dispatch, FsImageSource, ImageSource, MemoryImageSource};
    pub use crate::time::FrameClock;
    pub use crate::timeline::FieldParams;
    pub use glam::{Vec2, Vec3};
}
