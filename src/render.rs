//! Contracts with the rendering side.
//!
//! The engine never draws. Each tick it hands a [`RenderBackend`] a [`Frame`]
//! holding the current field, the touch influence map, and a block of
//! [`FrameUniforms`] laid out for direct upload. Instance buffers are
//! uploaded once when a field is built and released when it is destroyed.
//!
//! Backends that displace particles on the CPU can call
//! [`Frame::displace_all`], which runs the field's motion model over every
//! particle in parallel.

use crate::field::{FieldId, ParticleField};
use crate::instances::InstanceGpu;
use crate::motion::{Displaced, MotionContext, ParticleSample};
use crate::projection::{CameraConfig, CameraState};
use crate::touch::TouchInfluenceMap;
use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rayon::prelude::*;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Per-frame parameters, laid out for a uniform buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub time: f32,
    pub size: f32,
    pub randomness: f32,
    pub depth: f32,
    pub texture_size: [f32; 2],
    pub scale_factor: f32,
    /// Non-zero when the hit-plane should be drawn.
    pub show_hit_plane: u32,
}

impl FrameUniforms {
    pub fn new(field: &ParticleField, camera: &CameraState, show_hit_plane: bool) -> Self {
        let params = field.params();
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            time: field.time(),
            size: params.size,
            randomness: params.randomness,
            depth: params.depth,
            texture_size: [field.width() as f32, field.height() as f32],
            scale_factor: field.scale_factor(),
            show_hit_plane: show_hit_plane as u32,
        }
    }
}

/// Everything a backend needs to draw one frame.
pub struct Frame<'a> {
    pub field: &'a ParticleField,
    pub touch: &'a TouchInfluenceMap,
    pub camera: CameraState,
    pub uniforms: FrameUniforms,
}

impl<'a> Frame<'a> {
    pub fn new(field: &'a ParticleField, touch: &'a TouchInfluenceMap, camera: CameraState, show_hit_plane: bool) -> Self {
        Self {
            field,
            touch,
            camera,
            uniforms: FrameUniforms::new(field, &camera, show_hit_plane),
        }
    }

    /// Influence grid as one byte per node, row-major from the bottom row.
    pub fn touch_texture(&self) -> Vec<u8> {
        self.touch.to_texture_bytes()
    }

    /// Displaced position and size of every particle, in instance order.
    pub fn displace_all(&self) -> Vec<Displaced> {
        let model = *self.field.motion();
        let instances = self.field.instances();
        let grey = self.field.grey();
        let ctx = MotionContext {
            time: self.field.time(),
            texture_size: self.field.texture_size(),
            touch: self.touch,
        };

        (0..instances.len())
            .into_par_iter()
            .map(|i| {
                let particle = ParticleSample {
                    pixel_index: instances.pixel_index()[i],
                    offset: instances.offset()[i],
                    phase: instances.phase()[i],
                    grey: grey.get(i).copied().unwrap_or(1.0),
                };
                model.step_motion(&particle, &ctx)
            })
            .collect()
    }
}

/// Draws particle fields.
pub trait RenderBackend {
    /// Receive the instance buffer of a newly built field.
    fn upload(&mut self, id: FieldId, instances: &[InstanceGpu]);
    /// Free everything held for `id`.
    fn release(&mut self, id: FieldId);
    /// Draw one frame.
    fn draw(&mut self, frame: &Frame<'_>);
}

/// Supplies the camera on demand.
pub trait CameraProvider {
    fn camera(&self, viewport: Vec2) -> CameraState;
}

impl CameraProvider for CameraConfig {
    fn camera(&self, viewport: Vec2) -> CameraState {
        CameraConfig::camera(self, viewport)
    }
}

/// Counters kept by [`RecordingBackend`].
#[derive(Debug, Default, Clone)]
pub struct BackendStats {
    pub uploads: usize,
    pub releases: usize,
    pub draws: usize,
    /// Fields uploaded and not yet released.
    pub live: HashSet<FieldId>,
    pub last_instance_count: usize,
    pub last_uniforms: Option<FrameUniforms>,
}

/// Backend that draws nothing and records what it was asked to do.
///
/// Useful headless and in tests; keep a [`stats`](Self::stats) handle before
/// handing the backend to a controller.
#[derive(Debug, Default, Clone)]
pub struct RecordingBackend {
    stats: Rc<RefCell<BackendStats>>,
    displace: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also run the motion model on every draw.
    pub fn with_displacement(mut self) -> Self {
        self.displace = true;
        self
    }

    pub fn stats(&self) -> Rc<RefCell<BackendStats>> {
        Rc::clone(&self.stats)
    }
}

impl RenderBackend for RecordingBackend {
    fn upload(&mut self, id: FieldId, instances: &[InstanceGpu]) {
        let mut stats = self.stats.borrow_mut();
        stats.uploads += 1;
        stats.live.insert(id);
        stats.last_instance_count = instances.len();
    }

    fn release(&mut self, id: FieldId) {
        let mut stats = self.stats.borrow_mut();
        stats.releases += 1;
        stats.live.remove(&id);
    }

    fn draw(&mut self, frame: &Frame<'_>) {
        let displaced = if self.displace { frame.displace_all().len() } else { 0 };
        let mut stats = self.stats.borrow_mut();
        stats.draws += 1;
        stats.last_uniforms = Some(frame.uniforms);
        if self.displace {
            stats.last_instance_count = displaced;
        }
    }
}
