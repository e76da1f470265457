//! One loaded image as a field of particles.
//!
//! A [`ParticleField`] is built once from a decoded image and never resized
//! in place. It owns its instance buffers, its shape parameters and the
//! single transition driver that animates them.
//!
//! # Lifecycle
//!
//! ```text
//! Loading ──materialize──▶ Materializing ──finish──▶ Visible
//!    │                          │                       │
//!    └──────────dissolve────────┴───────────────────────┘
//!                               ▼
//!                          Dissolving ──finish──▶ Destroyed
//! ```
//!
//! `Loading` is the state of a field that has been built but not yet shown.
//! A finished dissolve destroys the field: its buffers are released and it
//! stops accepting pointer input.

use crate::density::{filter_with, Channel, DecodedImage};
use crate::error::ProjectError;
use crate::instances::{build_instances, InstanceGpu, ParticleInstances};
use crate::motion::{MotionModel, MotionVariant, ParticleSample};
use crate::projection::{project, scale_factor, CameraState, HitPlane};
use crate::timeline::{FieldParams, Timeline, TransitionConfig, TransitionDriver, TransitionKind};
use glam::Vec2;
use rand::Rng;
use std::fmt;

/// Identifier of a field, unique within one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u64);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field#{}", self.0)
    }
}

/// Lifecycle state of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldState {
    /// Built but not yet shown.
    Loading,
    Materializing,
    Visible,
    Dissolving,
    /// Buffers released. Terminal.
    Destroyed,
}

/// The particle field for one image.
#[derive(Debug)]
pub struct ParticleField {
    id: FieldId,
    reference: String,
    width: u32,
    height: u32,
    threshold: u8,
    instances: ParticleInstances,
    grey: Vec<f32>,
    scale_factor: f32,
    state: FieldState,
    params: FieldParams,
    steady: FieldParams,
    time: f32,
    transitions: TransitionDriver,
    motion: MotionModel,
}

impl ParticleField {
    /// Filter `image` and build one instance per retained pixel.
    ///
    /// An image with no pixel above `threshold` gives an empty field; it still
    /// goes through every lifecycle state.
    pub fn from_image<R: Rng + ?Sized>(
        id: FieldId,
        reference: impl Into<String>,
        image: &DecodedImage,
        threshold: u8,
        channel: Channel,
        rng: &mut R,
    ) -> Self {
        let reference = reference.into();
        let indices = filter_with(image, threshold, channel);
        let grey = indices
            .iter()
            .map(|&i| image.channel_at(i, channel) as f32 / 255.0)
            .collect();
        let instances = build_instances(indices, image.width(), rng);

        log::info!(
            "{} '{}': {}x{} ({} pixels), {} particles at threshold {}",
            id,
            reference,
            image.width(),
            image.height(),
            image.total_pixels(),
            instances.len(),
            threshold
        );

        let mut motion = MotionModel::default();
        motion.configure(&FieldParams::INITIAL);

        Self {
            id,
            reference,
            width: image.width(),
            height: image.height(),
            threshold,
            instances,
            grey,
            scale_factor: 1.0,
            state: FieldState::Loading,
            params: FieldParams::INITIAL,
            steady: FieldParams::default(),
            time: 0.0,
            transitions: TransitionDriver::default(),
            motion,
        }
    }

    /// Use `variant` for particle motion.
    pub fn with_motion(mut self, variant: MotionVariant) -> Self {
        self.motion = MotionModel::new(variant);
        self.motion.configure(&self.params);
        self
    }

    /// Values the field settles on once materialized.
    pub fn with_steady(mut self, steady: FieldParams) -> Self {
        self.steady = steady;
        self
    }

    // ========== Accessors ==========

    #[inline]
    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn total_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of particles.
    #[inline]
    pub fn visible_count(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    #[inline]
    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    #[inline]
    pub fn state(&self) -> FieldState {
        self.state
    }

    /// Current (possibly animating) shape parameters.
    pub fn params(&self) -> &FieldParams {
        &self.params
    }

    pub fn steady(&self) -> &FieldParams {
        &self.steady
    }

    /// Seconds since the field was built.
    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn instances(&self) -> &ParticleInstances {
        &self.instances
    }

    /// Per-particle source brightness in `[0, 1]`.
    pub fn grey(&self) -> &[f32] {
        &self.grey
    }

    pub fn motion(&self) -> &MotionModel {
        &self.motion
    }

    /// Progress of the in-flight transition, if any.
    pub fn transition_progress(&self) -> Option<f32> {
        self.transitions.progress()
    }

    /// Whether pointer input should reach this field.
    pub fn is_interactive(&self) -> bool {
        matches!(self.state, FieldState::Materializing | FieldState::Visible)
    }

    /// Image size in pixels.
    pub fn texture_size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Read-only view of particle `i`.
    pub fn particle(&self, i: usize) -> ParticleSample {
        ParticleSample {
            pixel_index: self.instances.pixel_index()[i],
            offset: self.instances.offset()[i],
            phase: self.instances.phase()[i],
            grey: self.grey.get(i).copied().unwrap_or(1.0),
        }
    }

    /// Interleaved instance data for upload.
    pub fn instance_buffer(&self) -> Vec<InstanceGpu> {
        self.instances.to_gpu(&self.grey)
    }

    // ========== Transitions ==========

    /// Start materializing. Supersedes any in-flight transition.
    pub fn materialize(&mut self, config: &TransitionConfig) {
        self.start(TransitionKind::Materialize, config, None);
    }

    /// Start dissolving. Supersedes any in-flight transition.
    pub fn dissolve(&mut self, config: &TransitionConfig) {
        self.start(TransitionKind::Dissolve, config, None);
    }

    /// Start a transition that runs `on_complete` when it finishes. The
    /// continuation is dropped unrun if another transition supersedes it.
    pub fn transition_then(
        &mut self,
        kind: TransitionKind,
        config: &TransitionConfig,
        on_complete: impl FnOnce() + 'static,
    ) {
        self.start(kind, config, Some(Box::new(on_complete)));
    }

    fn start(&mut self, kind: TransitionKind, config: &TransitionConfig, on_complete: Option<Box<dyn FnOnce()>>) {
        if self.state == FieldState::Destroyed {
            log::warn!("Ignoring {:?} on destroyed {}", kind, self.id);
            return;
        }

        let mut timeline = Timeline::new(kind, config, &self.steady);
        if let Some(done) = on_complete {
            timeline = timeline.with_on_complete(done);
        }
        self.transitions.start(timeline, &mut self.params);
        self.motion.configure(&self.params);

        self.state = match kind {
            TransitionKind::Materialize => FieldState::Materializing,
            TransitionKind::Dissolve => FieldState::Dissolving,
        };
    }

    /// Advance field time and the active transition by `dt` seconds.
    ///
    /// Returns the kind of transition that finished during this tick. A
    /// finished dissolve leaves the field destroyed.
    pub fn tick(&mut self, dt: f32) -> Option<TransitionKind> {
        if self.state == FieldState::Destroyed {
            return None;
        }
        if dt.is_finite() && dt > 0.0 {
            self.time += dt;
        }

        let finished = self.transitions.advance(dt, &mut self.params);
        self.motion.configure(&self.params);

        match finished {
            Some(TransitionKind::Materialize) => self.state = FieldState::Visible,
            Some(TransitionKind::Dissolve) => self.destroy(),
            None => {}
        }
        finished
    }

    /// Change the steady-state values. A visible field snaps to them; a
    /// materializing field finishes on them.
    pub fn set_steady(&mut self, steady: FieldParams) {
        self.steady = steady;
        match self.state {
            FieldState::Visible => {
                self.params = steady;
                self.motion.configure(&self.params);
            }
            FieldState::Materializing => self.transitions.retarget(&steady),
            _ => {}
        }
    }

    /// Release buffers and stop all animation. Idempotent.
    pub fn destroy(&mut self) {
        if self.state == FieldState::Destroyed {
            return;
        }
        self.transitions.cancel();
        self.instances = ParticleInstances::default();
        self.grey = Vec::new();
        self.state = FieldState::Destroyed;
        log::debug!("Destroyed {} '{}'", self.id, self.reference);
    }

    // ========== Geometry ==========

    /// Refit the field to the camera's visible height.
    pub fn resize(&mut self, camera: &CameraState) {
        self.scale_factor = scale_factor(camera.fov_height(), self.height);
    }

    /// Invisible picking plane matching the field's world size.
    pub fn hit_plane(&self) -> HitPlane {
        HitPlane::new(self.width, self.height, self.scale_factor)
    }

    /// Project a screen position to this field's UV space.
    pub fn project(&self, screen: Vec2, viewport: Vec2, camera: &CameraState) -> Result<Vec2, ProjectError> {
        if !self.is_interactive() {
            return Err(ProjectError::NoIntersection);
        }
        project(screen, viewport, &self.hit_plane(), camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::cell::Cell;
    use std::rc::Rc;

    fn image_a() -> DecodedImage {
        DecodedImage::from_grey(
            4,
            4,
            &[10, 50, 90, 200, 10, 10, 10, 10, 200, 200, 10, 10, 10, 10, 200, 10],
        )
        .unwrap()
    }

    fn field() -> ParticleField {
        ParticleField::from_image(FieldId(1), "a.png", &image_a(), 34, Channel::Red, &mut SmallRng::seed_from_u64(5))
    }

    fn run(field: &mut ParticleField) -> Option<TransitionKind> {
        for _ in 0..1000 {
            if let Some(kind) = field.tick(1.0 / 60.0) {
                return Some(kind);
            }
        }
        None
    }

    #[test]
    fn test_build_from_image() {
        let f = field();
        assert_eq!(f.state(), FieldState::Loading);
        assert_eq!(f.visible_count(), 5);
        assert_eq!(f.total_pixels(), 16);
        assert_eq!(f.instances().pixel_index(), &[2, 3, 8, 9, 14]);
        assert!(f.instances().is_consistent(4, 4));
        assert_eq!(f.grey().len(), 5);
        assert!((f.grey()[0] - 90.0 / 255.0).abs() < 1e-6);
        assert_eq!(*f.params(), FieldParams::INITIAL);
        assert!(!f.is_interactive());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut f = field();
        f.materialize(&TransitionConfig::materialize(1.0));
        assert_eq!(f.state(), FieldState::Materializing);
        assert!(f.is_interactive());

        assert_eq!(run(&mut f), Some(TransitionKind::Materialize));
        assert_eq!(f.state(), FieldState::Visible);
        assert_eq!(*f.params(), FieldParams::default());
        assert_eq!(f.motion().params(), f.params());

        f.dissolve(&TransitionConfig::dissolve(0.8));
        assert_eq!(f.state(), FieldState::Dissolving);
        assert!(!f.is_interactive());

        assert_eq!(run(&mut f), Some(TransitionKind::Dissolve));
        assert_eq!(f.state(), FieldState::Destroyed);
        assert_eq!(f.visible_count(), 0);
        assert!(f.instance_buffer().is_empty());
        assert_eq!(f.tick(1.0), None);
    }

    #[test]
    fn test_dissolve_supersedes_materialize() {
        let mut f = field();
        let fired = Rc::new(Cell::new(0));

        let c = fired.clone();
        f.transition_then(TransitionKind::Materialize, &TransitionConfig::materialize(1.0), move || {
            c.set(c.get() + 1)
        });
        f.tick(0.2);

        let c = fired.clone();
        f.transition_then(TransitionKind::Dissolve, &TransitionConfig::dissolve(0.8), move || {
            c.set(c.get() + 10)
        });
        run(&mut f);

        assert_eq!(fired.get(), 10);
        assert_eq!(f.state(), FieldState::Destroyed);
    }

    #[test]
    fn test_empty_field_still_transitions() {
        let black = DecodedImage::from_grey(4, 4, &[0; 16]).unwrap();
        let mut f = ParticleField::from_image(FieldId(2), "black", &black, 34, Channel::Red, &mut SmallRng::seed_from_u64(0));
        assert_eq!(f.visible_count(), 0);

        f.materialize(&TransitionConfig::materialize(0.5));
        assert_eq!(run(&mut f), Some(TransitionKind::Materialize));
        f.dissolve(&TransitionConfig::dissolve(0.5));
        assert_eq!(run(&mut f), Some(TransitionKind::Dissolve));
        assert_eq!(f.state(), FieldState::Destroyed);
    }

    #[test]
    fn test_destroyed_field_ignores_transitions() {
        let mut f = field();
        f.destroy();
        f.materialize(&TransitionConfig::materialize(1.0));
        assert_eq!(f.state(), FieldState::Destroyed);
        assert_eq!(f.transition_progress(), None);
    }

    #[test]
    fn test_resize_updates_hit_plane() {
        let mut f = field();
        let camera = CameraState::new(90f32.to_radians(), 1.0, 10.0);
        f.resize(&camera);
        assert!((f.scale_factor() - 5.0).abs() < 1e-4);
        let plane = f.hit_plane();
        assert!((plane.height - 20.0).abs() < 1e-3);
        assert!((plane.width - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_project_only_when_interactive() {
        let mut f = field();
        let camera = CameraState::new(90f32.to_radians(), 1.0, 10.0);
        f.resize(&camera);
        let viewport = Vec2::new(100.0, 100.0);
        let centre = Vec2::new(50.0, 50.0);

        assert!(f.project(centre, viewport, &camera).is_err());
        f.materialize(&TransitionConfig::materialize(1.0));
        let uv = f.project(centre, viewport, &camera).unwrap();
        assert!((uv - Vec2::splat(0.5)).length() < 1e-3);
    }

    #[test]
    fn test_steady_change_applies_when_visible() {
        let mut f = field();
        f.materialize(&TransitionConfig::materialize(0.0));
        f.tick(0.0);
        let steady = FieldParams { size: 3.0, randomness: 0.0, depth: 1.0 };
        f.set_steady(steady);
        assert_eq!(*f.params(), steady);
    }

    #[test]
    fn test_steady_change_during_materialize_is_kept() {
        let mut f = field();
        f.materialize(&TransitionConfig::materialize(1.0));
        f.tick(0.2);

        let steady = FieldParams { size: 3.0, randomness: 0.5, depth: 1.0 };
        f.set_steady(steady);
        assert_eq!(run(&mut f), Some(TransitionKind::Materialize));

        assert_eq!(f.state(), FieldState::Visible);
        assert_eq!(*f.params(), steady);
        assert_eq!(*f.steady(), steady);
        assert_eq!(*f.motion().params(), steady);
    }

    #[test]
    fn test_steady_change_during_dissolve_keeps_dissolve_ends() {
        let mut f = field();
        f.materialize(&TransitionConfig::materialize(0.0));
        f.tick(0.0);
        f.dissolve(&TransitionConfig::dissolve(1.0));
        f.tick(0.1);

        f.set_steady(FieldParams { size: 3.0, randomness: 0.5, depth: 1.0 });
        assert_eq!(run(&mut f), Some(TransitionKind::Dissolve));
        assert_eq!(*f.params(), FieldParams { size: 0.0, randomness: 5.0, depth: -20.0 });
    }
}
