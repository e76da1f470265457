//! The controller: the surface an application drives.
//!
//! A [`Controller`] owns the current [`ParticleField`], the session's
//! [`TouchInfluenceMap`] and [`ImageCache`], and the collaborators it talks
//! to: an [`ImageSource`], a [`RenderBackend`] and a [`CameraProvider`].
//!
//! # Image switches
//!
//! Switches are strictly sequential. [`Controller::goto`] on a visible or
//! materializing field starts its dissolve; the new image is requested only
//! once that dissolve has finished and the old field is released. Further
//! calls to `goto` while the dissolve runs just replace the target.
//!
//! Every `goto` bumps a generation counter. Loads are tagged with the
//! generation that asked for them, and a load whose generation is no longer
//! current is dropped when it arrives, so two fields never coexist.
//!
//! # Example
//!
//! ```ignore
//! let mut controller = Controller::builder()
//!     .source(FsImageSource::with_root("assets"))
//!     .backend(my_backend)
//!     .images(["a.png", "b.png", "c.png"])
//!     .build()?;
//!
//! controller.next();
//! loop {
//!     for event in controller.tick(clock.tick()) {
//!         log::info!("{:?}", event);
//!     }
//! }
//! ```

use crate::cache::ImageCache;
use crate::config::{Config, DensityOverrides};
use crate::error::{ControllerError, DecodeError};
use crate::field::{FieldId, FieldState, ParticleField};
use crate::input::PointerEvent;
use crate::performance::PerformanceProfile;
use crate::render::{CameraProvider, Frame, RenderBackend};
use crate::source::{Dispatch, ImageLoader, ImageSource, LoadOutcome};
use crate::timeline::{FieldParams, TransitionKind};
use crate::touch::TouchInfluenceMap;
use glam::Vec2;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;

/// What the controller is doing, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    /// No field and nothing loading.
    Idle,
    /// Waiting for a decode.
    Loading,
    Materializing,
    Visible,
    Dissolving,
}

/// Something that happened since the previous tick.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// A decode was requested.
    LoadStarted { reference: String, generation: u64 },
    /// A field was built and started materializing.
    FieldReady {
        id: FieldId,
        reference: String,
        visible_count: usize,
    },
    Materialized { id: FieldId },
    /// A field finished dissolving and was released.
    Dissolved { id: FieldId },
    /// The requested image could not be decoded. No field replaced the
    /// previous one.
    DecodeFailed {
        reference: String,
        error: Arc<DecodeError>,
    },
}

/// Assembles a [`Controller`].
pub struct ControllerBuilder {
    source: Option<Arc<dyn ImageSource>>,
    backend: Option<Box<dyn RenderBackend>>,
    camera: Option<Box<dyn CameraProvider>>,
    images: Vec<String>,
    dispatch: Dispatch,
    profile: Option<PerformanceProfile>,
    seed: Option<u64>,
    config: Config,
    viewport: Vec2,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self {
            source: None,
            backend: None,
            camera: None,
            images: Vec::new(),
            dispatch: Dispatch::default(),
            profile: None,
            seed: None,
            config: Config::default(),
            viewport: Vec2::new(800.0, 600.0),
        }
    }
}

impl ControllerBuilder {
    /// Where images come from. Required.
    pub fn source(mut self, source: impl ImageSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Shared image source. Required unless [`source`](Self::source) is set.
    pub fn shared_source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Where fields are drawn. Required.
    pub fn backend(mut self, backend: impl RenderBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Camera supplier. Defaults to a fixed camera built from the config.
    pub fn camera(mut self, camera: impl CameraProvider + 'static) -> Self {
        self.camera = Some(Box::new(camera));
        self
    }

    /// Ordered playlist used by [`Controller::next`].
    pub fn images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = images.into_iter().map(Into::into).collect();
        self
    }

    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Use this profile instead of probing the device.
    pub fn profile(mut self, profile: PerformanceProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Seed particle phases. Unseeded controllers draw from entropy.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn viewport(mut self, viewport: Vec2) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn build(self) -> Result<Controller, ControllerError> {
        let backend = self.backend.ok_or(ControllerError::MissingCollaborator("render backend"))?;
        let source = self.source.ok_or(ControllerError::MissingCollaborator("image source"))?;
        let camera = self
            .camera
            .unwrap_or_else(|| Box::new(self.config.camera) as Box<dyn CameraProvider>);
        let profile = self.profile.unwrap_or_else(PerformanceProfile::cached);
        let rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        log::info!(
            "Controller ready: {:?} profile (threshold {}), {} images",
            profile.level,
            profile.threshold,
            self.images.len()
        );

        Ok(Controller {
            loader: ImageLoader::new(source, self.dispatch),
            cache: ImageCache::new(),
            backend,
            camera,
            touch: TouchInfluenceMap::new(&self.config.touch),
            config: self.config,
            profile,
            rng,
            images: self.images,
            index: None,
            field: None,
            next_id: 1,
            generation: 0,
            target: None,
            loading: None,
            viewport: self.viewport,
            events: Vec::new(),
        })
    }
}

/// Sequences particle fields for a series of images.
pub struct Controller {
    loader: ImageLoader,
    cache: ImageCache,
    backend: Box<dyn RenderBackend>,
    camera: Box<dyn CameraProvider>,
    touch: TouchInfluenceMap,
    config: Config,
    profile: PerformanceProfile,
    rng: SmallRng,
    images: Vec<String>,
    index: Option<usize>,
    field: Option<ParticleField>,
    next_id: u64,
    generation: u64,
    /// Image to request once the current field has dissolved.
    target: Option<String>,
    /// Image whose decode is outstanding for the current generation.
    loading: Option<String>,
    viewport: Vec2,
    events: Vec<ControllerEvent>,
}

impl Controller {
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    // ========== Queries ==========

    pub fn state(&self) -> ControllerState {
        match self.field.as_ref().map(ParticleField::state) {
            Some(FieldState::Materializing) => ControllerState::Materializing,
            Some(FieldState::Visible) => ControllerState::Visible,
            Some(FieldState::Dissolving) => ControllerState::Dissolving,
            Some(FieldState::Loading) => ControllerState::Loading,
            Some(FieldState::Destroyed) | None if self.loading.is_some() => ControllerState::Loading,
            Some(FieldState::Destroyed) | None => ControllerState::Idle,
        }
    }

    pub fn current_field(&self) -> Option<&ParticleField> {
        self.field.as_ref()
    }

    pub fn touch(&self) -> &TouchInfluenceMap {
        &self.touch
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn profile(&self) -> &PerformanceProfile {
        &self.profile
    }

    /// Current generation; bumped by every `goto`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Playlist position of the last image chosen by `next`.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Threshold the next field will be filtered with.
    pub fn threshold(&self) -> u8 {
        self.config.density.threshold.unwrap_or(self.profile.threshold)
    }

    // ========== Navigation ==========

    /// Switch to `reference`.
    pub fn goto(&mut self, reference: impl Into<String>) {
        let reference = reference.into();
        self.generation += 1;
        log::debug!("goto '{}' (generation {})", reference, self.generation);
        self.target = Some(reference);

        match self.field.as_ref().map(ParticleField::state) {
            Some(FieldState::Dissolving) => {}
            Some(FieldState::Destroyed) | None => self.request_target(),
            Some(_) => {
                if let Some(field) = self.field.as_mut() {
                    field.dissolve(&self.config.dissolve);
                }
            }
        }
    }

    /// Switch to the next playlist image, wrapping after the last.
    pub fn next(&mut self) {
        if self.images.is_empty() {
            log::warn!("next() called with an empty image list");
            return;
        }
        let index = self.index.map_or(0, |i| (i + 1) % self.images.len());
        self.index = Some(index);
        let reference = self.images[index].clone();
        self.goto(reference);
    }

    fn request_target(&mut self) {
        let Some(reference) = self.target.take() else {
            return;
        };
        self.loader.request(self.generation, &reference, &self.cache);
        self.events.push(ControllerEvent::LoadStarted {
            reference: reference.clone(),
            generation: self.generation,
        });
        self.loading = Some(reference);
    }

    // ========== Per-frame ==========

    /// Advance one frame. Call exactly once per frame.
    ///
    /// Returns everything that happened since the previous tick, including
    /// events raised by `goto` in between.
    pub fn tick(&mut self, dt: f32) -> Vec<ControllerEvent> {
        self.touch.update(dt);

        for outcome in self.loader.poll(&mut self.cache) {
            self.accept(outcome);
        }

        let finished = self.field.as_mut().and_then(|field| field.tick(dt));
        match finished {
            Some(TransitionKind::Materialize) => {
                if let Some(field) = &self.field {
                    self.events.push(ControllerEvent::Materialized { id: field.id() });
                }
            }
            Some(TransitionKind::Dissolve) => {
                if let Some(field) = self.field.take() {
                    self.backend.release(field.id());
                    self.events.push(ControllerEvent::Dissolved { id: field.id() });
                }
                self.request_target();
            }
            None => {}
        }

        if let Some(field) = self.field.as_ref() {
            let camera = self.camera.camera(self.viewport);
            let frame = Frame::new(field, &self.touch, camera, self.config.debug_hit_plane);
            self.backend.draw(&frame);
        }

        std::mem::take(&mut self.events)
    }

    fn accept(&mut self, outcome: LoadOutcome) {
        if outcome.generation != self.generation || self.loading.as_deref() != Some(outcome.reference.as_str()) {
            log::debug!(
                "Dropping stale load of '{}' (generation {}, current {})",
                outcome.reference,
                outcome.generation,
                self.generation
            );
            return;
        }
        self.loading = None;

        let image = match outcome.result {
            Ok(image) => image,
            Err(error) => {
                log::warn!("Keeping current field: {}", error);
                self.events.push(ControllerEvent::DecodeFailed {
                    reference: outcome.reference,
                    error,
                });
                return;
            }
        };

        if let Some(old) = self.field.take() {
            log::debug!("Superseding {} before it dissolved", old.id());
            self.backend.release(old.id());
        }

        let id = FieldId(self.next_id);
        self.next_id += 1;
        let threshold = self.threshold();
        let mut field = ParticleField::from_image(
            id,
            outcome.reference.clone(),
            &image,
            threshold,
            self.config.density.channel,
            &mut self.rng,
        )
        .with_motion(self.config.motion)
        .with_steady(self.config.steady);

        field.resize(&self.camera.camera(self.viewport));
        self.backend.upload(id, &field.instance_buffer());
        field.materialize(&self.config.materialize);

        self.events.push(ControllerEvent::FieldReady {
            id,
            reference: outcome.reference,
            visible_count: field.visible_count(),
        });
        self.field = Some(field);
    }

    /// Feed a pointer move into the touch map. Misses are dropped.
    pub fn pointer_move(&mut self, event: PointerEvent) {
        let Some(field) = self.field.as_ref() else {
            return;
        };
        let camera = self.camera.camera(event.viewport);
        match field.project(event.position, event.viewport, &camera) {
            Ok(uv) => self.touch.add_touch(uv),
            Err(e) => log::trace!("Pointer at {:?}: {}", event.position, e),
        }
    }

    // ========== Tuning ==========

    /// Recompute scale and hit-plane for a new viewport.
    pub fn resize(&mut self, viewport: Vec2) {
        self.viewport = viewport;
        let camera = self.camera.camera(viewport);
        if let Some(field) = self.field.as_mut() {
            field.resize(&camera);
        }
    }

    pub fn set_touch_radius(&mut self, radius: f32) {
        self.touch.set_radius(radius);
        self.config.touch.radius = self.touch.radius();
    }

    /// Applies to fields built from now on.
    pub fn set_density_overrides(&mut self, overrides: DensityOverrides) {
        self.config.density = overrides;
        log::debug!("Density overrides now {:?} (threshold {})", overrides, self.threshold());
    }

    /// Steady-state shape parameters; a visible field adopts them at once.
    pub fn set_steady_params(&mut self, params: FieldParams) {
        self.config.steady = params;
        if let Some(field) = self.field.as_mut() {
            field.set_steady(params);
        }
    }

    /// Release the current field and drop every cached image.
    pub fn dispose(&mut self) {
        if let Some(field) = self.field.take() {
            self.backend.release(field.id());
        }
        self.generation += 1;
        self.target = None;
        self.loading = None;
        self.touch.clear();
        self.cache.dispose();
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state())
            .field("generation", &self.generation)
            .field("field", &self.field.as_ref().map(ParticleField::id))
            .field("loader", &self.loader)
            .finish()
    }
}
