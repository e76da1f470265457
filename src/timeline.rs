//! Materialize / dissolve transitions.
//!
//! A [`Timeline`] animates the three shape parameters of a field (`size`,
//! `randomness`, `depth`), each along its own [`CurveSpec`] with independent
//! duration, delay and easing. It finishes when its longest curve does and
//! then runs its completion continuation exactly once.
//!
//! A field owns a single [`TransitionDriver`]. Starting a timeline while
//! another is in flight drops the old one without running its continuation:
//!
//! ```ignore
//! let mut driver = TransitionDriver::default();
//! driver.start(Timeline::new(TransitionKind::Materialize, &show, &steady).with_on_complete(|| unreachable!()), &params);
//! driver.start(Timeline::new(TransitionKind::Dissolve, &hide, &steady).with_on_complete(|| println!("gone")), &params);
//! while driver.advance(dt, &mut params).is_none() {}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// Particles fly in and settle into the image.
    Materialize,
    /// Particles scatter and shrink away.
    Dissolve,
}

/// Animated field parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    Size,
    Randomness,
    Depth,
}

/// Per-field shape parameters read by the motion model every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldParams {
    /// Point size multiplier.
    pub size: f32,
    /// Amount of random xy scatter.
    pub randomness: f32,
    /// Spread along z.
    pub depth: f32,
}

impl FieldParams {
    /// Values a freshly built field starts from.
    pub const INITIAL: FieldParams = FieldParams {
        size: 0.0,
        randomness: 1.0,
        depth: 2.0,
    };

    pub fn get(&self, param: Param) -> f32 {
        match param {
            Param::Size => self.size,
            Param::Randomness => self.randomness,
            Param::Depth => self.depth,
        }
    }

    pub fn set(&mut self, param: Param, value: f32) {
        match param {
            Param::Size => self.size = value,
            Param::Randomness => self.randomness = value,
            Param::Depth => self.depth = value,
        }
    }
}

impl Default for FieldParams {
    /// Steady-state values of a fully visible field.
    fn default() -> Self {
        Self {
            size: 1.5,
            randomness: 2.0,
            depth: 4.0,
        }
    }
}

/// Easing curve applied to normalized progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    /// Quadratic ease-out.
    #[default]
    Power1Out,
    /// Cubic ease-in.
    Power2In,
    /// Cubic ease-out.
    Power2Out,
    SineInOut,
}

impl Easing {
    /// Map progress `t` in `[0, 1]` to eased progress.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Power1Out => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::Power2In => t * t * t,
            Easing::Power2Out => 1.0 - (1.0 - t).powi(3),
            Easing::SineInOut => -((std::f32::consts::PI * t).cos() - 1.0) * 0.5,
        }
    }
}

/// How one parameter moves during a transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveSpec {
    /// Start value; `None` starts from the value the parameter has when the
    /// timeline begins.
    pub from: Option<f32>,
    /// End value; `None` ends at the steady-state value.
    pub to: Option<f32>,
    /// Seconds from start of the curve to its end.
    pub duration: f32,
    /// Seconds before the curve starts moving.
    #[serde(default)]
    pub delay: f32,
    #[serde(default)]
    pub easing: Easing,
}

impl CurveSpec {
    pub fn new(from: Option<f32>, to: Option<f32>, duration: f32) -> Self {
        Self {
            from,
            to,
            duration,
            delay: 0.0,
            easing: Easing::default(),
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    /// Time at which this curve reaches its end value.
    pub fn end_time(&self) -> f32 {
        self.delay.max(0.0) + self.duration.max(0.0)
    }
}

/// The named curve set of one transition direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub size: CurveSpec,
    pub randomness: CurveSpec,
    pub depth: CurveSpec,
}

impl TransitionConfig {
    /// Particles grow in while scatter and depth collapse to steady state.
    /// Depth settles half again as slowly as the others.
    pub fn materialize(duration: f32) -> Self {
        Self {
            size: CurveSpec::new(Some(0.5), None, duration),
            randomness: CurveSpec::new(Some(5.0), None, duration),
            depth: CurveSpec::new(Some(40.0), None, duration * 1.5),
        }
    }

    /// Scatter grows, depth swings far negative, size shrinks to nothing.
    pub fn dissolve(duration: f32) -> Self {
        Self {
            size: CurveSpec::new(None, Some(0.0), duration * 0.8),
            randomness: CurveSpec::new(None, Some(5.0), duration),
            depth: CurveSpec::new(None, Some(-20.0), duration).with_easing(Easing::Power2In),
        }
    }

    fn curves(&self) -> [(Param, CurveSpec); 3] {
        [
            (Param::Size, self.size),
            (Param::Randomness, self.randomness),
            (Param::Depth, self.depth),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveCurve {
    param: Param,
    curve: CurveSpec,
    start: f32,
    end: f32,
}

impl ActiveCurve {
    fn value_at(&self, elapsed: f32) -> f32 {
        let local = elapsed - self.curve.delay.max(0.0);
        let duration = self.curve.duration.max(0.0);
        let progress = if duration <= 0.0 {
            if local >= 0.0 { 1.0 } else { 0.0 }
        } else {
            local / duration
        };
        self.start + (self.end - self.start) * self.curve.easing.apply(progress)
    }
}

/// Continuation run once when a timeline finishes.
pub type Completion = Box<dyn FnOnce()>;

/// One in-flight transition.
pub struct Timeline {
    kind: TransitionKind,
    config: TransitionConfig,
    steady: FieldParams,
    curves: Vec<ActiveCurve>,
    elapsed: f32,
    duration: f32,
    on_complete: Option<Completion>,
}

impl Timeline {
    /// Build a timeline for `kind`. Unset end values resolve against `steady`.
    pub fn new(kind: TransitionKind, config: &TransitionConfig, steady: &FieldParams) -> Self {
        let duration = config
            .curves()
            .iter()
            .map(|(_, curve)| curve.end_time())
            .fold(0.0, f32::max);

        Self {
            kind,
            config: config.clone(),
            steady: *steady,
            curves: Vec::new(),
            elapsed: 0.0,
            duration,
            on_complete: None,
        }
    }

    /// Attach the completion continuation.
    pub fn with_on_complete(mut self, f: impl FnOnce() + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    #[inline]
    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    /// Total length in seconds (the longest curve).
    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Resolve start and end values and apply any explicit start values.
    fn begin(&mut self, params: &mut FieldParams) {
        self.curves = self
            .config
            .curves()
            .iter()
            .map(|&(param, curve)| ActiveCurve {
                param,
                curve,
                start: curve.from.unwrap_or_else(|| params.get(param)),
                end: curve.to.unwrap_or_else(|| self.steady.get(param)),
            })
            .collect();

        for curve in &self.curves {
            if curve.curve.from.is_some() {
                params.set(curve.param, curve.start);
            }
        }
    }

    /// Point curves without an explicit end value at a new steady state.
    fn retarget(&mut self, steady: &FieldParams) {
        self.steady = *steady;
        for curve in &mut self.curves {
            if curve.curve.to.is_none() {
                curve.end = steady.get(curve.param);
            }
        }
    }

    /// Move forward by `dt` and write current values into `params`.
    /// Returns `true` once the timeline has finished; the continuation has
    /// run by then.
    fn advance(&mut self, dt: f32, params: &mut FieldParams) -> bool {
        self.elapsed += if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        for curve in &self.curves {
            params.set(curve.param, curve.value_at(self.elapsed));
        }

        if self.elapsed >= self.duration {
            for curve in &self.curves {
                params.set(curve.param, curve.end);
            }
            if let Some(done) = self.on_complete.take() {
                done();
            }
            return true;
        }
        false
    }
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("kind", &self.kind)
            .field("elapsed", &self.elapsed)
            .field("duration", &self.duration)
            .field("has_on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Holds at most one active timeline.
#[derive(Debug, Default)]
pub struct TransitionDriver {
    active: Option<Timeline>,
}

impl TransitionDriver {
    /// Start `timeline`, superseding any in-flight one. The superseded
    /// timeline's continuation never runs. Returns the superseded kind.
    pub fn start(&mut self, mut timeline: Timeline, params: &mut FieldParams) -> Option<TransitionKind> {
        let superseded = self.cancel();
        timeline.begin(params);
        log::debug!("Starting {:?} over {:.2}s", timeline.kind, timeline.duration);
        self.active = Some(timeline);
        superseded
    }

    /// Drop the active timeline without running its continuation.
    pub fn cancel(&mut self) -> Option<TransitionKind> {
        let cancelled = self.active.take().map(|t| t.kind);
        if let Some(kind) = cancelled {
            log::debug!("Cancelled in-flight {:?}", kind);
        }
        cancelled
    }

    /// Advance the active timeline. Returns its kind on the call it finishes.
    pub fn advance(&mut self, dt: f32, params: &mut FieldParams) -> Option<TransitionKind> {
        let timeline = self.active.as_mut()?;
        if !timeline.advance(dt, params) {
            return None;
        }
        let kind = timeline.kind;
        self.active = None;
        log::debug!("Finished {:?}", kind);
        Some(kind)
    }

    /// Let the active timeline finish on `steady` wherever its curves have
    /// no explicit end value.
    pub fn retarget(&mut self, steady: &FieldParams) {
        if let Some(timeline) = self.active.as_mut() {
            timeline.retarget(steady);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_kind(&self) -> Option<TransitionKind> {
        self.active.as_ref().map(|t| t.kind)
    }

    /// Progress of the active timeline in `[0, 1]`.
    pub fn progress(&self) -> Option<f32> {
        self.active.as_ref().map(|t| {
            if t.duration <= 0.0 {
                1.0
            } else {
                (t.elapsed / t.duration).min(1.0)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce() + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, move || c.set(c.get() + 1))
    }

    fn run_to_end(driver: &mut TransitionDriver, params: &mut FieldParams) -> TransitionKind {
        for _ in 0..10_000 {
            if let Some(kind) = driver.advance(1.0 / 60.0, params) {
                return kind;
            }
        }
        panic!("timeline never finished");
    }

    #[test]
    fn test_materialize_reaches_steady_state() {
        let steady = FieldParams::default();
        let mut params = FieldParams::INITIAL;
        let mut driver = TransitionDriver::default();

        let timeline = Timeline::new(TransitionKind::Materialize, &TransitionConfig::materialize(1.0), &steady);
        assert!((timeline.duration() - 1.5).abs() < 1e-6);
        driver.start(timeline, &mut params);

        // Explicit start values apply immediately.
        assert_eq!(params.size, 0.5);
        assert_eq!(params.randomness, 5.0);
        assert_eq!(params.depth, 40.0);

        assert_eq!(run_to_end(&mut driver, &mut params), TransitionKind::Materialize);
        assert_eq!(params, steady);
        assert!(!driver.is_active());
    }

    #[test]
    fn test_depth_outlasts_size() {
        let steady = FieldParams::default();
        let mut params = FieldParams::INITIAL;
        let mut driver = TransitionDriver::default();
        driver.start(
            Timeline::new(TransitionKind::Materialize, &TransitionConfig::materialize(1.0), &steady),
            &mut params,
        );

        assert_eq!(driver.advance(1.1, &mut params), None);
        assert_eq!(params.size, steady.size);
        assert!(params.depth > steady.depth);
    }

    #[test]
    fn test_dissolve_starts_from_current_values() {
        let steady = FieldParams::default();
        let mut params = steady;
        let mut driver = TransitionDriver::default();
        driver.start(
            Timeline::new(TransitionKind::Dissolve, &TransitionConfig::dissolve(0.8), &steady),
            &mut params,
        );
        assert_eq!(params, steady);

        driver.advance(0.4, &mut params);
        assert!(params.randomness > steady.randomness && params.randomness < 5.0);
        assert!(params.depth < steady.depth);

        run_to_end(&mut driver, &mut params);
        assert_eq!(params.size, 0.0);
        assert_eq!(params.randomness, 5.0);
        assert_eq!(params.depth, -20.0);
    }

    #[test]
    fn test_on_complete_runs_once() {
        let steady = FieldParams::default();
        let mut params = steady;
        let (count, done) = counter();
        let mut driver = TransitionDriver::default();
        driver.start(
            Timeline::new(TransitionKind::Dissolve, &TransitionConfig::dissolve(0.5), &steady).with_on_complete(done),
            &mut params,
        );

        run_to_end(&mut driver, &mut params);
        for _ in 0..10 {
            assert_eq!(driver.advance(1.0, &mut params), None);
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_superseded_timeline_never_completes() {
        let steady = FieldParams::default();
        let mut params = FieldParams::INITIAL;
        let (shown, on_shown) = counter();
        let (hidden, on_hidden) = counter();
        let mut driver = TransitionDriver::default();

        driver.start(
            Timeline::new(TransitionKind::Materialize, &TransitionConfig::materialize(1.0), &steady)
                .with_on_complete(on_shown),
            &mut params,
        );
        driver.advance(0.3, &mut params);

        let superseded = driver.start(
            Timeline::new(TransitionKind::Dissolve, &TransitionConfig::dissolve(0.8), &steady)
                .with_on_complete(on_hidden),
            &mut params,
        );
        assert_eq!(superseded, Some(TransitionKind::Materialize));
        assert_eq!(driver.active_kind(), Some(TransitionKind::Dissolve));

        assert_eq!(run_to_end(&mut driver, &mut params), TransitionKind::Dissolve);
        assert_eq!(shown.get() + hidden.get(), 1);
        assert_eq!(hidden.get(), 1);
    }

    #[test]
    fn test_zero_duration_finishes_on_first_advance() {
        let steady = FieldParams::default();
        let mut params = FieldParams::INITIAL;
        let mut driver = TransitionDriver::default();
        driver.start(
            Timeline::new(TransitionKind::Materialize, &TransitionConfig::materialize(0.0), &steady),
            &mut params,
        );
        assert_eq!(driver.advance(0.0, &mut params), Some(TransitionKind::Materialize));
        assert_eq!(params, steady);
    }

    #[test]
    fn test_delay_holds_start_value() {
        let config = TransitionConfig {
            size: CurveSpec::new(Some(0.0), Some(1.0), 1.0).with_delay(0.5).with_easing(Easing::Linear),
            randomness: CurveSpec::new(None, None, 0.0),
            depth: CurveSpec::new(None, None, 0.0),
        };
        let mut params = FieldParams::INITIAL;
        let mut driver = TransitionDriver::default();
        driver.start(Timeline::new(TransitionKind::Materialize, &config, &FieldParams::default()), &mut params);

        driver.advance(0.25, &mut params);
        assert_eq!(params.size, 0.0);
        driver.advance(0.75, &mut params);
        assert!((params.size - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [Easing::Linear, Easing::Power1Out, Easing::Power2In, Easing::Power2Out, Easing::SineInOut] {
            assert!(easing.apply(0.0).abs() < 1e-6, "{:?}", easing);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6, "{:?}", easing);
        }
        assert!(Easing::Power2In.apply(0.5) < 0.5);
        assert!(Easing::Power1Out.apply(0.5) > 0.5);
    }
}
