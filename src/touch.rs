//! Decaying pointer influence field.
//!
//! Pointer moves are recorded as points in UV space. Each tick the points
//! lose strength, faded points are dropped, and the survivors are splatted
//! into a square grid that the motion model samples per particle.
//!
//! # Grid layout
//!
//! The grid stores `resolution × resolution` nodes placed at `k / (resolution - 1)`
//! on both axes, so the corners of UV space are nodes. With the default odd
//! resolution the centre `(0.5, 0.5)` is a node as well.
//!
//! Kernels are evaluated with their support shrunk by one cell diagonal. A
//! bilinear sample reads the four nodes around it, all within one diagonal,
//! so any sample farther than `radius` from every active point reads exactly
//! zero.
//!
//! # Events between ticks
//!
//! [`TouchInfluenceMap::add_touch`] only queues the point. The grid is read
//! and rewritten solely in [`TouchInfluenceMap::update`], so a burst of
//! events never leaves it half-written.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Largest radius the map accepts.
pub const MAX_RADIUS: f32 = 0.5;

/// Kernel shape from 1 at the centre to 0 at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Falloff {
    /// `1 - t`.
    Linear,
    /// `1 - smoothstep(0, 1, t)`.
    #[default]
    Smooth,
}

impl Falloff {
    /// Kernel weight at normalized distance `t` (0 = centre, 1 = edge).
    #[inline]
    pub fn weight(self, t: f32) -> f32 {
        if t >= 1.0 {
            return 0.0;
        }
        let t = t.max(0.0);
        match self {
            Falloff::Linear => 1.0 - t,
            Falloff::Smooth => 1.0 - t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Touch map configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    /// Nodes per axis. Independent of image size.
    pub resolution: usize,
    /// Influence radius in UV units.
    pub radius: f32,
    /// Fraction of strength left after one second.
    pub decay_per_second: f32,
    /// Points weaker than this are removed.
    pub epsilon: f32,
    /// Oldest points are dropped beyond this count.
    pub max_points: usize,
    pub falloff: Falloff,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            resolution: 65,
            radius: 0.15,
            decay_per_second: 0.1,
            epsilon: 0.01,
            max_points: 256,
            falloff: Falloff::Smooth,
        }
    }
}

/// One recorded pointer position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub uv: Vec2,
    /// Current strength in `(epsilon, 1]`.
    pub strength: f32,
    /// Seconds since the point was added or last refreshed.
    pub age: f32,
}

/// Decaying 2D influence field driven by pointer input.
#[derive(Debug, Clone)]
pub struct TouchInfluenceMap {
    resolution: usize,
    radius: f32,
    decay_per_second: f32,
    epsilon: f32,
    max_points: usize,
    falloff: Falloff,
    /// Active points in arrival order.
    points: VecDeque<TouchPoint>,
    /// Touches received since the last update.
    pending: Vec<Vec2>,
    field: Vec<f32>,
}

impl TouchInfluenceMap {
    /// Create a map from its configuration.
    pub fn new(config: &TouchConfig) -> Self {
        let resolution = config.resolution.max(2);
        Self {
            resolution,
            radius: config.radius.clamp(0.0, MAX_RADIUS),
            decay_per_second: config.decay_per_second.clamp(0.0, 1.0),
            epsilon: config.epsilon.max(f32::MIN_POSITIVE),
            max_points: config.max_points.max(1),
            falloff: config.falloff,
            points: VecDeque::new(),
            pending: Vec::new(),
            field: vec![0.0; resolution * resolution],
        }
    }

    // ========== Queries ==========

    /// Nodes per axis.
    #[inline]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Active points in arrival order.
    pub fn points(&self) -> impl Iterator<Item = &TouchPoint> {
        self.points.iter()
    }

    /// Number of active points (queued touches excluded).
    pub fn active_count(&self) -> usize {
        self.points.len()
    }

    /// Row-major node values, each in `[0, 1]`.
    pub fn field(&self) -> &[f32] {
        &self.field
    }

    /// Node values quantized to one byte each, for uploading as a texture.
    pub fn to_texture_bytes(&self) -> Vec<u8> {
        self.field.iter().map(|v| (v * 255.0).round() as u8).collect()
    }

    /// Bilinear lookup at `uv`. Anything outside the unit square reads 0.
    pub fn sample(&self, uv: Vec2) -> f32 {
        if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
            return 0.0;
        }

        let last = (self.resolution - 1) as f32;
        let gx = uv.x * last;
        let gy = uv.y * last;
        let x0 = (gx.floor() as usize).min(self.resolution - 2);
        let y0 = (gy.floor() as usize).min(self.resolution - 2);
        let fx = gx - x0 as f32;
        let fy = gy - y0 as f32;

        let at = |x: usize, y: usize| self.field[y * self.resolution + x];
        let bottom = at(x0, y0) * (1.0 - fx) + at(x0 + 1, y0) * fx;
        let top = at(x0, y0 + 1) * (1.0 - fx) + at(x0 + 1, y0 + 1) * fx;
        (bottom * (1.0 - fy) + top * fy).clamp(0.0, 1.0)
    }

    /// Central-difference gradient of the field at `uv`, in UV units.
    pub fn gradient(&self, uv: Vec2) -> Vec2 {
        let h = 1.0 / (self.resolution - 1) as f32;
        let dx = self.sample(uv + Vec2::new(h, 0.0)) - self.sample(uv - Vec2::new(h, 0.0));
        let dy = self.sample(uv + Vec2::new(0.0, h)) - self.sample(uv - Vec2::new(0.0, h));
        Vec2::new(dx, dy) / (2.0 * h)
    }

    // ========== Mutation ==========

    /// Record a pointer position. Takes effect at the next [`update`](Self::update).
    ///
    /// Positions outside the unit square or non-finite are ignored.
    pub fn add_touch(&mut self, uv: Vec2) {
        if uv.is_finite() && (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y) {
            self.pending.push(uv);
        }
    }

    /// Set the influence radius, clamped to `[0, MAX_RADIUS]`.
    pub fn set_radius(&mut self, radius: f32) {
        if radius.is_finite() {
            self.radius = radius.clamp(0.0, MAX_RADIUS);
        }
    }

    /// Drop every point and zero the grid.
    pub fn clear(&mut self) {
        self.points.clear();
        self.pending.clear();
        self.field.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Advance by `dt` seconds and rebuild the grid.
    ///
    /// Existing points decay first; touches queued since the last update are
    /// then merged at full strength, so a fresh touch always contributes 1.
    pub fn update(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let factor = self.decay_per_second.powf(dt);

        for point in &mut self.points {
            point.strength *= factor;
            point.age += dt;
        }
        let epsilon = self.epsilon;
        self.points.retain(|p| p.strength >= epsilon);

        self.merge_pending();
        self.rebuild();
    }

    /// Fold queued touches into the active set. A touch landing on an
    /// existing point's node refreshes that point instead of adding another.
    fn merge_pending(&mut self) {
        let same_node = 0.5 / (self.resolution - 1) as f32;

        for uv in std::mem::take(&mut self.pending) {
            match self.points.iter_mut().find(|p| p.uv.distance(uv) < same_node) {
                Some(point) => {
                    point.strength = 1.0;
                    point.age = 0.0;
                }
                None => self.points.push_back(TouchPoint {
                    uv,
                    strength: 1.0,
                    age: 0.0,
                }),
            }
        }

        while self.points.len() > self.max_points {
            self.points.pop_front();
        }
    }

    fn rebuild(&mut self) {
        self.field.iter_mut().for_each(|v| *v = 0.0);

        let last = (self.resolution - 1) as f32;
        let support = self.radius - std::f32::consts::SQRT_2 / last;
        if support <= 0.0 {
            return;
        }

        for point in &self.points {
            let lo_x = ((point.uv.x - support) * last).ceil().max(0.0) as usize;
            let hi_x = ((point.uv.x + support) * last).floor().min(last) as usize;
            let lo_y = ((point.uv.y - support) * last).ceil().max(0.0) as usize;
            let hi_y = ((point.uv.y + support) * last).floor().min(last) as usize;

            for y in lo_y..=hi_y {
                for x in lo_x..=hi_x {
                    let node = Vec2::new(x as f32 / last, y as f32 / last);
                    let weight = self.falloff.weight(node.distance(point.uv) / support);
                    if weight > 0.0 {
                        self.field[y * self.resolution + x] += point.strength * weight;
                    }
                }
            }
        }

        self.field.iter_mut().for_each(|v| *v = v.clamp(0.0, 1.0));
    }
}

impl Default for TouchInfluenceMap {
    fn default() -> Self {
        Self::new(&TouchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with_radius(radius: f32) -> TouchInfluenceMap {
        TouchInfluenceMap::new(&TouchConfig {
            radius,
            ..Default::default()
        })
    }

    #[test]
    fn test_centre_and_outside_radius() {
        let mut map = map_with_radius(0.15);
        map.add_touch(Vec2::new(0.5, 0.5));
        map.update(0.016);

        assert_eq!(map.sample(Vec2::new(0.5, 0.5)), 1.0);
        assert_eq!(map.sample(Vec2::new(0.9, 0.9)), 0.0);
    }

    #[test]
    fn test_touch_waits_for_update() {
        let mut map = TouchInfluenceMap::default();
        map.add_touch(Vec2::new(0.5, 0.5));
        assert_eq!(map.sample(Vec2::new(0.5, 0.5)), 0.0);
        assert_eq!(map.active_count(), 0);
        map.update(0.0);
        assert_eq!(map.active_count(), 1);
    }

    #[test]
    fn test_strictly_decreasing_then_evicted() {
        let mut map = TouchInfluenceMap::default();
        let uv = Vec2::new(0.5, 0.5);
        map.add_touch(uv);
        map.update(0.0);

        let mut last = map.sample(uv);
        let mut frames = 0;
        while map.active_count() > 0 {
            map.update(1.0 / 60.0);
            let now = map.sample(uv);
            if map.active_count() > 0 {
                assert!(now < last, "frame {}: {} !< {}", frames, now, last);
            } else {
                assert_eq!(now, 0.0);
            }
            last = now;
            frames += 1;
            assert!(frames < 10_000);
        }
        assert_eq!(map.sample(uv), 0.0);
    }

    #[test]
    fn test_zero_outside_radius_everywhere() {
        let mut map = map_with_radius(0.1);
        let centres = [Vec2::new(0.3, 0.3), Vec2::new(0.72, 0.41)];
        for c in centres {
            map.add_touch(c);
        }
        map.update(0.0);

        for j in 0..=100 {
            for i in 0..=100 {
                let uv = Vec2::new(i as f32 / 100.0, j as f32 / 100.0);
                if centres.iter().all(|c| c.distance(uv) > 0.1) {
                    assert_eq!(map.sample(uv), 0.0, "non-zero at {:?}", uv);
                }
            }
        }
    }

    #[test]
    fn test_overlap_accumulates_and_clamps() {
        let mut map = map_with_radius(0.2);
        map.add_touch(Vec2::new(0.45, 0.5));
        map.add_touch(Vec2::new(0.55, 0.5));
        map.update(0.0);

        let between = map.sample(Vec2::new(0.5, 0.5));
        assert_eq!(between, 1.0);
        assert!(map.field().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_refresh_restores_strength() {
        let mut map = TouchInfluenceMap::default();
        let uv = Vec2::new(0.25, 0.75);
        map.add_touch(uv);
        map.update(0.0);
        map.update(0.5);
        assert!(map.points().next().unwrap().strength < 1.0);

        map.add_touch(uv);
        map.update(0.0);
        assert_eq!(map.active_count(), 1);
        let point = map.points().next().unwrap();
        assert_eq!(point.strength, 1.0);
        assert_eq!(point.age, 0.0);
    }

    #[test]
    fn test_arrival_order_and_cap() {
        let mut map = TouchInfluenceMap::new(&TouchConfig {
            max_points: 3,
            ..Default::default()
        });
        for i in 0..5 {
            map.add_touch(Vec2::new(0.1 + i as f32 * 0.2, 0.5));
        }
        map.update(0.0);

        let xs: Vec<f32> = map.points().map(|p| p.uv.x).collect();
        assert_eq!(xs.len(), 3);
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
        assert!((xs[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_touches_ignored() {
        let mut map = TouchInfluenceMap::default();
        map.add_touch(Vec2::new(1.5, 0.5));
        map.add_touch(Vec2::new(f32::NAN, 0.5));
        map.update(0.1);
        assert_eq!(map.active_count(), 0);
        assert_eq!(map.sample(Vec2::new(-0.1, 0.5)), 0.0);
    }

    #[test]
    fn test_radius_clamped() {
        let mut map = TouchInfluenceMap::default();
        map.set_radius(3.0);
        assert_eq!(map.radius(), MAX_RADIUS);
        map.set_radius(-1.0);
        assert_eq!(map.radius(), 0.0);

        map.add_touch(Vec2::new(0.5, 0.5));
        map.update(0.0);
        assert!(map.field().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_gradient_points_toward_touch() {
        let mut map = map_with_radius(0.3);
        map.add_touch(Vec2::new(0.5, 0.5));
        map.update(0.0);

        let g = map.gradient(Vec2::new(0.4, 0.5));
        assert!(g.x > 0.0);
        assert!(g.y.abs() < 1e-3);
    }

    #[test]
    fn test_falloff_shapes() {
        assert_eq!(Falloff::Linear.weight(0.0), 1.0);
        assert_eq!(Falloff::Linear.weight(0.5), 0.5);
        assert_eq!(Falloff::Smooth.weight(0.5), 0.5);
        assert_eq!(Falloff::Smooth.weight(1.0), 0.0);
        assert_eq!(Falloff::Smooth.weight(2.0), 0.0);
    }
}
