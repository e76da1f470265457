//! Motion model: where each particle is drawn this frame.
//!
//! Particles keep no per-frame state. Every displacement is a pure function
//! of the particle's instance data, the field's shape parameters, the
//! absolute field time and the touch influence map, so frames can be
//! recomputed in any order (and in parallel).
//!
//! All variants share the base image motion: random xy scatter scaled by
//! `randomness`, a noisy spread along z scaled by `depth`, and a point size
//! that breathes with noise and scales with source brightness. Each variant
//! then layers its own effect and decides how the particle reacts to touch.
//!
//! | Variant | Effect | Touch response |
//! |---------|--------|----------------|
//! | `Scatter` | none | pushed along its phase angle and towards the camera |
//! | `Flow` | drifting sine currents | push |
//! | `Explode` | none | blown radially away from the image centre |
//! | `Wave` | travelling wave along x | push |
//! | `Spiral` | circular bob driven by phase | push |
//! | `Magnetic` | none | pulled towards the pointer |

use crate::timeline::FieldParams;
use crate::touch::TouchInfluenceMap;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// World units a full-strength touch moves a particle.
const TOUCH_PUSH: f32 = 20.0;

/// Smallest brightness factor applied to point size.
const MIN_GREY: f32 = 0.2;

/// Motion strategy, chosen when a field is built.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MotionVariant {
    /// Plain image motion.
    #[default]
    Scatter,
    /// Slow currents across the image.
    Flow { speed: f32, amplitude: f32 },
    /// Touch blows particles outward; `strength` is the expansion factor.
    Explode { strength: f32 },
    /// A wave travelling along x, moving particles in z and y.
    Wave { frequency: f32, amplitude: f32 },
    /// Each particle circles around its rest position.
    Spiral { speed: f32, amplitude: f32 },
    /// Touch attracts particles instead of repelling them.
    Magnetic { force: f32 },
}

/// Read-only view of one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSample {
    pub pixel_index: u32,
    /// Grid coordinate in pixels.
    pub offset: Vec2,
    pub phase: f32,
    /// Source brightness in `[0, 1]`.
    pub grey: f32,
}

/// Everything outside the particle that motion depends on.
#[derive(Debug, Clone, Copy)]
pub struct MotionContext<'a> {
    /// Seconds since the field was built.
    pub time: f32,
    /// Source image size in pixels.
    pub texture_size: Vec2,
    pub touch: &'a TouchInfluenceMap,
}

/// Where and how large to draw a particle, in field-local pixel units
/// centred on the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displaced {
    pub position: Vec3,
    pub size: f32,
}

/// A configured motion strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionModel {
    variant: MotionVariant,
    params: FieldParams,
}

impl MotionModel {
    pub fn new(variant: MotionVariant) -> Self {
        Self {
            variant,
            params: FieldParams::INITIAL,
        }
    }

    #[inline]
    pub fn variant(&self) -> MotionVariant {
        self.variant
    }

    /// Take the field's current shape parameters.
    pub fn configure(&mut self, params: &FieldParams) {
        self.params = *params;
    }

    pub fn params(&self) -> &FieldParams {
        &self.params
    }

    /// Displace one particle.
    pub fn step_motion(&self, particle: &ParticleSample, ctx: &MotionContext<'_>) -> Displaced {
        let FieldParams { size, randomness, depth } = self.params;
        let seed = particle.pixel_index;
        let r0 = rand(seed);
        let r1 = rand(seed ^ hash(particle.offset.x as u32));

        let mut pos = particle.offset.extend(0.0);

        pos.x += (r0 - 0.5) * randomness;
        pos.y += (r1 - 0.5) * randomness;
        let rndz = r0 + noise(seed as f32 * 0.1, ctx.time * 0.1);
        pos.z += rndz * r0 * 2.0 * depth;

        let half = ctx.texture_size * 0.5;
        pos.x -= half.x;
        pos.y -= half.y;

        let uv = if ctx.texture_size.x > 0.0 && ctx.texture_size.y > 0.0 {
            particle.offset / ctx.texture_size
        } else {
            Vec2::ZERO
        };
        let touch = ctx.touch.sample(uv);

        let mut scale = (noise(ctx.time, seed as f32) * 0.5 + 2.0) * particle.grey.max(MIN_GREY) * size;

        match self.variant {
            MotionVariant::Scatter => push(&mut pos, particle.phase, touch, rndz),
            MotionVariant::Flow { speed, amplitude } => {
                let t = ctx.time * speed;
                let (x, y) = (pos.x, pos.y);
                pos.x += (t * 2.0 + y * 0.05).sin() * amplitude;
                pos.y += (t * 1.5 + x * 0.03).cos() * amplitude * 0.5;
                push(&mut pos, particle.phase, touch, rndz);
            }
            MotionVariant::Explode { strength } => {
                let outward = pos.truncate() * (1.0 + touch * strength);
                pos.x = lerp(pos.x, outward.x, touch);
                pos.y = lerp(pos.y, outward.y, touch);
                scale *= 1.0 - touch * 0.5;
            }
            MotionVariant::Wave { frequency, amplitude } => {
                let x = pos.x;
                pos.z += (ctx.time * frequency + x * 0.05).sin() * amplitude;
                pos.y += (ctx.time * frequency * 0.7 + x * 0.03).cos() * amplitude * 0.5;
                push(&mut pos, particle.phase, touch, rndz);
            }
            MotionVariant::Spiral { speed, amplitude } => {
                let angle = (ctx.time * speed + particle.phase * 2.0).rem_euclid(TAU);
                pos.y += angle.sin() * amplitude;
                pos.z += angle.cos() * amplitude;
                push(&mut pos, particle.phase, touch, rndz);
            }
            MotionVariant::Magnetic { force } => {
                // The field rises towards the pointer, so its gradient points at it.
                let pull = ctx.touch.gradient(uv) * ctx.texture_size * (force / TOUCH_PUSH);
                pos.x += pull.x.clamp(-TOUCH_PUSH, TOUCH_PUSH);
                pos.y += pull.y.clamp(-TOUCH_PUSH, TOUCH_PUSH);
                pos.z += touch * TOUCH_PUSH * 0.5 * rndz;
            }
        }

        Displaced {
            position: pos,
            size: scale.max(0.0),
        }
    }
}

impl Default for MotionModel {
    fn default() -> Self {
        Self::new(MotionVariant::default())
    }
}

fn push(pos: &mut Vec3, phase: f32, touch: f32, rndz: f32) {
    let amount = touch * TOUCH_PUSH * rndz;
    pos.z += amount;
    pos.x += phase.cos() * amount;
    pos.y += phase.sin() * amount;
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// ============================================================================
// Hashing and noise
// ============================================================================

fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5a_d4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c_1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x3184_8bab);
    x ^= x >> 14;
    x
}

/// Uniform value in `[0, 1]` derived from `seed`.
fn rand(seed: u32) -> f32 {
    hash(seed) as f32 / u32::MAX as f32
}

fn lattice(x: i32, y: i32) -> f32 {
    rand(hash(x as u32).wrapping_add(y as u32)) * 2.0 - 1.0
}

/// Smooth value noise in `[-1, 1]`.
fn noise(x: f32, y: f32) -> f32 {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (sx, sy) = (fx * fx * (3.0 - 2.0 * fx), fy * fy * (3.0 - 2.0 * fy));
    let (ix, iy) = (x0 as i32, y0 as i32);

    let bottom = lerp(lattice(ix, iy), lattice(ix + 1, iy), sx);
    let top = lerp(lattice(ix, iy + 1), lattice(ix + 1, iy + 1), sx);
    lerp(bottom, top, sy)
}
