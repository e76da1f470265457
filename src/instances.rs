//! Per-particle instance data.
//!
//! Every retained pixel becomes one instance of a shared unit quad. An
//! instance carries three parallel attributes:
//!
//! | Attribute | Type | Meaning |
//! |-----------|------|---------|
//! | `pixel_index` | `u32` | Flat index into the source pixel grid |
//! | `offset` | `Vec2` | `(index % width, index / width)` grid coordinate |
//! | `phase` | `f32` | Random value in `[0, π)` that desynchronizes animation |
//!
//! The three arrays always have the same length and the same order as the
//! filtered pixel indices. They are never resized in place; a new image gets
//! a new [`ParticleInstances`].

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::Rng;
use std::f32::consts::PI;

/// Corner positions of the unit quad shared by every instance.
pub const QUAD_POSITIONS: [[f32; 3]; 4] = [
    [-0.5, 0.5, 0.0],
    [0.5, 0.5, 0.0],
    [-0.5, -0.5, 0.0],
    [0.5, -0.5, 0.0],
];

/// Texture coordinates of the unit quad.
pub const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

/// Triangle indices of the unit quad.
pub const QUAD_INDICES: [u16; 6] = [0, 2, 1, 2, 3, 1];

/// Instance buffers for one particle field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleInstances {
    pixel_index: Vec<u32>,
    offset: Vec<Vec2>,
    phase: Vec<f32>,
}

impl ParticleInstances {
    /// Number of instances.
    #[inline]
    pub fn len(&self) -> usize {
        self.pixel_index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixel_index.is_empty()
    }

    pub fn pixel_index(&self) -> &[u32] {
        &self.pixel_index
    }

    pub fn offset(&self) -> &[Vec2] {
        &self.offset
    }

    pub fn phase(&self) -> &[f32] {
        &self.phase
    }

    /// Check every structural invariant against the source dimensions:
    /// equal lengths, indices strictly increasing and in range, offsets that
    /// round-trip to their index, phases in `[0, π)`.
    pub fn is_consistent(&self, width: u32, height: u32) -> bool {
        let total = width as u64 * height as u64;
        if self.offset.len() != self.len() || self.phase.len() != self.len() {
            return false;
        }

        let increasing = self.pixel_index.windows(2).all(|w| w[0] < w[1]);
        let in_range = self.pixel_index.iter().all(|&i| (i as u64) < total);
        let round_trip = self
            .pixel_index
            .iter()
            .zip(&self.offset)
            .all(|(&i, o)| o.x as u32 + o.y as u32 * width == i);
        let phases = self.phase.iter().all(|p| (0.0..PI).contains(p));

        increasing && in_range && round_trip && phases
    }

    /// Interleave into the GPU instance layout.
    ///
    /// `grey` holds one brightness value per instance; missing entries read as 1.
    pub fn to_gpu(&self, grey: &[f32]) -> Vec<InstanceGpu> {
        (0..self.len())
            .map(|i| InstanceGpu {
                offset: [self.offset[i].x, self.offset[i].y, 0.0],
                pixel_index: self.pixel_index[i],
                phase: self.phase[i],
                grey: grey.get(i).copied().unwrap_or(1.0),
                _pad: [0.0; 2],
            })
            .collect()
    }
}

/// Build instance buffers from filtered pixel indices.
///
/// Indices are expected in scan order, as produced by
/// [`filter`](crate::density::filter). Empty input yields empty buffers.
pub fn build_instances<R: Rng + ?Sized>(pixel_index: Vec<u32>, width: u32, rng: &mut R) -> ParticleInstances {
    let width = width.max(1);

    let offset = pixel_index
        .iter()
        .map(|&i| Vec2::new((i % width) as f32, (i / width) as f32))
        .collect();

    let phase = pixel_index.iter().map(|_| rng.gen_range(0.0..PI)).collect();

    ParticleInstances {
        pixel_index,
        offset,
        phase,
    }
}

/// One particle instance as laid out in the GPU vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceGpu {
    /// Grid coordinate; `z` is reserved and always 0.
    pub offset: [f32; 3],
    pub pixel_index: u32,
    pub phase: f32,
    /// Source brightness in `[0, 1]`, used to scale point size.
    pub grey: f32,
    pub _pad: [f32; 2],
}
