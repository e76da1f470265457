//! Density filtering: which pixels become particles.
//!
//! Dark pixels contribute nothing visible, so only pixels whose channel value
//! is strictly above the threshold are kept. The scan is row-major over a
//! bottom-up image (row 0 is the bottom row of the picture), which makes the
//! resulting pixel indices map straight onto a y-up plane.
//!
//! Large images are scanned row-parallel with `rayon`; rows are joined back
//! in order, so the output is identical to the sequential scan.

use crate::error::DecodeError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Images with fewer pixels than this are scanned on the calling thread.
const PARALLEL_MIN_PIXELS: usize = 1 << 16;

/// Channel the filter compares against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// The red channel (matches greyscale sources exactly).
    #[default]
    Red,
    /// Rec. 601 luma of the RGB channels.
    Luma,
}

impl Channel {
    /// Read this channel from one RGBA pixel.
    #[inline]
    pub fn read(self, rgba: &[u8]) -> u8 {
        match self {
            Channel::Red => rgba[0],
            Channel::Luma => {
                let (r, g, b) = (rgba[0] as u32, rgba[1] as u32, rgba[2] as u32);
                ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
            }
        }
    }
}

/// A decoded RGBA8 image stored bottom-up.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl DecodedImage {
    /// Wrap raw bottom-up RGBA data (4 bytes per pixel).
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DecodeError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(DecodeError::SizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { width, height, pixels })
    }

    /// Build an opaque grey image from one value per pixel.
    ///
    /// Handy for synthetic sources and tests:
    ///
    /// ```ignore
    /// let img = DecodedImage::from_grey(2, 1, &[0, 255])?;
    /// ```
    pub fn from_grey(width: u32, height: u32, values: &[u8]) -> Result<Self, DecodeError> {
        let expected = width as usize * height as usize;
        if values.len() != expected {
            return Err(DecodeError::SizeMismatch {
                expected: expected * 4,
                actual: values.len() * 4,
            });
        }
        let pixels = values.iter().flat_map(|&v| [v, v, v, 255]).collect();
        Ok(Self { width, height, pixels })
    }

    /// Convert a decoded `image` crate image, flipping it so row 0 is the bottom.
    pub fn from_dynamic(img: image::DynamicImage) -> Self {
        let rgba = image::imageops::flip_vertical(&img.into_rgba8());
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            pixels: rgba.into_raw(),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `width * height`.
    #[inline]
    pub fn total_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Raw bottom-up RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Channel value at a flat pixel index.
    pub fn channel_at(&self, index: u32, channel: Channel) -> u8 {
        let at = index as usize * 4;
        channel.read(&self.pixels[at..at + 4])
    }
}

/// Retained pixel indices using the red channel.
pub fn filter(image: &DecodedImage, threshold: u8) -> Vec<u32> {
    filter_with(image, threshold, Channel::Red)
}

/// Retained pixel indices, in scan order, for pixels whose `channel` value
/// exceeds `threshold`.
///
/// An all-dark image yields an empty vector; that is a valid field.
pub fn filter_with(image: &DecodedImage, threshold: u8, channel: Channel) -> Vec<u32> {
    let row_bytes = image.width as usize * 4;
    if row_bytes == 0 || image.height == 0 {
        return Vec::new();
    }

    let width = image.width;
    if image.total_pixels() < PARALLEL_MIN_PIXELS {
        image
            .pixels
            .chunks_exact(row_bytes)
            .enumerate()
            .flat_map(|(y, row)| scan_row(row, y as u32 * width, threshold, channel))
            .collect()
    } else {
        image
            .pixels
            .par_chunks_exact(row_bytes)
            .enumerate()
            .flat_map_iter(|(y, row)| scan_row(row, y as u32 * width, threshold, channel))
            .collect()
    }
}

fn scan_row(row: &[u8], base: u32, threshold: u8, channel: Channel) -> impl Iterator<Item = u32> + '_ {
    row.chunks_exact(4)
        .enumerate()
        .filter(move |(_, px)| channel.read(px) > threshold)
        .map(move |(x, _)| base + x as u32)
}

/// Number of pixels that survive `threshold`.
pub fn count_retained(image: &DecodedImage, threshold: u8, channel: Channel) -> usize {
    image
        .pixels
        .chunks_exact(4)
        .filter(|px| channel.read(px) > threshold)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_a() -> DecodedImage {
        DecodedImage::from_grey(
            4,
            4,
            &[10, 50, 90, 200, 10, 10, 10, 10, 200, 200, 10, 10, 10, 10, 200, 10],
        )
        .unwrap()
    }

    #[test]
    fn test_reference_scenario() {
        let indices = filter(&image_a(), 34);
        assert_eq!(indices, vec![2, 3, 8, 9, 14]);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let img = DecodedImage::from_grey(3, 1, &[33, 34, 35]).unwrap();
        assert_eq!(filter(&img, 34), vec![2]);
    }

    #[test]
    fn test_all_black_is_empty() {
        let img = DecodedImage::from_grey(8, 8, &[0; 64]).unwrap();
        assert!(filter(&img, 0).is_empty());
    }

    #[test]
    fn test_count_is_monotonic_in_threshold() {
        let img = image_a();
        let mut last = usize::MAX;
        for threshold in 0..=255u8 {
            let count = filter(&img, threshold).len();
            assert_eq!(count, count_retained(&img, threshold, Channel::Red));
            assert!(count <= last);
            last = count;
        }
    }

    #[test]
    fn test_parallel_scan_matches_sequential() {
        let (w, h) = (300u32, 300u32);
        let values: Vec<u8> = (0..w * h).map(|i| ((i * 7919) % 256) as u8).collect();
        let img = DecodedImage::from_grey(w, h, &values).unwrap();
        assert!(img.total_pixels() >= PARALLEL_MIN_PIXELS);

        let expected: Vec<u32> = values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > 100)
            .map(|(i, _)| i as u32)
            .collect();
        assert_eq!(filter(&img, 100), expected);
    }

    #[test]
    fn test_luma_channel() {
        let img = DecodedImage::from_rgba(2, 1, vec![255, 0, 0, 255, 0, 255, 0, 255]).unwrap();
        assert_eq!(img.channel_at(0, Channel::Luma), 76);
        assert_eq!(img.channel_at(1, Channel::Luma), 150);
        assert_eq!(filter_with(&img, 100, Channel::Luma), vec![1]);
        assert_eq!(filter_with(&img, 100, Channel::Red), vec![0]);
    }

    #[test]
    fn test_size_mismatch() {
        assert!(matches!(
            DecodedImage::from_rgba(2, 2, vec![0; 15]),
            Err(DecodeError::SizeMismatch { expected: 16, actual: 15 })
        ));
    }

    #[test]
    fn test_from_dynamic_flips_rows() {
        let mut buf = image::RgbaImage::new(1, 2);
        buf.put_pixel(0, 0, image::Rgba([200, 0, 0, 255]));
        buf.put_pixel(0, 1, image::Rgba([10, 0, 0, 255]));
        let img = DecodedImage::from_dynamic(image::DynamicImage::ImageRgba8(buf));
        // Top row of the source is now the last row.
        assert_eq!(filter(&img, 100), vec![1]);
    }
}
