//! Video frames as they move through the stream loop.
//!
//! - `Frame`: an RGB image plus its position in the stream.
//! - Resizing to the fixed inference/render size.
//! - Overlay rendering of detection boxes, coloured by waste category.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::time::Instant;

use crate::category::CategoryTable;
use crate::detect::Detection;

/// Default processing width.
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
/// Default processing height (16:9 at the default width).
pub const DEFAULT_FRAME_HEIGHT: u32 = DEFAULT_FRAME_WIDTH * 9 / 16;

const OVERLAY_THICKNESS: u32 = 2;
const UNKNOWN_COLOR: [u8; 3] = [160, 160, 160];

/// A decoded RGB frame.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    /// Wrap packed RGB24 bytes. Fails when the buffer does not match the dimensions.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("RGB frame buffer rejected for {}x{}", width, height))?;
        Ok(Self::from_image(image, sequence))
    }

    pub fn from_image(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Position of this frame in its stream (1-based).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Packed RGB24 pixel bytes.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Resize to exactly `width`×`height`. Returns a copy when already that size.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if self.width() == width && self.height() == height {
            return self.clone();
        }
        Frame {
            image: imageops::resize(&self.image, width, height, FilterType::Triangle),
            sequence: self.sequence,
            captured_at: self.captured_at,
        }
    }

    /// Copy of this frame with a box outline drawn for every detection.
    ///
    /// Boxes take the colour of the label's category; labels without a
    /// category are drawn grey.
    pub fn annotated(&self, detections: &[Detection], table: &CategoryTable) -> Frame {
        let mut image = self.image.clone();
        for detection in detections {
            let color = table
                .category_of(&detection.label)
                .map(|c| c.color())
                .unwrap_or(UNKNOWN_COLOR);
            draw_box(&mut image, detection, Rgb(color));
        }
        Frame {
            image,
            sequence: self.sequence,
            captured_at: self.captured_at,
        }
    }
}

fn draw_box(image: &mut RgbImage, detection: &Detection, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let to_px = |v: f32, extent: u32| -> u32 {
        let max = (extent - 1) as f32;
        (v.clamp(0.0, 1.0) * max).round() as u32
    };
    let x0 = to_px(detection.x, width);
    let y0 = to_px(detection.y, height);
    let x1 = to_px(detection.x + detection.w, width);
    let y1 = to_px(detection.y + detection.h, height);
    if x1 < x0 || y1 < y0 {
        return;
    }

    for t in 0..OVERLAY_THICKNESS {
        let top = (y0 + t).min(y1);
        let bottom = y1.saturating_sub(t).max(y0);
        for x in x0..=x1 {
            image.put_pixel(x, top, color);
            image.put_pixel(x, bottom, color);
        }
        let left = (x0 + t).min(x1);
        let right = x1.saturating_sub(t).max(x0);
        for y in y0..=y1 {
            image.put_pixel(left, y, color);
            image.put_pixel(right, y, color);
        }
    }
}
