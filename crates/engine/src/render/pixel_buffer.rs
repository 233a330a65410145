use thiserror::Error;

use crate::geometry::{GeometryError, PointPx, Rect};

pub const CHANNELS: usize = 4;
pub const R: usize = 0;
pub const G: usize = 1;
pub const B: usize = 2;
pub const A: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PixelBufferError {
    #[error(
        "pixel data is {actual_width}x{actual_height} but the target is {expected_width}x{expected_height}"
    )]
    SizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("byte buffer holds {actual} bytes, expected {expected}")]
    ByteLengthMismatch { expected: usize, actual: usize },
}

/// Normalized RGBA pixels stored as a flat `f64` array.
///
/// Row 0 is the bottom row, matching world space. Channel values are expected in `[0, 1]`
/// but may exceed 1 after additive light merges; clamping happens at byte conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<f64>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Result<Self, GeometryError> {
        Self::filled(width, height, [0.0; CHANNELS])
    }

    pub fn filled(width: u32, height: u32, rgba: [f64; CHANNELS]) -> Result<Self, GeometryError> {
        if width == 0 || height == 0 {
            return Err(GeometryError::Degenerate {
                what: "pixel buffer",
                width: width as i64,
                height: height as i64,
            });
        }
        let pixel_count = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixel_count * CHANNELS);
        for _ in 0..pixel_count {
            data.extend_from_slice(&rgba);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Builds a buffer from 8-bit RGBA rows ordered top to bottom, flipping into world orientation.
    pub fn from_rgba8_top_down(
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<Self, PixelBufferLoadError> {
        let mut buffer = Self::new(width, height)?;
        let expected = width as usize * height as usize * CHANNELS;
        if rgba.len() != expected {
            return Err(PixelBufferError::ByteLengthMismatch {
                expected,
                actual: rgba.len(),
            }
            .into());
        }
        for (row_index, row) in rgba.chunks_exact(width as usize * CHANNELS).enumerate() {
            let y = height - 1 - row_index as u32;
            for (x, px) in row.chunks_exact(CHANNELS).enumerate() {
                buffer.set_pixel(
                    x as u32,
                    y,
                    [
                        px[0] as f64 / 255.0,
                        px[1] as f64 / 255.0,
                        px[2] as f64 / 255.0,
                        px[3] as f64 / 255.0,
                    ],
                );
            }
        }
        Ok(buffer)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    fn offset_of(&self, x: u32, y: u32) -> usize {
        debug_assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{}",
            self.width,
            self.height
        );
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    pub fn get(&self, x: u32, y: u32, channel: usize) -> f64 {
        debug_assert!(channel < CHANNELS);
        self.data[self.offset_of(x, y) + channel]
    }

    pub fn set(&mut self, x: u32, y: u32, channel: usize, value: f64) {
        debug_assert!(channel < CHANNELS);
        let offset = self.offset_of(x, y);
        self.data[offset + channel] = value;
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f64; CHANNELS] {
        let offset = self.offset_of(x, y);
        let mut out = [0.0; CHANNELS];
        out.copy_from_slice(&self.data[offset..offset + CHANNELS]);
        out
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [f64; CHANNELS]) {
        let offset = self.offset_of(x, y);
        self.data[offset..offset + CHANNELS].copy_from_slice(&rgba);
    }

    /// Copies all of `src` so its origin lands at `dst`. Parts falling outside are dropped.
    pub fn blit(&mut self, src: &PixelBuffer, dst: PointPx) {
        let target = Rect::new(dst.x, dst.y, src.width as i32, src.height as i32);
        let Some(clip) = target.intersection(&self.bounds()) else {
            return;
        };
        let row_len = clip.width as usize * CHANNELS;
        for y in clip.y..clip.top() {
            let src_start = src.offset_of((clip.x - dst.x) as u32, (y - dst.y) as u32);
            let dst_start = self.offset_of(clip.x as u32, y as u32);
            self.data[dst_start..dst_start + row_len]
                .copy_from_slice(&src.data[src_start..src_start + row_len]);
        }
    }

    /// Copies `region` from a buffer with identical dimensions, coordinates unchanged.
    pub fn copy_region_from(
        &mut self,
        src: &PixelBuffer,
        region: Rect,
    ) -> Result<(), PixelBufferError> {
        self.ensure_same_size(src.width, src.height)?;
        let Some(clip) = region.intersection(&self.bounds()) else {
            return Ok(());
        };
        let row_len = clip.width as usize * CHANNELS;
        for y in clip.y..clip.top() {
            let start = self.offset_of(clip.x as u32, y as u32);
            self.data[start..start + row_len].copy_from_slice(&src.data[start..start + row_len]);
        }
        Ok(())
    }

    /// Adds the RGB channels of `patch` (placed at `patch_origin`) inside `clip`. Alpha is untouched.
    pub fn add_rgb(&mut self, patch: &PixelBuffer, patch_origin: PointPx, clip: Rect) {
        let placed = Rect::new(
            patch_origin.x,
            patch_origin.y,
            patch.width as i32,
            patch.height as i32,
        );
        let Some(area) = placed
            .intersection(&self.bounds())
            .and_then(|area| area.intersection(&clip))
        else {
            return;
        };
        for y in area.y..area.top() {
            for x in area.x..area.right() {
                let src = patch.offset_of((x - patch_origin.x) as u32, (y - patch_origin.y) as u32);
                let dst = self.offset_of(x as u32, y as u32);
                self.data[dst + R] += patch.data[src + R];
                self.data[dst + G] += patch.data[src + G];
                self.data[dst + B] += patch.data[src + B];
            }
        }
    }

    /// Writes `region` into a top-left-origin RGBA8 image of the same dimensions.
    ///
    /// This is the single place where world space turns into device space.
    pub fn write_device_rgba8(&self, out: &mut [u8], region: Rect) -> Result<(), PixelBufferError> {
        let expected = self.width as usize * self.height as usize * CHANNELS;
        if out.len() != expected {
            return Err(PixelBufferError::ByteLengthMismatch {
                expected,
                actual: out.len(),
            });
        }
        let Some(clip) = region.intersection(&self.bounds()) else {
            return Ok(());
        };
        let stride = self.width as usize * CHANNELS;
        for y in clip.y..clip.top() {
            let device_row = (self.height as i32 - 1 - y) as usize;
            for x in clip.x..clip.right() {
                let src = self.offset_of(x as u32, y as u32);
                let dst = device_row * stride + x as usize * CHANNELS;
                for channel in 0..CHANNELS {
                    out[dst + channel] = channel_to_u8(self.data[src + channel]);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn ensure_same_size(&self, width: u32, height: u32) -> Result<(), PixelBufferError> {
        if self.width != width || self.height != height {
            return Err(PixelBufferError::SizeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                actual_width: width,
                actual_height: height,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PixelBufferLoadError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Pixels(#[from] PixelBufferError),
}

/// `floor(value * 255)` clamped to the byte range. NaN maps to 0.
pub fn channel_to_u8(value: f64) -> u8 {
    let scaled = (value * 255.0).floor();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, 255.0) as u8
}
