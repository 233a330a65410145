use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::geometry::{GeometryError, PointPx, Rect};
use crate::world::TileGrid;

use super::pixel_buffer::{channel_to_u8, PixelBuffer, PixelBufferError, A, CHANNELS};
use super::{world_to_screen_px, TexturePack, Viewport};

const OUTSIDE_WORLD: [u8; 4] = [0, 0, 0, 255];

/// Something merged into the cached static layer, such as a light's glow.
pub trait StaticProp {
    /// World placement of [`StaticProp::pixels`].
    fn bounds(&self) -> Rect;
    fn pixels(&self) -> &PixelBuffer;
    fn is_drawn(&self) -> bool;
}

/// Something redrawn over the static layer every frame.
pub trait DynamicProp {
    fn push_stamps<'a>(
        &self,
        now: Duration,
        textures: &'a TexturePack,
        out: &mut Vec<SpriteStamp<'a>>,
    );
}

/// One sprite placed in world space; `origin` is the sprite's bottom-left pixel.
#[derive(Debug, Clone, Copy)]
pub struct SpriteStamp<'a> {
    pub origin: PointPx,
    pub sprite: &'a PixelBuffer,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompositorError {
    #[error("surface holds {actual} bytes, expected {expected} for a {width}x{height} viewport")]
    SizeMismatch {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },
    #[error(transparent)]
    Pixels(#[from] PixelBufferError),
}

/// Two-tier compositor.
///
/// The static tier (tiles plus drawn lights) is cached in world space and only recomputed when
/// invalidated. The dynamic tier is blended onto the output surface on every draw.
#[derive(Debug)]
pub struct Compositor {
    stale: bool,
    merged: PixelBuffer,
    device: Vec<u8>,
}

impl Compositor {
    pub fn new(world_width: u32, world_height: u32) -> Result<Self, GeometryError> {
        let merged = PixelBuffer::new(world_width, world_height)?;
        let device = vec![0; world_width as usize * world_height as usize * CHANNELS];
        Ok(Self {
            stale: true,
            merged,
            device,
        })
    }

    pub fn for_grid(grid: &TileGrid) -> Result<Self, GeometryError> {
        let pixels = grid.pixels();
        Self::new(pixels.width(), pixels.height())
    }

    /// Cached static layer in world space.
    pub fn merged(&self) -> &PixelBuffer {
        &self.merged
    }

    /// Cached static layer as a top-left-origin RGBA8 image.
    pub fn device_image(&self) -> &[u8] {
        &self.device
    }

    /// Schedules a full static recompute on the next draw.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Recomputes the static layer inside `region` right away.
    pub fn invalidate_region<P: StaticProp>(
        &mut self,
        region: Rect,
        grid: &TileGrid,
        props: &[P],
    ) -> Result<(), CompositorError> {
        if self.stale {
            // The pending full recompute covers this region too.
            return Ok(());
        }
        self.recompute(region, grid, props)
    }

    pub fn draw<P: StaticProp>(
        &mut self,
        frame: &mut [u8],
        viewport: Viewport,
        camera: PointPx,
        grid: &TileGrid,
        props: &[P],
        stamps: &[SpriteStamp<'_>],
    ) -> Result<(), CompositorError> {
        let expected = viewport.byte_len();
        if frame.len() != expected {
            return Err(CompositorError::SizeMismatch {
                expected,
                actual: frame.len(),
                width: viewport.width,
                height: viewport.height,
            });
        }
        if viewport.width == 0 || viewport.height == 0 {
            return Ok(());
        }
        if self.stale {
            let everything = self.merged.bounds();
            self.recompute(everything, grid, props)?;
            self.stale = false;
            debug!(
                width = self.merged.width(),
                height = self.merged.height(),
                "static_layer_recomputed"
            );
        }

        self.copy_visible(frame, viewport, camera);
        for stamp in stamps {
            blend_stamp(frame, viewport, camera, stamp);
        }
        Ok(())
    }

    fn recompute<P: StaticProp>(
        &mut self,
        region: Rect,
        grid: &TileGrid,
        props: &[P],
    ) -> Result<(), CompositorError> {
        let Some(clip) = region.intersection(&self.merged.bounds()) else {
            return Ok(());
        };
        self.merged.copy_region_from(grid.pixels(), clip)?;
        for prop in props.iter().filter(|prop| prop.is_drawn()) {
            let bounds = prop.bounds();
            if bounds.intersection(&clip).is_some() {
                self.merged
                    .add_rgb(prop.pixels(), PointPx::new(bounds.x, bounds.y), clip);
            }
        }
        self.merged.write_device_rgba8(&mut self.device, clip)?;
        trace!(
            x = clip.x,
            y = clip.y,
            width = clip.width,
            height = clip.height,
            "static_region_recomputed"
        );
        Ok(())
    }

    fn copy_visible(&self, frame: &mut [u8], viewport: Viewport, camera: PointPx) {
        let world_w = self.merged.width() as i64;
        let world_h = self.merged.height() as i64;
        let screen_w = viewport.width as i64;
        let stride = viewport.width as usize * CHANNELS;

        let first_visible = (-(camera.x as i64)).clamp(0, screen_w);
        let end_visible = (world_w - camera.x as i64).clamp(first_visible, screen_w);

        for (screen_y, row) in frame.chunks_exact_mut(stride).enumerate() {
            let world_y = viewport.height as i64 - 1 - screen_y as i64 + camera.y as i64;
            if world_y < 0 || world_y >= world_h || first_visible == end_visible {
                fill(row, OUTSIDE_WORLD);
                continue;
            }
            let device_row = (world_h - 1 - world_y) as usize;
            let src_x = (first_visible + camera.x as i64) as usize;
            let len = (end_visible - first_visible) as usize * CHANNELS;
            let src_start = (device_row * world_w as usize + src_x) * CHANNELS;
            let dst_start = first_visible as usize * CHANNELS;

            fill(&mut row[..dst_start], OUTSIDE_WORLD);
            row[dst_start..dst_start + len].copy_from_slice(&self.device[src_start..src_start + len]);
            fill(&mut row[dst_start + len..], OUTSIDE_WORLD);
        }
    }
}

fn fill(bytes: &mut [u8], color: [u8; 4]) {
    for chunk in bytes.chunks_exact_mut(CHANNELS) {
        chunk.copy_from_slice(&color);
    }
}

fn blend_stamp(frame: &mut [u8], viewport: Viewport, camera: PointPx, stamp: &SpriteStamp<'_>) {
    let sprite = stamp.sprite;
    let screen_w = viewport.width as i32;
    let screen_h = viewport.height as i32;
    for y in 0..sprite.height() {
        for x in 0..sprite.width() {
            let world = stamp.origin.offset(x as i32, y as i32);
            let (screen_x, screen_y) = world_to_screen_px(world, camera, viewport);
            if screen_x < 0 || screen_x >= screen_w || screen_y < 0 || screen_y >= screen_h {
                continue;
            }
            let offset = (screen_y as usize * viewport.width as usize + screen_x as usize) * CHANNELS;
            let Some(dst) = frame.get_mut(offset..offset + CHANNELS) else {
                continue;
            };
            blend_pixel(dst, sprite.pixel(x, y));
        }
    }
}

/// Blends one normalized RGBA pixel onto an RGBA8 destination.
///
/// Alpha 1 replaces, alpha 0 leaves `dst` untouched, anything between mixes
/// `src * a + dst * (1 - a)` per channel.
pub fn blend_pixel(dst: &mut [u8], src: [f64; CHANNELS]) {
    let alpha = src[A];
    if alpha >= 1.0 {
        for channel in 0..A {
            dst[channel] = channel_to_u8(src[channel]);
        }
        dst[A] = u8::MAX;
        return;
    }
    if alpha <= 0.0 || alpha.is_nan() {
        return;
    }
    for channel in 0..A {
        let under = f64::from(dst[channel]) / 255.0;
        dst[channel] = channel_to_u8(src[channel] * alpha + under * (1.0 - alpha));
    }
}
