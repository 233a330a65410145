use std::path::Path;

use image::ImageReader;
use tracing::{info, warn};

use crate::geometry::GeometryError;
use crate::world::{TextureId, CELL_SIZE};

use super::pixel_buffer::{PixelBuffer, A};

const FALLBACK_BACKGROUND: [f64; 4] = [0.13, 0.14, 0.18, 1.0];
const FALLBACK_BACKGROUND_SEAM: [f64; 4] = [0.10, 0.11, 0.14, 1.0];
const FALLBACK_LAMP_ON: [f64; 4] = [1.0, 0.92, 0.65, 1.0];
const FALLBACK_LAMP_OFF: [f64; 4] = [0.32, 0.30, 0.28, 1.0];
const FALLBACK_BRICK: [f64; 4] = [0.55, 0.33, 0.22, 1.0];
const FALLBACK_MORTAR: [f64; 4] = [0.35, 0.30, 0.27, 1.0];
const FALLBACK_HERO: [f64; 4] = [0.30, 0.78, 0.32, 1.0];
const FALLBACK_SPARK: [f64; 4] = [1.0, 0.95, 0.55, 1.0];
const HERO_SPRITE_PX: u32 = 30;
const HERO_FLAT_ROWS: u32 = 22;
const SPARK_SPRITE_PX: u32 = 6;
const LAMP_HALF_SIZE_PX: u32 = 5;
const BRICK_COURSE_PX: u32 = 10;

/// Owns one decoded pixel buffer per [`TextureId`].
///
/// Tile textures are always `CELL_SIZE` square; a file with other dimensions is replaced by the
/// procedural fallback so the tile grid can copy cells without bounds checks.
#[derive(Debug, Clone)]
pub struct TexturePack {
    textures: Vec<PixelBuffer>,
}

impl TexturePack {
    pub fn procedural() -> Result<Self, GeometryError> {
        let mut textures = Vec::with_capacity(TextureId::ALL.len());
        for id in TextureId::ALL {
            textures.push(procedural_texture(id)?);
        }
        Ok(Self { textures })
    }

    /// Loads `<dir>/<file_name>` for every texture, falling back per texture when a file is
    /// missing, undecodable, or the wrong size for a tile.
    pub fn load(dir: &Path) -> Result<Self, GeometryError> {
        let mut pack = Self::procedural()?;
        let mut loaded = 0usize;
        for id in TextureId::ALL {
            let path = dir.join(id.file_name());
            match load_texture(&path) {
                Ok(buffer) if id.is_tile() && !is_cell_sized(&buffer) => {
                    warn!(
                        texture = ?id,
                        path = %path.display(),
                        width = buffer.width(),
                        height = buffer.height(),
                        cell_size = CELL_SIZE,
                        "tile_texture_wrong_size_using_fallback"
                    );
                }
                Ok(buffer) => {
                    pack.textures[id.index()] = buffer;
                    loaded += 1;
                }
                Err(reason) => {
                    warn!(
                        texture = ?id,
                        path = %path.display(),
                        reason = reason.as_str(),
                        "texture_load_failed_using_fallback"
                    );
                }
            }
        }
        info!(
            dir = %dir.display(),
            loaded,
            fallback = TextureId::ALL.len() - loaded,
            "textures_loaded"
        );
        Ok(pack)
    }

    pub fn get(&self, id: TextureId) -> &PixelBuffer {
        &self.textures[id.index()]
    }

    /// Replaces one texture. Tile textures must be `CELL_SIZE` square.
    pub fn replace(&mut self, id: TextureId, buffer: PixelBuffer) -> Result<(), TextureSizeError> {
        if id.is_tile() && !is_cell_sized(&buffer) {
            return Err(TextureSizeError {
                texture: id,
                width: buffer.width(),
                height: buffer.height(),
            });
        }
        self.textures[id.index()] = buffer;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "tile texture {texture:?} is {width}x{height}, expected {cell}x{cell}",
    cell = CELL_SIZE
)]
pub struct TextureSizeError {
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
}

fn is_cell_sized(buffer: &PixelBuffer) -> bool {
    buffer.width() == CELL_SIZE as u32 && buffer.height() == CELL_SIZE as u32
}

fn load_texture(path: &Path) -> Result<PixelBuffer, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    PixelBuffer::from_rgba8_top_down(image.width(), image.height(), image.as_raw())
        .map_err(|error| format!("convert_failed:{error}"))
}

fn procedural_texture(id: TextureId) -> Result<PixelBuffer, GeometryError> {
    let cell = CELL_SIZE as u32;
    match id {
        TextureId::Background => background_tile(),
        TextureId::BackgroundLight => lamp_tile(FALLBACK_LAMP_ON),
        TextureId::BackgroundLightDead => lamp_tile(FALLBACK_LAMP_OFF),
        TextureId::Brick => {
            let mut tile = PixelBuffer::filled(cell, cell, FALLBACK_BRICK)?;
            for y in 0..cell {
                for x in 0..cell {
                    let course = y / BRICK_COURSE_PX;
                    let joint_x = if course % 2 == 0 { 0 } else { cell / 2 };
                    if y % BRICK_COURSE_PX == 0 || x == joint_x {
                        tile.set_pixel(x, y, FALLBACK_MORTAR);
                    }
                }
            }
            Ok(tile)
        }
        TextureId::Hero => PixelBuffer::filled(HERO_SPRITE_PX, HERO_SPRITE_PX, FALLBACK_HERO),
        TextureId::HeroGround => {
            let mut sprite = PixelBuffer::filled(HERO_SPRITE_PX, HERO_SPRITE_PX, FALLBACK_HERO)?;
            for y in HERO_FLAT_ROWS..HERO_SPRITE_PX {
                for x in 0..HERO_SPRITE_PX {
                    sprite.set(x, y, A, 0.0);
                }
            }
            Ok(sprite)
        }
        TextureId::Spark => {
            let mut spark = PixelBuffer::filled(SPARK_SPRITE_PX, SPARK_SPRITE_PX, FALLBACK_SPARK)?;
            let last = SPARK_SPRITE_PX - 1;
            for y in 0..SPARK_SPRITE_PX {
                for x in 0..SPARK_SPRITE_PX {
                    let on_x_edge = x == 0 || x == last;
                    let on_y_edge = y == 0 || y == last;
                    if on_x_edge && on_y_edge {
                        spark.set(x, y, A, 0.0);
                    } else if on_x_edge || on_y_edge {
                        spark.set(x, y, A, 0.5);
                    }
                }
            }
            Ok(spark)
        }
    }
}

fn background_tile() -> Result<PixelBuffer, GeometryError> {
    let cell = CELL_SIZE as u32;
    let mut tile = PixelBuffer::filled(cell, cell, FALLBACK_BACKGROUND)?;
    for i in 0..cell {
        tile.set_pixel(i, 0, FALLBACK_BACKGROUND_SEAM);
        tile.set_pixel(0, i, FALLBACK_BACKGROUND_SEAM);
    }
    Ok(tile)
}

fn lamp_tile(lamp: [f64; 4]) -> Result<PixelBuffer, GeometryError> {
    let mut tile = background_tile()?;
    let center = CELL_SIZE as u32 / 2;
    for y in (center - LAMP_HALF_SIZE_PX)..(center + LAMP_HALF_SIZE_PX) {
        for x in (center - LAMP_HALF_SIZE_PX)..(center + LAMP_HALF_SIZE_PX) {
            tile.set_pixel(x, y, lamp);
        }
    }
    Ok(tile)
}
