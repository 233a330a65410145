use std::sync::Arc;

use thiserror::Error;

use crate::geometry::{GeometryError, PointPx, Rect};
use crate::render::{PixelBuffer, TexturePack};

use super::Tile;

/// Edge length of one tile in world pixels.
pub const CELL_SIZE: i32 = 30;

/// Largest world, in pixels, a grid may cover. The static layer and the compositor cache each
/// hold four `f64` channels per world pixel.
pub const MAX_WORLD_PIXELS: u64 = 1 << 24;

/// World size in pixels for a `cols x rows` grid, or `None` when it does not fit `i32`
/// coordinates or exceeds [`MAX_WORLD_PIXELS`].
pub fn world_size_px(cols: u32, rows: u32) -> Option<(u32, u32)> {
    let width = i32::try_from(cols).ok()?.checked_mul(CELL_SIZE)?;
    let height = i32::try_from(rows).ok()?.checked_mul(CELL_SIZE)?;
    if width as u64 * height as u64 > MAX_WORLD_PIXELS {
        return None;
    }
    Some((width as u32, height as u32))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub col: i32,
    pub row: i32,
}

impl CellCoord {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Cell containing a world-pixel position. Negative pixels floor toward the next lower cell.
    pub fn containing(point: PointPx) -> Self {
        Self {
            col: pixel_to_cell(point.x),
            row: pixel_to_cell(point.y),
        }
    }

    pub fn origin_px(&self) -> PointPx {
        PointPx::new(self.col * CELL_SIZE, self.row * CELL_SIZE)
    }

    pub fn rect(&self) -> Rect {
        let origin = self.origin_px();
        Rect::new(origin.x, origin.y, CELL_SIZE, CELL_SIZE)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TileGridError {
    #[error("cell ({col}, {row}) is outside the {cols}x{rows} grid")]
    OutOfBounds {
        col: i32,
        row: i32,
        cols: u32,
        rows: u32,
    },
    #[error("grid needs at least one column and one row, got {cols}x{rows}")]
    EmptyGrid { cols: u32, rows: u32 },
    #[error("a {cols}x{rows} grid exceeds the world size limit of {max} pixels", max = MAX_WORLD_PIXELS)]
    TooLarge { cols: u32, rows: u32 },
    #[error("tile data has {actual} cells, expected {expected}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Tile-grid origin convention:
/// - cell `(0, 0)` is the bottom-left cell and covers world pixels `[0, 30) x [0, 30)`
/// - the static pixel buffer shares that bottom-left origin
///
/// Every mutation repaints the cell's pixels before returning, so tiles and pixels never
/// disagree from a caller's point of view.
#[derive(Debug, Clone)]
pub struct TileGrid {
    cols: u32,
    rows: u32,
    tiles: Vec<Tile>,
    pixels: PixelBuffer,
    textures: Arc<TexturePack>,
}

impl TileGrid {
    pub fn new(cols: u32, rows: u32, textures: Arc<TexturePack>) -> Result<Self, TileGridError> {
        if world_size_px(cols, rows).is_none() {
            return Err(TileGridError::TooLarge { cols, rows });
        }
        let count = cols as usize * rows as usize;
        Self::from_tiles(cols, rows, vec![Tile::Background; count], textures)
    }

    pub fn from_tiles(
        cols: u32,
        rows: u32,
        tiles: Vec<Tile>,
        textures: Arc<TexturePack>,
    ) -> Result<Self, TileGridError> {
        if cols == 0 || rows == 0 {
            return Err(TileGridError::EmptyGrid { cols, rows });
        }
        let (width, height) =
            world_size_px(cols, rows).ok_or(TileGridError::TooLarge { cols, rows })?;
        let expected = cols as usize * rows as usize;
        if tiles.len() != expected {
            return Err(TileGridError::TileCountMismatch {
                expected,
                actual: tiles.len(),
            });
        }
        let pixels = PixelBuffer::new(width, height)?;
        let mut grid = Self {
            cols,
            rows,
            tiles,
            pixels,
            textures,
        };
        grid.repaint_all();
        Ok(grid)
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn textures(&self) -> &Arc<TexturePack> {
        &self.textures
    }

    fn index_of(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 || col >= self.cols as i32 || row >= self.rows as i32 {
            return None;
        }
        Some(row as usize * self.cols as usize + col as usize)
    }

    /// Out-of-bounds reads see plain background rather than failing.
    pub fn get(&self, col: i32, row: i32) -> Tile {
        self.index_of(col, row)
            .map(|index| self.tiles[index])
            .unwrap_or_default()
    }

    pub fn set(&mut self, col: i32, row: i32, tile: Tile) -> Result<(), TileGridError> {
        let Some(index) = self.index_of(col, row) else {
            return Err(TileGridError::OutOfBounds {
                col,
                row,
                cols: self.cols,
                rows: self.rows,
            });
        };
        self.tiles[index] = tile;
        self.repaint_cell(col, row);
        Ok(())
    }

    /// Static pixels for the whole grid, bottom-left origin.
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            0,
            0,
            self.cols as i32 * CELL_SIZE,
            self.rows as i32 * CELL_SIZE,
        )
    }

    /// World-pixel corner of every cell holding `tile`, scanning column by column.
    pub fn find_all(&self, tile: Tile) -> Vec<PointPx> {
        let mut found = Vec::new();
        for col in 0..self.cols as i32 {
            for row in 0..self.rows as i32 {
                if self.get(col, row) == tile {
                    found.push(CellCoord::new(col, row).origin_px());
                }
            }
        }
        found
    }

    /// First cell under `bbox` holding `target`, scanning columns outermost.
    ///
    /// The first match wins even when another matching cell lies closer to the direction of
    /// travel; fast bodies can therefore snap against the wrong cell.
    pub fn probe(&self, bbox: Rect, target: Tile) -> Option<CellCoord> {
        self.probe_where(bbox, |tile| tile == target)
    }

    /// [`TileGrid::probe`] with a predicate, e.g. `Tile::is_solid`.
    pub fn probe_where(&self, bbox: Rect, matches: impl Fn(Tile) -> bool) -> Option<CellCoord> {
        if bbox.is_empty() {
            return None;
        }
        let low = CellCoord::containing(PointPx::new(bbox.x, bbox.y));
        let high = CellCoord::containing(PointPx::new(bbox.right() - 1, bbox.top() - 1));
        for col in low.col..=high.col {
            for row in low.row..=high.row {
                if matches(self.get(col, row)) {
                    return Some(CellCoord::new(col, row));
                }
            }
        }
        None
    }

    fn repaint_cell(&mut self, col: i32, row: i32) {
        let tile = self.get(col, row);
        let texture = self.textures.get(tile.texture());
        self.pixels
            .blit(texture, CellCoord::new(col, row).origin_px());
    }

    fn repaint_all(&mut self) {
        for row in 0..self.rows as i32 {
            for col in 0..self.cols as i32 {
                self.repaint_cell(col, row);
            }
        }
    }
}

fn pixel_to_cell(px: i32) -> i32 {
    px.div_euclid(CELL_SIZE)
}

/// X displacement that moves `bbox` out of `hit`, or 0 when the snap would exceed this step's
/// own displacement (a body resting against a wall must not be teleported).
pub fn escape_x(bbox: Rect, displacement: f64, hit: CellCoord) -> i32 {
    let escape = if displacement > 0.0 {
        hit.col * CELL_SIZE - bbox.width - bbox.x
    } else if displacement < 0.0 {
        CELL_SIZE - bbox.x.rem_euclid(CELL_SIZE)
    } else {
        0
    };
    clamp_escape(escape, displacement)
}

/// Y counterpart of [`escape_x`]; a downward hit lands the body on top of the cell.
pub fn escape_y(bbox: Rect, displacement: f64, hit: CellCoord) -> i32 {
    let escape = if displacement > 0.0 {
        hit.row * CELL_SIZE - bbox.height - bbox.y
    } else if displacement < 0.0 {
        CELL_SIZE - bbox.y.rem_euclid(CELL_SIZE)
    } else {
        0
    };
    clamp_escape(escape, displacement)
}

fn clamp_escape(escape: i32, displacement: f64) -> i32 {
    if f64::from(escape.abs()) > displacement.abs() {
        0
    } else {
        escape
    }
}
