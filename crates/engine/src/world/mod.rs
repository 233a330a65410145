mod grid;
mod level;
mod tile;

pub use grid::{escape_x, escape_y, CellCoord, TileGrid, TileGridError, CELL_SIZE};
pub use level::{load_level, LevelData, LevelError};
pub use tile::{TextureId, Tile};
