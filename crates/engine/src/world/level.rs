use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::geometry::PointPx;
use crate::render::TexturePack;

use super::grid::{world_size_px, CellCoord, TileGrid, TileGridError, CELL_SIZE};
use super::Tile;

const START_MARKER: char = 'I';
const EXIT_MARKER: char = 'O';

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("failed to read level file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("level text is empty; expected a `cols rows` header line")]
    MissingHeader,
    #[error(
        "invalid level header {line:?}; expected `cols rows`, both positive and within the world size limit"
    )]
    InvalidHeader { line: String },
    #[error("level declares {expected} rows but only {found} were present")]
    MissingRow { expected: u32, found: u32 },
    #[error("level text line {line} has {found} cells, expected {expected}")]
    ShortRow {
        line: usize,
        expected: u32,
        found: usize,
    },
}

/// Parsed text level. `tiles` is indexed `row * cols + col` with row 0 at the bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelData {
    pub cols: u32,
    pub rows: u32,
    pub tiles: Vec<Tile>,
    pub start: Option<PointPx>,
    pub exit: Option<CellCoord>,
}

impl LevelData {
    /// Parses the text format: a `cols rows` header, then `rows` lines listed top row first.
    ///
    /// `#` brick, `-` background, `i` unlit light, `I` start, `O` exit. Any other character is
    /// background; characters past `cols` are ignored.
    pub fn parse(text: &str) -> Result<Self, LevelError> {
        let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));
        let header = lines.next().ok_or(LevelError::MissingHeader)?;
        let (cols, rows) = parse_header(header)?;

        let mut tiles = vec![Tile::Background; cols as usize * rows as usize];
        let mut start = None;
        let mut exit = None;
        for text_row in 0..rows {
            let line = lines.next().ok_or(LevelError::MissingRow {
                expected: rows,
                found: text_row,
            })?;
            let found = line.chars().count();
            if found < cols as usize {
                return Err(LevelError::ShortRow {
                    line: text_row as usize + 2,
                    expected: cols,
                    found,
                });
            }
            let row = rows - 1 - text_row;
            for (col, symbol) in line.chars().take(cols as usize).enumerate() {
                let cell = CellCoord::new(col as i32, row as i32);
                let tile = match symbol {
                    '#' => Tile::Brick,
                    'i' => Tile::LightOff,
                    START_MARKER => {
                        start = Some(cell.origin_px());
                        Tile::Background
                    }
                    EXIT_MARKER => {
                        exit = Some(cell);
                        Tile::Background
                    }
                    _ => Tile::Background,
                };
                tiles[row as usize * cols as usize + col] = tile;
            }
        }

        Ok(Self {
            cols,
            rows,
            tiles,
            start,
            exit,
        })
    }

    /// Spawn point in world pixels; top-left of the level when no start marker exists.
    pub fn start_or_default(&self) -> PointPx {
        self.start
            .unwrap_or_else(|| PointPx::new(0, self.rows as i32 * CELL_SIZE))
    }

    pub fn build_grid(&self, textures: Arc<TexturePack>) -> Result<TileGrid, TileGridError> {
        TileGrid::from_tiles(self.cols, self.rows, self.tiles.clone(), textures)
    }
}

pub fn load_level(path: &Path) -> Result<LevelData, LevelError> {
    let text = fs::read_to_string(path).map_err(|source| LevelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let level = LevelData::parse(&text)?;
    info!(
        path = %path.display(),
        cols = level.cols,
        rows = level.rows,
        has_start = level.start.is_some(),
        has_exit = level.exit.is_some(),
        "level_loaded"
    );
    Ok(level)
}

fn parse_header(line: &str) -> Result<(u32, u32), LevelError> {
    let invalid = || LevelError::InvalidHeader {
        line: line.to_string(),
    };
    let mut parts = line.split_whitespace();
    let cols = parts
        .next()
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(invalid)?;
    let rows = parts
        .next()
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(invalid)?;
    if cols == 0 || rows == 0 || parts.next().is_some() {
        return Err(invalid());
    }
    if world_size_px(cols, rows).is_none() {
        return Err(invalid());
    }
    Ok((cols, rows))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = "4 3\n#--O\ni-I-\n####\n";

    #[test]
    fn text_rows_are_flipped_into_world_rows() {
        let level = LevelData::parse(SAMPLE).expect("parse");
        assert_eq!((level.cols, level.rows), (4, 3));
        let tile = |col: usize, row: usize| level.tiles[row * 4 + col];
        for col in 0..4 {
            assert_eq!(tile(col, 0), Tile::Brick);
        }
        assert_eq!(tile(0, 1), Tile::LightOff);
        assert_eq!(tile(0, 2), Tile::Brick);
        assert_eq!(tile(3, 2), Tile::Background);
    }

    #[test]
    fn markers_record_start_and_exit() {
        let level = LevelData::parse(SAMPLE).expect("parse");
        assert_eq!(level.start, Some(PointPx::new(2 * CELL_SIZE, CELL_SIZE)));
        assert_eq!(level.exit, Some(CellCoord::new(3, 2)));
        assert_eq!(level.start_or_default(), PointPx::new(60, 30));
    }

    #[test]
    fn missing_start_defaults_to_top_left() {
        let level = LevelData::parse("2 2\n--\n##\n").expect("parse");
        assert_eq!(level.start_or_default(), PointPx::new(0, 2 * CELL_SIZE));
    }

    #[test]
    fn unknown_symbols_become_background_and_carriage_returns_are_ignored() {
        let level = LevelData::parse("3 1\r\nx#?\r\n").expect("parse");
        assert_eq!(
            level.tiles,
            vec![Tile::Background, Tile::Brick, Tile::Background]
        );
    }

    #[test]
    fn oversized_header_is_rejected() {
        let err = LevelData::parse("4000000000 4000000000\n#\n").expect_err("should fail");
        assert!(matches!(err, LevelError::InvalidHeader { .. }));

        let err = LevelData::parse("1000 1000\n").expect_err("should fail");
        assert!(matches!(err, LevelError::InvalidHeader { .. }));
    }

    #[test]
    fn malformed_text_is_rejected() {
        assert!(matches!(
            LevelData::parse(""),
            Err(LevelError::MissingHeader)
        ));
        assert!(matches!(
            LevelData::parse("3\n###\n"),
            Err(LevelError::InvalidHeader { .. })
        ));
        assert!(matches!(
            LevelData::parse("0 2\n"),
            Err(LevelError::InvalidHeader { .. })
        ));
        assert!(matches!(
            LevelData::parse("2 2\n##\n"),
            Err(LevelError::MissingRow {
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            LevelData::parse("3 1\n#\n"),
            Err(LevelError::ShortRow {
                line: 2,
                expected: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn built_grid_matches_parsed_tiles() {
        let level = LevelData::parse(SAMPLE).expect("parse");
        let grid = level
            .build_grid(Arc::new(TexturePack::procedural().expect("textures")))
            .expect("grid");
        assert_eq!(grid.get(0, 1), Tile::LightOff);
        assert_eq!(grid.get(2, 0), Tile::Brick);
        assert_eq!(grid.find_all(Tile::LightOff), vec![PointPx::new(0, 30)]);
    }

    #[test]
    fn load_level_reads_file_and_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("level.txt");
        let mut file = fs::File::create(&path).expect("create");
        file.write_all(SAMPLE.as_bytes()).expect("write");
        drop(file);

        let level = load_level(&path).expect("load");
        assert_eq!(level.rows, 3);

        let missing = load_level(&dir.path().join("missing.txt"));
        assert!(matches!(missing, Err(LevelError::Io { .. })));
    }
}
