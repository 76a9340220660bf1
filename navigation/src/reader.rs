//! Sources of raw walkability consumed while building a grid.

use gridwalk_core::CellCoord;

use crate::GridError;

/// Read-only view of map walkability.
///
/// Coordinates outside `width` x `height` are treated as non-walkable by the
/// grid; readers are only queried inside their reported bounds.
pub trait WalkabilityReader {
    /// Number of columns.
    fn width(&self) -> u32;

    /// Number of rows.
    fn height(&self) -> u32;

    /// Reports whether the cell at `column`, `row` can be walked on.
    fn is_walkable(&self, column: u32, row: u32) -> bool;
}

/// Walkability parsed from rows of text, `.` for open ground and `#` for walls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsciiMap {
    width: u32,
    height: u32,
    walkable: Vec<bool>,
}

impl AsciiMap {
    /// Parses a map, ignoring blank lines and surrounding whitespace.
    pub fn parse(text: &str) -> Result<Self, GridError> {
        let mut width = None;
        let mut walkable = Vec::new();
        let mut height = 0_u32;

        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let mut row_width = 0_u32;
            for (column, tile) in line.chars().enumerate() {
                let open = match tile {
                    '.' => true,
                    '#' => false,
                    other => {
                        return Err(GridError::InvalidTile {
                            tile: other,
                            cell: CellCoord::new(column as u32, height),
                        })
                    }
                };
                walkable.push(open);
                row_width += 1;
            }

            match width {
                None => width = Some(row_width),
                Some(expected) if expected != row_width => {
                    return Err(GridError::InconsistentDimensions {
                        expected: (expected, height),
                        found: (row_width, height + 1),
                    });
                }
                Some(_) => {}
            }
            height += 1;
        }

        let width = width.unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(GridError::EmptyDimensions { width, height });
        }

        Ok(Self {
            width,
            height,
            walkable,
        })
    }

    /// Creates a fully walkable map.
    pub fn open(width: u32, height: u32) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyDimensions { width, height });
        }
        let cells = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            walkable: vec![true; cells],
        })
    }

    /// Marks the provided cells as blocked, ignoring cells outside the map.
    #[must_use]
    pub fn with_blocked(mut self, cells: impl IntoIterator<Item = CellCoord>) -> Self {
        for cell in cells {
            if cell.column() < self.width && cell.row() < self.height {
                let index = cell.row() as usize * self.width as usize + cell.column() as usize;
                self.walkable[index] = false;
            }
        }
        self
    }
}

impl WalkabilityReader for AsciiMap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn is_walkable(&self, column: u32, row: u32) -> bool {
        if column >= self.width || row >= self.height {
            return false;
        }
        self.walkable[row as usize * self.width as usize + column as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_walls_and_floor() {
        let map = AsciiMap::parse(
            "
            ..#
            #..
            ",
        )
        .expect("valid map");
        assert_eq!((map.width(), map.height()), (3, 2));
        assert!(map.is_walkable(0, 0));
        assert!(!map.is_walkable(2, 0));
        assert!(!map.is_walkable(0, 1));
        assert!(!map.is_walkable(3, 0), "outside the map is blocked");
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let error = AsciiMap::parse("...\n..\n").expect_err("ragged");
        assert!(matches!(error, GridError::InconsistentDimensions { .. }));
    }

    #[test]
    fn unknown_tiles_are_rejected() {
        let error = AsciiMap::parse(".x.\n").expect_err("invalid tile");
        assert!(matches!(error, GridError::InvalidTile { tile: 'x', .. }));
    }

    #[test]
    fn empty_maps_are_rejected() {
        assert!(matches!(
            AsciiMap::parse("\n\n"),
            Err(GridError::EmptyDimensions { .. })
        ));
        assert!(AsciiMap::open(0, 4).is_err());
    }
}
