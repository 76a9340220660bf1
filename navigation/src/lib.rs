#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Walkability model consumed by path searches.
//!
//! A [`WalkabilityGrid`] is derived from a [`WalkabilityReader`] once at map
//! load and only changes through explicit terrain edits. Alongside raw
//! walkability it keeps the Chebyshev distance from every cell to the nearest
//! blocked cell or grid edge, which decides whether a footprint of a given
//! size fits, and a fixed tiling of the grid into sectors used for coarse
//! searches.

mod field;
mod node;
mod reader;
mod sectors;

use std::{
    thread::{self, JoinHandle},
    time::Instant,
};

use gridwalk_core::{CellCoord, CellRect, Direction};
use tracing::debug;

use crate::field::WallDistanceField;

pub use node::GridNode;
pub use reader::{AsciiMap, WalkabilityReader};
pub use sectors::{Corridor, Sector, SectorId, SectorNode};

/// Reasons a grid cannot be built or edited.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The map has no cells.
    #[error("grid dimensions must be positive, got {width}x{height}")]
    EmptyDimensions {
        /// Reported number of columns.
        width: u32,
        /// Reported number of rows.
        height: u32,
    },
    /// The reader changed its reported dimensions while being sampled.
    #[error("reader reported {found:?} after reporting {expected:?}")]
    InconsistentDimensions {
        /// Dimensions reported first.
        expected: (u32, u32),
        /// Dimensions reported later.
        found: (u32, u32),
    },
    /// A text map contained an unknown tile.
    #[error("unknown tile {tile:?} at {cell:?}")]
    InvalidTile {
        /// Offending character.
        tile: char,
        /// Position of the character.
        cell: CellCoord,
    },
    /// Sectors must be at least one cell wide.
    #[error("sector size must be positive")]
    InvalidSectorSize,
    /// An edit addressed cells outside the grid.
    #[error("region {0:?} extends beyond the grid")]
    RegionOutOfBounds(CellRect),
    /// The background build thread could not be started.
    #[error("failed to spawn grid builder thread")]
    Spawn(#[from] std::io::Error),
    /// The background build thread panicked.
    #[error("grid builder thread panicked")]
    BuilderPanicked,
}

/// Wall-cell distance a footprint of `size` needs, `ceil(size / 2)`.
///
/// An odd footprint is centred on its anchor, which needs this clearance.
/// An even footprint reaches one cell further toward `+x/+y`; it is covered
/// exactly by the clearance squares of the anchor and its three neighbours
/// toward `+x/+y`, each of which needs this clearance.
#[must_use]
pub const fn required_clearance(size: u32) -> u32 {
    size / 2 + size % 2
}

/// Walkability, wall distances and sector layout of a rectangular map.
#[derive(Clone, Debug)]
pub struct WalkabilityGrid {
    width: u32,
    height: u32,
    sector_size: u32,
    sector_columns: u32,
    walkable: Vec<bool>,
    field: WallDistanceField,
    sectors: Vec<Sector>,
}

impl WalkabilityGrid {
    /// Samples the reader and builds the grid.
    ///
    /// This is the long-running step of map loading; see [`spawn_build`] for
    /// running it away from the simulation thread.
    pub fn build<R>(reader: &R, sector_size: u32) -> Result<Self, GridError>
    where
        R: WalkabilityReader + ?Sized,
    {
        let started = Instant::now();
        let width = reader.width();
        let height = reader.height();
        if width == 0 || height == 0 {
            return Err(GridError::EmptyDimensions { width, height });
        }
        if sector_size == 0 {
            return Err(GridError::InvalidSectorSize);
        }

        let mut walkable = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height {
            ensure_dimensions(reader, (width, height))?;
            walkable.extend((0..width).map(|column| reader.is_walkable(column, row)));
        }
        ensure_dimensions(reader, (width, height))?;

        let (sectors, sector_columns) = sectors::tile(width, height, sector_size);
        let mut grid = Self {
            width,
            height,
            sector_size,
            sector_columns,
            walkable,
            field: WallDistanceField::default(),
            sectors,
        };
        grid.rebuild_field();

        debug!(
            width,
            height,
            sectors = grid.sectors.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "walkability grid built"
        );
        Ok(grid)
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Side length of the square sectors tiling the grid.
    #[must_use]
    pub const fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Reports whether the cell lies inside the grid.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.width && cell.row() < self.height
    }

    /// Reports whether the rectangle lies entirely inside the grid.
    #[must_use]
    pub fn contains_rect(&self, rect: CellRect) -> bool {
        let origin = rect.origin();
        let size = rect.size();
        u64::from(origin.column()) + u64::from(size.width()) <= u64::from(self.width)
            && u64::from(origin.row()) + u64::from(size.height()) <= u64::from(self.height)
    }

    /// Reports whether the cell can be walked on; cells outside the grid cannot.
    #[must_use]
    pub fn is_walkable(&self, cell: CellCoord) -> bool {
        self.index(cell)
            .and_then(|index| self.walkable.get(index).copied())
            .unwrap_or(false)
    }

    /// Chebyshev distance from the cell to the nearest blocked cell or edge.
    #[must_use]
    pub fn wall_cell_distance(&self, cell: CellCoord) -> u16 {
        self.field.distance(cell)
    }

    /// Wall-cell distances of every cell in row-major order.
    #[must_use]
    pub fn wall_cell_distances(&self) -> &[u16] {
        self.field.cells()
    }

    /// Reports whether a footprint of `size` anchored at `cell` touches only open cells.
    #[must_use]
    pub fn fits(&self, cell: CellCoord, size: u32) -> bool {
        let size = size.max(1);
        let clearance = required_clearance(size);
        let clear = |cell: CellCoord| u32::from(self.wall_cell_distance(cell)) >= clearance;
        if size % 2 == 1 {
            return clear(cell);
        }
        let (Some(right), Some(below)) = (
            cell.column().checked_add(1),
            cell.row().checked_add(1),
        ) else {
            return false;
        };
        clear(cell)
            && clear(CellCoord::new(right, cell.row()))
            && clear(CellCoord::new(cell.column(), below))
            && clear(CellCoord::new(right, below))
    }

    /// Reports whether an object of `size` may step from `from` in `direction`.
    ///
    /// The destination must fit the footprint. Diagonal steps additionally
    /// require both orthogonal neighbours to fit so corners are never cut.
    #[must_use]
    pub fn can_step(&self, from: CellCoord, direction: Direction, size: u32) -> bool {
        let Some(next) = from.step(direction) else {
            return false;
        };
        if !self.contains(next) || !self.fits(next, size) {
            return false;
        }
        if !direction.is_diagonal() {
            return true;
        }

        let (dx, dy) = direction.offset();
        let horizontal = Direction::from_offset(dx, 0).and_then(|side| from.step(side));
        let vertical = Direction::from_offset(0, dy).and_then(|side| from.step(side));
        matches!(
            (horizontal, vertical),
            (Some(horizontal), Some(vertical))
                if self.fits(horizontal, size) && self.fits(vertical, size)
        )
    }

    /// Reports whether every cell of the rectangle is inside the grid and walkable.
    #[must_use]
    pub fn area_walkable(&self, rect: CellRect) -> bool {
        self.contains_rect(rect) && rect.cells().all(|cell| self.is_walkable(cell))
    }

    /// Sector containing the cell.
    #[must_use]
    pub fn sector_of(&self, cell: CellCoord) -> Option<SectorId> {
        if !self.contains(cell) {
            return None;
        }
        let sector_column = cell.column() / self.sector_size;
        let sector_row = cell.row() / self.sector_size;
        Some(SectorId::new(sector_row * self.sector_columns + sector_column))
    }

    /// Sector with the provided identifier.
    #[must_use]
    pub fn sector(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.get(id.get() as usize)
    }

    /// All sectors in identifier order.
    #[must_use]
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    /// Fine search node anchored on the cell.
    #[must_use]
    pub fn node(&self, cell: CellCoord) -> GridNode<'_> {
        GridNode::new(self, cell, None)
    }

    /// Fine search node whose successors stay inside the corridor.
    #[must_use]
    pub fn corridor_node<'a>(&'a self, cell: CellCoord, corridor: &'a Corridor) -> GridNode<'a> {
        GridNode::new(self, cell, Some(corridor))
    }

    /// Coarse search node for the sector.
    #[must_use]
    pub fn sector_node(&self, id: SectorId) -> SectorNode<'_> {
        SectorNode::new(self, id)
    }

    /// Rewrites the walkability of a region and rebuilds the distance field.
    pub fn set_walkable(&mut self, region: CellRect, walkable: bool) -> Result<(), GridError> {
        if !self.contains_rect(region) {
            return Err(GridError::RegionOutOfBounds(region));
        }
        self.write_region(region, walkable);
        self.rebuild_field();
        debug!(?region, walkable, "terrain region rewritten");
        Ok(())
    }

    /// Rewrites the walkability of several regions with a single field rebuild.
    ///
    /// Fails without touching the grid when any region leaves the grid.
    pub fn set_walkable_many(
        &mut self,
        regions: &[CellRect],
        walkable: bool,
    ) -> Result<(), GridError> {
        if let Some(outside) = regions.iter().find(|region| !self.contains_rect(**region)) {
            return Err(GridError::RegionOutOfBounds(*outside));
        }
        for region in regions {
            self.write_region(*region, walkable);
        }
        self.rebuild_field();
        debug!(regions = regions.len(), walkable, "terrain regions rewritten");
        Ok(())
    }

    fn write_region(&mut self, region: CellRect, walkable: bool) {
        for cell in region.cells() {
            if let Some(index) = self.index(cell) {
                self.walkable[index] = walkable;
            }
        }
    }

    /// Re-samples a region from the reader and rebuilds the distance field.
    pub fn reload_region<R>(&mut self, reader: &R, region: CellRect) -> Result<(), GridError>
    where
        R: WalkabilityReader + ?Sized,
    {
        ensure_dimensions(reader, (self.width, self.height))?;
        if !self.contains_rect(region) {
            return Err(GridError::RegionOutOfBounds(region));
        }
        for cell in region.cells() {
            if let Some(index) = self.index(cell) {
                self.walkable[index] = reader.is_walkable(cell.column(), cell.row());
            }
        }
        self.rebuild_field();
        debug!(?region, "terrain region reloaded");
        Ok(())
    }

    fn rebuild_field(&mut self) {
        let Self {
            width,
            height,
            walkable,
            field: distances,
            ..
        } = self;
        let row_length = *width as usize;
        distances.rebuild_with(*width, *height, |cell| {
            field::index(row_length, cell)
                .and_then(|index| walkable.get(index).copied())
                .unwrap_or(false)
        });
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        field::index(self.width as usize, cell)
    }
}

fn ensure_dimensions<R>(reader: &R, expected: (u32, u32)) -> Result<(), GridError>
where
    R: WalkabilityReader + ?Sized,
{
    let found = (reader.width(), reader.height());
    if found != expected {
        return Err(GridError::InconsistentDimensions { expected, found });
    }
    Ok(())
}

/// Grid construction running on a background thread.
///
/// The grid only becomes visible once the build has completed.
#[derive(Debug)]
pub struct PendingGrid {
    handle: JoinHandle<Result<WalkabilityGrid, GridError>>,
}

impl PendingGrid {
    /// Reports whether the build has finished, successfully or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the build completes and hands over the grid.
    pub fn wait(self) -> Result<WalkabilityGrid, GridError> {
        self.handle
            .join()
            .map_err(|_| GridError::BuilderPanicked)?
    }
}

/// Starts building a grid from `reader` on a dedicated thread.
pub fn spawn_build<R>(reader: R, sector_size: u32) -> Result<PendingGrid, GridError>
where
    R: WalkabilityReader + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("gridwalk-grid-build".to_owned())
        .spawn(move || WalkabilityGrid::build(&reader, sector_size))?;
    Ok(PendingGrid { handle })
}
