//! Rectangular sectors tiling the grid and the coarse graph over them.

use std::{
    collections::BTreeSet,
    hash::{Hash, Hasher},
};

use gridwalk_core::{octile_cost, CellCoord, CellRect, CellRectSize, Direction};
use gridwalk_system_pathfinding::{Cost, Node};

use crate::WalkabilityGrid;

/// Identifier of a sector, numbered in row-major order of the tiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectorId(u32);

impl SectorId {
    /// Creates a sector identifier from its raw index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the raw index.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Rectangular region of the grid.
///
/// Sectors own no cells; cells refer to their sector by [`SectorId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sector {
    id: SectorId,
    area: CellRect,
}

impl Sector {
    /// Identifier of the sector.
    #[must_use]
    pub const fn id(&self) -> SectorId {
        self.id
    }

    /// Cells covered by the sector.
    #[must_use]
    pub const fn area_on_grid(&self) -> CellRect {
        self.area
    }

    /// Cell closest to the middle of the sector.
    #[must_use]
    pub fn center(&self) -> CellCoord {
        let origin = self.area.origin();
        let size = self.area.size();
        CellCoord::new(
            origin.column() + size.width() / 2,
            origin.row() + size.height() / 2,
        )
    }
}

/// Tiles a `width` x `height` grid with `sector_size` squares, clipping the
/// last column and row of sectors at the grid edge.
///
/// The result depends only on its arguments.
pub(crate) fn tile(width: u32, height: u32, sector_size: u32) -> (Vec<Sector>, u32) {
    let columns = width.div_ceil(sector_size);
    let rows = height.div_ceil(sector_size);
    let mut sectors = Vec::with_capacity(columns as usize * rows as usize);

    for sector_row in 0..rows {
        for sector_column in 0..columns {
            let origin = CellCoord::new(sector_column * sector_size, sector_row * sector_size);
            let size = CellRectSize::new(
                sector_size.min(width - origin.column()),
                sector_size.min(height - origin.row()),
            );
            sectors.push(Sector {
                id: SectorId(sector_row * columns + sector_column),
                area: CellRect::from_origin_and_size(origin, size),
            });
        }
    }

    (sectors, columns)
}

/// Vertex of the coarse sector graph.
///
/// Two sectors are adjacent for an object size when some cell on the border
/// of one can step into the other under the fine grid rules.
#[derive(Clone, Copy, Debug)]
pub struct SectorNode<'a> {
    grid: &'a WalkabilityGrid,
    id: SectorId,
}

impl<'a> SectorNode<'a> {
    pub(crate) fn new(grid: &'a WalkabilityGrid, id: SectorId) -> Self {
        Self { grid, id }
    }

    /// Sector represented by this vertex.
    #[must_use]
    pub fn id(&self) -> SectorId {
        self.id
    }

    fn sector(&self) -> Option<&'a Sector> {
        self.grid.sector(self.id)
    }
}

impl PartialEq for SectorNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SectorNode<'_> {}

impl Hash for SectorNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Node for SectorNode<'_> {
    fn distance(&self, other: &Self) -> Cost {
        match (self.sector(), other.sector()) {
            (Some(from), Some(to)) => octile_cost(from.center(), to.center()),
            _ => 0,
        }
    }

    fn successors(&self, object_size: u32, out: &mut Vec<Self>) {
        let Some(sector) = self.sector() else {
            return;
        };

        let mut connected = BTreeSet::new();
        for cell in border_cells(sector.area_on_grid()) {
            if !self.grid.fits(cell, object_size) {
                continue;
            }
            for direction in Direction::ALL {
                let Some(next) = cell.step(direction) else {
                    continue;
                };
                let Some(next_sector) = self.grid.sector_of(next) else {
                    continue;
                };
                if next_sector != self.id && self.grid.can_step(cell, direction, object_size) {
                    let _ = connected.insert(next_sector);
                }
            }
        }

        out.extend(connected.into_iter().map(|id| SectorNode::new(self.grid, id)));
    }
}

/// Set of sectors a fine search is confined to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Corridor {
    members: Vec<bool>,
}

impl Corridor {
    /// Builds a corridor containing the provided sectors of `grid`.
    ///
    /// Identifiers that do not belong to the grid are ignored.
    #[must_use]
    pub fn new(grid: &WalkabilityGrid, sectors: impl IntoIterator<Item = SectorId>) -> Self {
        let mut members = vec![false; grid.sectors().len()];
        for id in sectors {
            if let Some(slot) = members.get_mut(id.get() as usize) {
                *slot = true;
            }
        }
        Self { members }
    }

    /// Reports whether the sector belongs to the corridor.
    #[must_use]
    pub fn contains(&self, id: SectorId) -> bool {
        self.members.get(id.get() as usize).copied().unwrap_or(false)
    }

    /// Number of sectors in the corridor.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.iter().filter(|member| **member).count()
    }

    /// Reports whether the corridor contains no sector.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn border_cells(area: CellRect) -> impl Iterator<Item = CellCoord> {
    let origin = area.origin();
    let size = area.size();
    let last_column = origin.column() + size.width().saturating_sub(1);
    let last_row = origin.row() + size.height().saturating_sub(1);
    area.cells().filter(move |cell| {
        cell.column() == origin.column()
            || cell.row() == origin.row()
            || cell.column() == last_column
            || cell.row() == last_row
    })
}
