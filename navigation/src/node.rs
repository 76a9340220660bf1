//! Cell-level graph that fine path searches run over.

use std::hash::{Hash, Hasher};

use gridwalk_core::{octile_cost, CellCoord, Direction};
use gridwalk_system_pathfinding::{Cost, Node};

use crate::{sectors::Corridor, WalkabilityGrid};

/// Grid cell participating in fine-grained path searches.
///
/// Successors are the neighbouring cells the object's footprint fits on,
/// optionally confined to the sectors of a [`Corridor`].
#[derive(Clone, Copy, Debug)]
pub struct GridNode<'a> {
    grid: &'a WalkabilityGrid,
    cell: CellCoord,
    corridor: Option<&'a Corridor>,
}

impl<'a> GridNode<'a> {
    pub(crate) fn new(
        grid: &'a WalkabilityGrid,
        cell: CellCoord,
        corridor: Option<&'a Corridor>,
    ) -> Self {
        Self {
            grid,
            cell,
            corridor,
        }
    }

    /// Anchor cell represented by the node.
    #[must_use]
    pub fn cell(&self) -> CellCoord {
        self.cell
    }
}

impl PartialEq for GridNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}

impl Eq for GridNode<'_> {}

impl Hash for GridNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.hash(state);
    }
}

impl Node for GridNode<'_> {
    fn distance(&self, other: &Self) -> Cost {
        octile_cost(self.cell, other.cell)
    }

    fn successors(&self, object_size: u32, out: &mut Vec<Self>) {
        for direction in Direction::ALL {
            if !self.grid.can_step(self.cell, direction, object_size) {
                continue;
            }
            let Some(next) = self.cell.step(direction) else {
                continue;
            };
            if let Some(corridor) = self.corridor {
                match self.grid.sector_of(next) {
                    Some(sector) if corridor.contains(sector) => {}
                    _ => continue,
                }
            }
            out.push(GridNode::new(self.grid, next, self.corridor));
        }
    }
}
