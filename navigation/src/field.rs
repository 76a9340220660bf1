//! Distance-to-obstacle field built by a multi-source breadth-first search.

use std::collections::VecDeque;

use gridwalk_core::{CellCoord, Direction};

/// Dense Chebyshev distance from every cell to the nearest blocked cell.
///
/// Blocked cells hold 0. Cells on the grid edge hold at most 1 because the
/// area outside the grid counts as blocked. A cell holding `d` has every cell
/// within Chebyshev radius `d - 1` walkable.
#[derive(Clone, Debug, Default)]
pub(crate) struct WallDistanceField {
    width: u32,
    height: u32,
    distances: Vec<u16>,
}

impl WallDistanceField {
    /// Rebuilds the field from scratch.
    pub(crate) fn rebuild_with<F>(&mut self, width: u32, height: u32, mut is_walkable: F)
    where
        F: FnMut(CellCoord) -> bool,
    {
        let width_usize = usize::try_from(width).unwrap_or(0);
        let height_usize = usize::try_from(height).unwrap_or(0);
        let cell_count = width_usize.checked_mul(height_usize).unwrap_or(0);

        self.width = width;
        self.height = height;
        if self.distances.len() != cell_count {
            self.distances = vec![u16::MAX; cell_count];
        } else {
            self.distances.fill(u16::MAX);
        }
        if cell_count == 0 {
            return;
        }

        let mut queue = VecDeque::new();

        for row in 0..height {
            for column in 0..width {
                let cell = CellCoord::new(column, row);
                if is_walkable(cell) {
                    continue;
                }
                if let Some(index) = index(width_usize, cell) {
                    self.distances[index] = 0;
                    queue.push_back(cell);
                }
            }
        }

        // Seeded after the blocked cells so the queue stays ordered by distance.
        for row in 0..height {
            for column in 0..width {
                let on_edge = row == 0 || column == 0 || row + 1 == height || column + 1 == width;
                if !on_edge {
                    continue;
                }
                let cell = CellCoord::new(column, row);
                let Some(index) = index(width_usize, cell) else {
                    continue;
                };
                if self.distances[index] > 1 {
                    self.distances[index] = 1;
                    queue.push_back(cell);
                }
            }
        }

        while let Some(cell) = queue.pop_front() {
            let Some(current_index) = index(width_usize, cell) else {
                continue;
            };
            let next_distance = self.distances[current_index].saturating_add(1);

            for neighbor in neighbors(cell, width, height) {
                let Some(neighbor_index) = index(width_usize, neighbor) else {
                    continue;
                };

                if self.distances[neighbor_index] <= next_distance {
                    continue;
                }

                self.distances[neighbor_index] = next_distance;
                queue.push_back(neighbor);
            }
        }
    }

    /// Distance captured for the provided cell; cells outside the field report 0.
    #[must_use]
    pub(crate) fn distance(&self, cell: CellCoord) -> u16 {
        if cell.column() >= self.width || cell.row() >= self.height {
            return 0;
        }

        usize::try_from(self.width)
            .ok()
            .and_then(|width| index(width, cell))
            .and_then(|offset| self.distances.get(offset).copied())
            .unwrap_or(0)
    }

    /// Dense distances stored in row-major order.
    #[must_use]
    pub(crate) fn cells(&self) -> &[u16] {
        &self.distances
    }
}

fn neighbors(cell: CellCoord, width: u32, height: u32) -> impl Iterator<Item = CellCoord> {
    Direction::ALL
        .into_iter()
        .filter_map(move |direction| cell.step(direction))
        .filter(move |neighbor| neighbor.column() < width && neighbor.row() < height)
}

pub(crate) fn index(width: usize, cell: CellCoord) -> Option<usize> {
    let column = usize::try_from(cell.column()).ok()?;
    let row = usize::try_from(cell.row()).ok()?;
    row.checked_mul(width)?.checked_add(column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_cells_are_zero_and_edges_are_one() {
        let mut field = WallDistanceField::default();
        let wall = CellCoord::new(2, 2);

        field.rebuild_with(5, 5, |cell| cell != wall);

        assert_eq!(field.distance(wall), 0);
        assert_eq!(field.distance(CellCoord::new(0, 0)), 1);
        assert_eq!(field.distance(CellCoord::new(4, 2)), 1);
        assert_eq!(field.distance(CellCoord::new(1, 1)), 1);
        assert_eq!(field.distance(CellCoord::new(9, 9)), 0);
    }

    #[test]
    fn open_field_grows_toward_the_centre() {
        let mut field = WallDistanceField::default();

        field.rebuild_with(7, 7, |_| true);

        let row: Vec<u16> = (0..7)
            .map(|column| field.distance(CellCoord::new(column, 3)))
            .collect();
        assert_eq!(row, vec![1, 2, 3, 4, 3, 2, 1]);
        assert_eq!(field.cells().len(), 49);
    }
}
