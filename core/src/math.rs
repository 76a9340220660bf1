//! Fixed-point arithmetic shared by every component that affects positions.

use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::{CellCoord, CellRect, CellRectSize};

/// Fixed-point scalar used for positions, velocities and speeds.
pub type Fixed = fixed::types::I48F16;

/// Two-dimensional vector of fixed-point components.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FixedVec2 {
    /// Horizontal component, growing with the column index.
    pub x: Fixed,
    /// Vertical component, growing with the row index.
    pub y: Fixed,
}

impl FixedVec2 {
    /// Vector with both components set to zero.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Creates a vector from its components.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Position of the minimum corner of the provided cell.
    #[must_use]
    pub fn from_cell(cell: CellCoord) -> Self {
        Self::new(Fixed::from_num(cell.column()), Fixed::from_num(cell.row()))
    }

    /// Multiplies both components by a scalar.
    #[must_use]
    pub fn scaled(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Largest absolute component.
    #[must_use]
    pub fn chebyshev_length(self) -> Fixed {
        self.x.abs().max(self.y.abs())
    }

    /// Squared Euclidean length.
    #[must_use]
    pub fn length_squared(self) -> Fixed {
        self.x * self.x + self.y * self.y
    }

    /// Reports whether both components are zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// Cell containing the point, or `None` when it lies left of or above the grid.
    #[must_use]
    pub fn containing_cell(self) -> Option<CellCoord> {
        let column = u32::try_from(self.x.floor().to_num::<i64>()).ok()?;
        let row = u32::try_from(self.y.floor().to_num::<i64>()).ok()?;
        Some(CellCoord::new(column, row))
    }
}

impl Add for FixedVec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for FixedVec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for FixedVec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Axis-aligned bounding box covering the half-open range `[min, max)`.
///
/// Boxes that merely touch along an edge do not intersect, so agents standing
/// on neighbouring cells never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aabb {
    min: FixedVec2,
    max: FixedVec2,
}

impl Aabb {
    /// Creates a box from its corners, returning `None` when it would be inverted or empty.
    #[must_use]
    pub fn new(min: FixedVec2, max: FixedVec2) -> Option<Self> {
        (min.x < max.x && min.y < max.y).then_some(Self { min, max })
    }

    /// Creates a box from its minimum corner and a positive size.
    #[must_use]
    pub fn from_min_size(min: FixedVec2, width: Fixed, height: Fixed) -> Option<Self> {
        Self::new(min, min + FixedVec2::new(width, height))
    }

    /// Box covering exactly the cells of the provided rectangle.
    #[must_use]
    pub fn from_cell_rect(rect: CellRect) -> Option<Self> {
        let min = FixedVec2::from_cell(rect.origin());
        Self::from_min_size(
            min,
            Fixed::from_num(rect.size().width()),
            Fixed::from_num(rect.size().height()),
        )
    }

    /// Minimum corner.
    #[must_use]
    pub const fn min(&self) -> FixedVec2 {
        self.min
    }

    /// Exclusive maximum corner.
    #[must_use]
    pub const fn max(&self) -> FixedVec2 {
        self.max
    }

    /// Horizontal extent.
    #[must_use]
    pub fn width(&self) -> Fixed {
        self.max.x - self.min.x
    }

    /// Vertical extent.
    #[must_use]
    pub fn height(&self) -> Fixed {
        self.max.y - self.min.y
    }

    /// Reports whether the two boxes share any interior area.
    #[must_use]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Reports whether the point lies inside the half-open box.
    #[must_use]
    pub fn contains_point(&self, point: FixedVec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }

    /// Reports whether `other` lies entirely inside this box.
    #[must_use]
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// Box shifted by the provided offset.
    #[must_use]
    pub fn translated(&self, offset: FixedVec2) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Box grown by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: Fixed) -> Self {
        let grow = FixedVec2::new(margin, margin);
        Self {
            min: self.min - grow,
            max: self.max + grow,
        }
    }

    /// Smallest cell rectangle covering the box, clipped at the zero edge.
    #[must_use]
    pub fn covered_cells(&self) -> CellRect {
        let clamp = |value: Fixed| -> u32 {
            u32::try_from(value.to_num::<i64>().max(0)).unwrap_or(u32::MAX)
        };
        let min_column = clamp(self.min.x.floor());
        let min_row = clamp(self.min.y.floor());
        let max_column = clamp(self.max.x.ceil());
        let max_row = clamp(self.max.y.ceil());
        CellRect::from_origin_and_size(
            CellCoord::new(min_column, min_row),
            CellRectSize::new(
                max_column.saturating_sub(min_column),
                max_row.saturating_sub(min_row),
            ),
        )
    }
}
