#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the gridwalk engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values describing what
//! happened. Every quantity that influences agent positions is expressed with
//! the fixed-point types from [`math`] so that lockstep peers compute
//! bit-identical results.

pub mod config;
pub mod math;

use serde::{Deserialize, Serialize};

pub use config::{ConfigError, SimulationConfig};
pub use math::{Aabb, Fixed, FixedVec2};

/// Integer path cost accumulated by graph searches.
pub type Cost = u32;

/// Cost of a single orthogonal step between adjacent cells.
pub const ORTHOGONAL_COST: Cost = 70;

/// Cost of a single diagonal step between adjacent cells.
///
/// `99 / 70` approximates the square root of two to four decimal places and is
/// shared by every peer, so path costs never depend on floating point.
pub const DIAGONAL_COST: Cost = 99;

/// Computes the octile distance between two cells using the agreed step costs.
#[must_use]
pub fn octile_cost(from: CellCoord, to: CellCoord) -> Cost {
    let dx = from.column().abs_diff(to.column());
    let dy = from.row().abs_diff(to.row());
    let diagonal = dx.min(dy);
    let straight = dx.max(dy) - diagonal;
    diagonal
        .saturating_mul(DIAGONAL_COST)
        .saturating_add(straight.saturating_mul(ORTHOGONAL_COST))
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Places a new agent whose footprint covers the provided square region.
    PlaceAgent {
        /// Client that owns the agent and receives its notifications.
        client: ClientId,
        /// Footprint occupied by the agent; width and height must match.
        area: CellRect,
    },
    /// Requests that an agent travel to the provided anchor cell.
    MoveAgent {
        /// Identifier of the agent that should move.
        agent: AgentId,
        /// Cell the agent's footprint should end up anchored on.
        target: CellCoord,
    },
    /// Requests that an agent abandon its current route and come to rest.
    StopAgent {
        /// Identifier of the agent that should stop.
        agent: AgentId,
    },
    /// Rewrites the walkability of a rectangular region of the map.
    EditTerrain {
        /// Region whose cells receive the new walkability.
        region: CellRect,
        /// Whether the region becomes walkable.
        walkable: bool,
    },
    /// Advances the simulation by a single tick.
    Tick,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Index of the tick that just completed.
        tick: u64,
    },
    /// Confirms that an agent entered the simulation.
    AgentPlaced {
        /// Identifier allocated to the agent.
        agent: AgentId,
        /// Client owning the agent.
        client: ClientId,
        /// Footprint occupied by the agent.
        area: CellRect,
    },
    /// Reports that an agent placement request was rejected.
    PlacementRejected {
        /// Client that requested the placement.
        client: ClientId,
        /// Footprint provided in the request.
        area: CellRect,
        /// Specific reason the placement failed.
        reason: PlacementError,
    },
    /// Announces the outcome of a path search for an agent.
    PathPlanned {
        /// Agent that requested the path.
        agent: AgentId,
        /// Number of steps contained in the planned route.
        steps: usize,
        /// Indicates whether the route ends at the requested target.
        reaches_target: bool,
    },
    /// Confirms that an agent changed position during a tick.
    AgentMoved {
        /// Agent that moved.
        agent: AgentId,
        /// Box minimum corner before the move.
        from: FixedVec2,
        /// Box minimum corner after the move.
        to: FixedVec2,
    },
    /// Confirms that an agent reached the end of its route.
    AgentArrived {
        /// Agent that arrived.
        agent: AgentId,
        /// Anchor cell the agent rests on.
        cell: CellCoord,
    },
    /// Reports that an agent was forced to zero velocity by a collision.
    AgentBlocked {
        /// Agent that was blocked.
        agent: AgentId,
    },
    /// Confirms that an agent stopped on request.
    AgentStopped {
        /// Agent that stopped.
        agent: AgentId,
    },
    /// Confirms that terrain walkability changed.
    TerrainEdited {
        /// Region that was rewritten.
        region: CellRect,
        /// Walkability assigned to the region.
        walkable: bool,
    },
    /// Reports that a command referenced state that does not exist.
    CommandRejected {
        /// Specific reason the command failed.
        reason: CommandError,
    },
}

/// Reasons an agent placement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum PlacementError {
    /// The footprint is not a non-empty square.
    #[error("agent footprints must be non-empty squares")]
    InvalidFootprint,
    /// The footprint extends beyond the grid bounds.
    #[error("footprint extends beyond the grid")]
    OutOfBounds,
    /// The footprint overlaps non-walkable terrain.
    #[error("footprint overlaps blocked terrain")]
    Blocked,
    /// The footprint overlaps another agent.
    #[error("footprint overlaps agent {0:?}")]
    Occupied(AgentId),
}

/// Reasons a command may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum CommandError {
    /// No agent with the provided identifier exists.
    #[error("agent {0:?} does not exist")]
    MissingAgent(AgentId),
    /// The requested target lies outside the grid.
    #[error("cell {0:?} lies outside the grid")]
    OutOfBounds(CellCoord),
    /// The requested terrain region extends beyond the grid.
    #[error("region {0:?} extends beyond the grid")]
    RegionOutOfBounds(CellRect),
}

/// Unique identifier assigned to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of the external client that owns an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(u32);

impl ClientId {
    /// Creates a new client identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Chebyshev distance between two cell coordinates.
    #[must_use]
    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        self.column()
            .abs_diff(other.column())
            .max(self.row().abs_diff(other.row()))
    }

    /// Returns the neighbouring cell in the provided direction, if it exists.
    ///
    /// Only underflow is detected; callers bound the upper edge themselves.
    #[must_use]
    pub fn step(self, direction: Direction) -> Option<CellCoord> {
        let (dx, dy) = direction.offset();
        let column = self.column.checked_add_signed(dx)?;
        let row = self.row.checked_add_signed(dy)?;
        Some(CellCoord::new(column, row))
    }
}

/// Axis-aligned rectangle expressed in cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRect {
    origin: CellCoord,
    size: CellRectSize,
}

impl CellRect {
    /// Constructs a rectangle from an origin cell and size.
    #[must_use]
    pub const fn from_origin_and_size(origin: CellCoord, size: CellRectSize) -> Self {
        Self { origin, size }
    }

    /// Constructs the square footprint of an agent of `size` anchored at `anchor`.
    ///
    /// Returns `None` when the footprint would extend past the zero edge.
    #[must_use]
    pub fn footprint(anchor: CellCoord, size: u32) -> Option<Self> {
        let back = size.saturating_sub(1) / 2;
        let column = anchor.column().checked_sub(back)?;
        let row = anchor.row().checked_sub(back)?;
        Some(Self::from_origin_and_size(
            CellCoord::new(column, row),
            CellRectSize::new(size, size),
        ))
    }

    /// Upper-left cell that anchors the rectangle.
    #[must_use]
    pub const fn origin(&self) -> CellCoord {
        self.origin
    }

    /// Dimensions of the rectangle measured in whole cells.
    #[must_use]
    pub const fn size(&self) -> CellRectSize {
        self.size
    }

    /// Reports whether the rectangle covers no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size.width == 0 || self.size.height == 0
    }

    /// Reports whether the rectangle contains the provided cell.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.column() >= self.origin.column()
            && cell.row() >= self.origin.row()
            && u64::from(cell.column())
                < u64::from(self.origin.column()) + u64::from(self.size.width())
            && u64::from(cell.row()) < u64::from(self.origin.row()) + u64::from(self.size.height())
    }

    /// Iterates the covered cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let origin = self.origin;
        let size = self.size;
        (0..size.height()).flat_map(move |dy| {
            (0..size.width())
                .map(move |dx| CellCoord::new(origin.column() + dx, origin.row() + dy))
        })
    }

    /// Anchor cell of a square footprint, the inverse of [`CellRect::footprint`].
    #[must_use]
    pub fn anchor(&self) -> CellCoord {
        let back = self.size.width().saturating_sub(1) / 2;
        CellCoord::new(self.origin.column() + back, self.origin.row() + back)
    }
}

/// Size of a [`CellRect`] measured in whole cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRectSize {
    width: u32,
    height: u32,
}

impl CellRectSize {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the rectangle in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the rectangle in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

/// Eight-way movement directions available to agents.
///
/// Variants are declared clockwise starting at north; that order is the
/// canonical enumeration order used wherever directions compete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing columns and decreasing rows.
    NorthEast,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing columns and rows.
    SouthEast,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing columns and increasing rows.
    SouthWest,
    /// Movement toward decreasing column indices.
    West,
    /// Movement toward decreasing columns and rows.
    NorthWest,
}

impl Direction {
    /// All directions in canonical order.
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// Column and row delta of a single step in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }

    /// Resolves the direction matching the sign of the provided delta.
    #[must_use]
    pub fn from_offset(dx: i32, dy: i32) -> Option<Self> {
        let key = (dx.signum(), dy.signum());
        Self::ALL
            .into_iter()
            .find(|direction| direction.offset() == key)
    }

    /// Reports whether the direction moves along both axes.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthEast | Self::SouthEast | Self::SouthWest | Self::NorthWest
        )
    }

    /// Direction one eighth of a turn counter-clockwise.
    #[must_use]
    pub const fn turned_left(self) -> Self {
        Self::ALL[(self.index() + 7) % 8]
    }

    /// Direction one eighth of a turn clockwise.
    #[must_use]
    pub const fn turned_right(self) -> Self {
        Self::ALL[(self.index() + 1) % 8]
    }

    /// Position of the direction within [`Direction::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Unit vector of the direction under the Chebyshev velocity model.
    #[must_use]
    pub fn unit(self) -> FixedVec2 {
        let (dx, dy) = self.offset();
        FixedVec2::new(Fixed::from_num(dx), Fixed::from_num(dy))
    }
}
