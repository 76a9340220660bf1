//! Tunable simulation parameters shared by every peer.

use serde::{Deserialize, Serialize};

use crate::Fixed;

/// Parameters that shape the spatial index, sector layout and agent motion.
///
/// Every peer of a lockstep session must run with an identical configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Contents a spatial index node holds before it subdivides.
    pub node_capacity: usize,
    /// Smallest side length, in cells, a spatial index node may be split into.
    pub min_node_size: u32,
    /// Side length, in cells, of the square sectors tiling the grid.
    pub sector_size: u32,
    /// Radius, in cells, around an agent within which neighbours are observed.
    pub sight_radius: u32,
    /// Number of discrete speed levels above rest.
    pub max_speed_level: u8,
    /// Sub-cell positions per cell; one speed level moves one step per tick.
    pub steps_per_cell: u32,
    /// Ticks an agent may go without reaching a waypoint, on top of the
    /// `steps_per_cell` ticks a cell takes at the lowest speed, before it
    /// replans around agents at rest.
    pub stall_ticks_before_replan: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_capacity: 8,
            min_node_size: 2,
            sector_size: 8,
            sight_radius: 4,
            max_speed_level: 4,
            steps_per_cell: 4,
            stall_ticks_before_replan: 6,
        }
    }
}

impl SimulationConfig {
    /// Checks every parameter, failing on the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_capacity == 0 {
            return Err(ConfigError::NodeCapacity);
        }
        if self.min_node_size == 0 {
            return Err(ConfigError::MinNodeSize);
        }
        if self.sector_size == 0 {
            return Err(ConfigError::SectorSize);
        }
        if self.sight_radius == 0 {
            return Err(ConfigError::SightRadius);
        }
        if self.max_speed_level == 0 {
            return Err(ConfigError::MaxSpeedLevel);
        }
        if !self.steps_per_cell.is_power_of_two() || self.steps_per_cell > 256 {
            return Err(ConfigError::StepsPerCell(self.steps_per_cell));
        }
        Ok(())
    }

    /// Distance, in cells, covered per tick by one speed level.
    #[must_use]
    pub fn speed_step(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.steps_per_cell)
    }
}

/// Reasons a [`SimulationConfig`] may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Spatial index nodes must hold at least one content.
    #[error("node_capacity must be positive")]
    NodeCapacity,
    /// Spatial index nodes must be at least one cell wide.
    #[error("min_node_size must be positive")]
    MinNodeSize,
    /// Sectors must be at least one cell wide.
    #[error("sector_size must be positive")]
    SectorSize,
    /// Agents must observe at least their immediate neighbourhood.
    #[error("sight_radius must be positive")]
    SightRadius,
    /// Agents need at least one speed level to move.
    #[error("max_speed_level must be positive")]
    MaxSpeedLevel,
    /// Steps must divide a cell exactly in fixed point.
    #[error("steps_per_cell must be a power of two no greater than 256, got {0}")]
    StepsPerCell(u32),
}
