//! Glue between world agents and the motion controller.

use gridwalk_core::{Aabb, Fixed, FixedVec2};
use gridwalk_navigation::WalkabilityGrid;
use gridwalk_system_motion::{Actuator, Environment, Obstacle, Velocity};

/// Candidate buffer reused across agents and ticks.
#[derive(Debug, Default)]
pub(crate) struct Selection {
    pub(crate) candidates: Vec<Velocity>,
    pub(crate) selected: Option<usize>,
}

impl Selection {
    pub(crate) fn reset(&mut self) {
        self.candidates.clear();
        self.selected = None;
    }

    pub(crate) fn chosen(&self) -> Option<Velocity> {
        self.selected
            .and_then(|index| self.candidates.get(index).copied())
    }
}

impl Actuator for Selection {
    fn admissible_velocities(&self) -> &[Velocity] {
        &self.candidates
    }

    fn select_new_velocity(&mut self, index: usize) {
        self.selected = Some(index);
    }
}

pub(crate) struct Surroundings<'a> {
    pub(crate) preferred: FixedVec2,
    pub(crate) obstacles: &'a [Obstacle],
    pub(crate) grid: &'a WalkabilityGrid,
}

impl Environment for Surroundings<'_> {
    fn preferred_velocity(&self) -> FixedVec2 {
        self.preferred
    }

    fn obstacles(&self) -> &[Obstacle] {
        self.obstacles
    }

    fn is_terrain_blocked(&self, bounds: &Aabb) -> bool {
        terrain_blocks(self.grid, bounds)
    }
}

/// Reports whether a box touches a blocked cell or extends past the grid.
pub(crate) fn terrain_blocks(grid: &WalkabilityGrid, bounds: &Aabb) -> bool {
    if bounds.min().x < Fixed::ZERO || bounds.min().y < Fixed::ZERO {
        return true;
    }
    !grid.area_walkable(bounds.covered_cells())
}
