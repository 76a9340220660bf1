#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-tick local velocity arbitration for a single agent.
//!
//! Every tick an agent enumerates the velocities it may physically adopt,
//! and the [`MotionController`] picks the one closest to the agent's
//! preferred velocity whose projected box stays clear of terrain and of the
//! projected boxes of nearby agents. Candidates are scored with fixed-point
//! arithmetic and ties go to the earliest candidate, so every peer selects
//! the same velocity.

use gridwalk_core::{Aabb, Direction, Fixed, FixedVec2};
use tracing::trace;

/// Discrete velocity: a speed level travelling in one of eight directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Velocity {
    level: u8,
    direction: Direction,
}

impl Velocity {
    /// Creates a velocity from its speed level and heading.
    #[must_use]
    pub const fn new(level: u8, direction: Direction) -> Self {
        Self { level, direction }
    }

    /// Velocity of an agent at rest facing `direction`.
    #[must_use]
    pub const fn rest(direction: Direction) -> Self {
        Self::new(0, direction)
    }

    /// Speed level; zero means at rest.
    #[must_use]
    pub const fn level(&self) -> u8 {
        self.level
    }

    /// Heading, retained while at rest.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Reports whether the velocity has zero speed.
    #[must_use]
    pub const fn is_rest(&self) -> bool {
        self.level == 0
    }

    /// Displacement per tick when one speed level moves `speed_step` cells.
    ///
    /// Diagonal velocities move the full distance along both axes.
    #[must_use]
    pub fn vector(&self, speed_step: Fixed) -> FixedVec2 {
        self.direction
            .unit()
            .scaled(speed_step * Fixed::from_num(self.level))
    }
}

/// Enumerates the velocities reachable from `current` within one tick.
///
/// An agent at rest may start in any of the eight directions at the first
/// speed level. A moving agent may accelerate, hold or decelerate by one
/// level while keeping its heading or turning one eighth either way; coming
/// to rest is offered once, keeping the heading. Candidates are appended in
/// canonical order: faster levels first, then straight, left, right.
pub fn admissible_velocities(current: Velocity, max_level: u8, out: &mut Vec<Velocity>) {
    if max_level == 0 {
        out.push(Velocity::rest(current.direction));
        return;
    }

    if current.is_rest() {
        let start = current.direction.index();
        out.extend((0..Direction::ALL.len()).map(|offset| {
            Velocity::new(1, Direction::ALL[(start + offset) % Direction::ALL.len()])
        }));
        return;
    }

    let level = current.level.min(max_level);
    let faster = (level < max_level).then(|| level + 1);
    let headings = [
        current.direction,
        current.direction.turned_left(),
        current.direction.turned_right(),
    ];

    for candidate_level in faster.into_iter().chain([level, level - 1]) {
        if candidate_level == 0 {
            out.push(Velocity::rest(current.direction));
            continue;
        }
        out.extend(
            headings
                .iter()
                .map(|heading| Velocity::new(candidate_level, *heading)),
        );
    }
}

/// Highest speed level from which an agent can still stop within `distance`
/// lattice steps while decelerating by one level per tick.
///
/// Moving at level `L` and then braking covers `L (L + 1) / 2` steps.
#[must_use]
pub fn braking_level(distance: u32, max_level: u8) -> u8 {
    let mut level = 0_u8;
    while level < max_level {
        let next = u32::from(level) + 1;
        if next * (next + 1) / 2 > distance {
            break;
        }
        level += 1;
    }
    level
}

/// Clamps `delta` component-wise so its Chebyshev length does not exceed `limit`.
#[must_use]
pub fn clamp_chebyshev(delta: FixedVec2, limit: Fixed) -> FixedVec2 {
    FixedVec2::new(delta.x.clamp(-limit, limit), delta.y.clamp(-limit, limit))
}

/// Observed state of the agent being steered.
pub trait MotionTarget {
    /// Minimum corner of the agent's box.
    fn position(&self) -> FixedVec2;

    /// Displacement applied during the previous tick.
    fn velocity(&self) -> FixedVec2;

    /// Current bounding box.
    fn bounds(&self) -> Aabb;
}

/// Sink for the velocity decision.
pub trait Actuator {
    /// Velocities the agent may adopt this tick, in canonical order.
    fn admissible_velocities(&self) -> &[Velocity];

    /// Adopts the admissible velocity at `index`.
    fn select_new_velocity(&mut self, index: usize);
}

/// Surroundings of the agent for the current tick.
pub trait Environment {
    /// Displacement the agent would like to make this tick.
    fn preferred_velocity(&self) -> FixedVec2;

    /// Nearby agents, in ascending identifier order.
    fn obstacles(&self) -> &[Obstacle];

    /// Reports whether a box overlaps blocked terrain or leaves the map.
    fn is_terrain_blocked(&self, bounds: &Aabb) -> bool;
}

/// Snapshot of a nearby moving agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Obstacle {
    /// Bounding box at the time of the snapshot.
    pub bounds: Aabb,
    /// Displacement the agent applies per tick.
    pub velocity: FixedVec2,
}

impl Obstacle {
    /// Box the agent is expected to occupy after its next move.
    #[must_use]
    pub fn projected(&self) -> Aabb {
        self.bounds.translated(self.velocity)
    }
}

/// Phase of an agent's motion across ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MotionState {
    /// At rest.
    #[default]
    Idle,
    /// Gaining speed.
    Accelerating,
    /// Holding speed.
    Cruising,
    /// Losing speed ahead of a stop or an obstacle.
    Decelerating,
}

impl MotionState {
    /// Phase implied by a change of speed level.
    #[must_use]
    pub fn after_selection(previous_level: u8, selected_level: u8) -> Self {
        if selected_level == 0 {
            Self::Idle
        } else if selected_level > previous_level {
            Self::Accelerating
        } else if selected_level < previous_level {
            Self::Decelerating
        } else {
            Self::Cruising
        }
    }
}

/// Chooses, once per tick, the admissible velocity that best approaches the
/// preferred velocity without colliding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionController {
    speed_step: Fixed,
}

impl MotionController {
    /// Creates a controller where one speed level moves `speed_step` cells per tick.
    #[must_use]
    pub const fn new(speed_step: Fixed) -> Self {
        Self { speed_step }
    }

    /// Distance in cells covered per tick by one speed level.
    #[must_use]
    pub const fn speed_step(&self) -> Fixed {
        self.speed_step
    }

    /// Scores every admissible velocity and selects the best collision-free one.
    ///
    /// Returns the selected index, or `None` when every candidate collides;
    /// the actuator is left untouched in that case and the caller must fall
    /// back to rest.
    pub fn update_velocity<T, A, E>(
        &self,
        target: &T,
        actuator: &mut A,
        environment: &E,
    ) -> Option<usize>
    where
        T: MotionTarget + ?Sized,
        A: Actuator + ?Sized,
        E: Environment + ?Sized,
    {
        let preferred = environment.preferred_velocity();
        let bounds = target.bounds();
        let obstacles = environment.obstacles();
        let mut best: Option<(usize, Fixed)> = None;

        for (index, candidate) in actuator.admissible_velocities().iter().enumerate() {
            let displacement = candidate.vector(self.speed_step);
            let moved = bounds.translated(displacement);
            if environment.is_terrain_blocked(&moved) {
                continue;
            }
            if obstacles
                .iter()
                .any(|obstacle| moved.intersects(&obstacle.projected()))
            {
                continue;
            }

            let score = (displacement - preferred).length_squared();
            if best.map_or(true, |(_, best_score)| score < best_score) {
                best = Some((index, score));
            }
        }

        let Some((index, _)) = best else {
            trace!(
                position = ?target.position(),
                obstacles = obstacles.len(),
                "every admissible velocity collides"
            );
            return None;
        };

        actuator.select_new_velocity(index);
        trace!(
            position = ?target.position(),
            previous = ?target.velocity(),
            index,
            "velocity selected"
        );
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(value: i32) -> Fixed {
        Fixed::from_num(value)
    }

    fn quarter() -> Fixed {
        Fixed::ONE / fixed(4)
    }

    fn unit_box(column: i32, row: i32) -> Aabb {
        Aabb::from_min_size(
            FixedVec2::new(fixed(column), fixed(row)),
            Fixed::ONE,
            Fixed::ONE,
        )
        .expect("non-empty")
    }

    struct Probe {
        bounds: Aabb,
    }

    impl MotionTarget for Probe {
        fn position(&self) -> FixedVec2 {
            self.bounds.min()
        }

        fn velocity(&self) -> FixedVec2 {
            FixedVec2::ZERO
        }

        fn bounds(&self) -> Aabb {
            self.bounds
        }
    }

    struct Choices {
        candidates: Vec<Velocity>,
        selected: Option<usize>,
    }

    impl Choices {
        fn from(current: Velocity, max_level: u8) -> Self {
            let mut candidates = Vec::new();
            admissible_velocities(current, max_level, &mut candidates);
            Self {
                candidates,
                selected: None,
            }
        }

        fn chosen(&self) -> Option<Velocity> {
            self.selected.map(|index| self.candidates[index])
        }
    }

    impl Actuator for Choices {
        fn admissible_velocities(&self) -> &[Velocity] {
            &self.candidates
        }

        fn select_new_velocity(&mut self, index: usize) {
            self.selected = Some(index);
        }
    }

    struct Surroundings {
        preferred: FixedVec2,
        obstacles: Vec<Obstacle>,
        walls: Vec<Aabb>,
    }

    impl Environment for Surroundings {
        fn preferred_velocity(&self) -> FixedVec2 {
            self.preferred
        }

        fn obstacles(&self) -> &[Obstacle] {
            &self.obstacles
        }

        fn is_terrain_blocked(&self, bounds: &Aabb) -> bool {
            self.walls.iter().any(|wall| wall.intersects(bounds))
        }
    }

    #[test]
    fn rest_offers_every_heading_at_first_level() {
        let mut out = Vec::new();
        admissible_velocities(Velocity::rest(Direction::East), 4, &mut out);
        assert_eq!(out.len(), 8);
        assert!(out.iter().all(|velocity| velocity.level() == 1));
        assert_eq!(out[0].direction(), Direction::East);
    }

    #[test]
    fn moving_agents_turn_at_most_one_step() {
        let mut out = Vec::new();
        admissible_velocities(Velocity::new(2, Direction::North), 4, &mut out);
        assert_eq!(out.len(), 9);
        assert_eq!(out[0], Velocity::new(3, Direction::North));
        assert_eq!(out[1], Velocity::new(3, Direction::NorthWest));
        assert_eq!(out[2], Velocity::new(3, Direction::NorthEast));
        assert_eq!(out[8], Velocity::new(1, Direction::NorthEast));

        out.clear();
        admissible_velocities(Velocity::new(4, Direction::North), 4, &mut out);
        assert_eq!(out.len(), 6, "no acceleration beyond the top level");

        out.clear();
        admissible_velocities(Velocity::new(1, Direction::South), 4, &mut out);
        assert_eq!(out.len(), 7);
        assert_eq!(out.last(), Some(&Velocity::rest(Direction::South)));
    }

    #[test]
    fn braking_level_stops_within_distance() {
        assert_eq!(braking_level(0, 4), 0);
        assert_eq!(braking_level(1, 4), 1);
        assert_eq!(braking_level(2, 4), 1);
        assert_eq!(braking_level(3, 4), 2);
        assert_eq!(braking_level(6, 4), 3);
        assert_eq!(braking_level(100, 4), 4);
    }

    #[test]
    fn picks_candidate_matching_preferred_velocity() {
        let controller = MotionController::new(quarter());
        let probe = Probe {
            bounds: unit_box(5, 5),
        };
        let mut choices = Choices::from(Velocity::new(1, Direction::East), 4);
        let surroundings = Surroundings {
            preferred: FixedVec2::new(quarter() * fixed(2), Fixed::ZERO),
            obstacles: Vec::new(),
            walls: Vec::new(),
        };

        let index = controller.update_velocity(&probe, &mut choices, &surroundings);

        assert_eq!(index, Some(0));
        assert_eq!(choices.chosen(), Some(Velocity::new(2, Direction::East)));
    }

    #[test]
    fn steers_around_projected_obstacle() {
        let controller = MotionController::new(quarter());
        let probe = Probe {
            bounds: unit_box(0, 0),
        };
        let mut choices = Choices::from(Velocity::rest(Direction::East), 4);
        let surroundings = Surroundings {
            preferred: FixedVec2::new(quarter(), Fixed::ZERO),
            obstacles: vec![Obstacle {
                bounds: unit_box(2, 0),
                velocity: FixedVec2::new(-Fixed::ONE, Fixed::ZERO),
            }],
            walls: Vec::new(),
        };

        let _ = controller.update_velocity(&probe, &mut choices, &surroundings);

        let chosen = choices.chosen().expect("a sidestep exists");
        assert_ne!(chosen.direction(), Direction::East);
        assert!(chosen.vector(quarter()).y != Fixed::ZERO);
    }

    #[test]
    fn fully_boxed_in_agent_selects_nothing() {
        let controller = MotionController::new(quarter());
        let probe = Probe {
            bounds: unit_box(3, 3),
        };
        let mut choices = Choices::from(Velocity::rest(Direction::North), 4);
        let walls = Direction::ALL
            .into_iter()
            .map(|direction| {
                let (dx, dy) = direction.offset();
                unit_box(3 + dx, 3 + dy)
            })
            .collect();
        let surroundings = Surroundings {
            preferred: FixedVec2::new(quarter(), quarter()),
            obstacles: Vec::new(),
            walls,
        };

        assert_eq!(
            controller.update_velocity(&probe, &mut choices, &surroundings),
            None
        );
        assert_eq!(choices.selected, None);
    }

    #[test]
    fn equal_scores_prefer_earlier_candidates() {
        let controller = MotionController::new(quarter());
        let probe = Probe {
            bounds: unit_box(4, 4),
        };
        let mut choices = Choices::from(Velocity::rest(Direction::North), 4);
        let surroundings = Surroundings {
            preferred: FixedVec2::ZERO,
            obstacles: Vec::new(),
            walls: Vec::new(),
        };

        let _ = controller.update_velocity(&probe, &mut choices, &surroundings);

        assert_eq!(choices.selected, Some(0));
    }

    #[test]
    fn state_follows_speed_changes() {
        assert_eq!(MotionState::after_selection(0, 1), MotionState::Accelerating);
        assert_eq!(MotionState::after_selection(3, 3), MotionState::Cruising);
        assert_eq!(MotionState::after_selection(3, 2), MotionState::Decelerating);
        assert_eq!(MotionState::after_selection(1, 0), MotionState::Idle);
    }
}
