//! Agents owned by the world and the route they follow.

use std::collections::VecDeque;

use gridwalk_core::{
    Aabb, AgentId, CellCoord, CellRect, CellRectSize, ClientId, Direction, Fixed, FixedVec2,
};
use gridwalk_spatial::Bounded;
use gridwalk_system_motion::{MotionState, MotionTarget, Velocity};

/// Cells an agent is heading through and where it will come to rest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Route {
    /// Anchor cells still ahead of the agent.
    pub(crate) waypoints: VecDeque<CellCoord>,
    /// Anchor cell the agent was asked to reach.
    pub(crate) target: CellCoord,
    /// Last cell of the planned path; equals `target` when it was reachable.
    pub(crate) destination: CellCoord,
    /// Indicates whether the planned path ends at `target`.
    pub(crate) reaches_target: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct Agent {
    pub(crate) id: AgentId,
    pub(crate) client: ClientId,
    pub(crate) size: u32,
    pub(crate) bounds: Aabb,
    pub(crate) velocity: Velocity,
    /// Displacement applied during the last tick.
    pub(crate) displacement: FixedVec2,
    pub(crate) state: MotionState,
    pub(crate) route: Option<Route>,
    /// Consecutive ticks without reaching a waypoint.
    pub(crate) stalled_ticks: u32,
    /// Set while the agent is held at rest by a collision.
    pub(crate) blocked: bool,
}

impl Agent {
    pub(crate) fn new(id: AgentId, client: ClientId, area: CellRect, bounds: Aabb) -> Self {
        Self {
            id,
            client,
            size: area.size().width(),
            bounds,
            velocity: Velocity::rest(Direction::North),
            displacement: FixedVec2::ZERO,
            state: MotionState::Idle,
            route: None,
            stalled_ticks: 0,
            blocked: false,
        }
    }

    pub(crate) fn position(&self) -> FixedVec2 {
        self.bounds.min()
    }

    /// Anchor cell of the footprint whose minimum corner contains the position.
    pub(crate) fn anchor(&self) -> CellCoord {
        let origin = self
            .position()
            .containing_cell()
            .unwrap_or(CellCoord::new(0, 0));
        CellRect::from_origin_and_size(origin, CellRectSize::new(self.size, self.size)).anchor()
    }

    /// Cells currently touched by the footprint.
    pub(crate) fn area(&self) -> CellRect {
        self.bounds.covered_cells()
    }

    /// Drops the waypoints the agent stands on or has already passed.
    ///
    /// A waypoint counts as passed once the agent is strictly closer to the
    /// following waypoint than the waypoint itself is, which happens after
    /// steering around an obstacle. Returns whether any waypoint was dropped.
    pub(crate) fn drop_reached_waypoints(&mut self) -> bool {
        let position = self.position();
        let size = self.size;
        let Some(route) = self.route.as_mut() else {
            return false;
        };
        let mut dropped = false;
        while let Some(front) = route.waypoints.front() {
            let front = corner_of(*front, size);
            let passed = route.waypoints.get(1).is_some_and(|next| {
                let next = corner_of(*next, size);
                (next - position).chebyshev_length() < (next - front).chebyshev_length()
            });
            if front != position && !passed {
                break;
            }
            let _ = route.waypoints.pop_front();
            dropped = true;
        }
        dropped
    }

    /// Drops the waypoints passed while moving from `from` to the current
    /// position, returning whether any waypoint was dropped.
    pub(crate) fn drop_swept_waypoints(&mut self, from: FixedVec2) -> bool {
        let to = self.position();
        let size = self.size;
        let Some(route) = self.route.as_mut() else {
            return false;
        };
        let mut dropped = false;
        while route
            .waypoints
            .front()
            .is_some_and(|cell| sweeps(from, to, corner_of(*cell, size)))
        {
            let _ = route.waypoints.pop_front();
            dropped = true;
        }
        dropped
    }

    /// Point the agent steers toward this tick and the lattice steps left to it.
    ///
    /// The point is the end of the straight run of waypoints ahead, so the
    /// agent comes to rest at every change of heading and at the destination.
    pub(crate) fn steering_goal(&self, speed_step: Fixed) -> Option<(FixedVec2, u32)> {
        let route = self.route.as_ref()?;
        let position = self.position();
        let mut corners = route
            .waypoints
            .iter()
            .map(|cell| corner_of(*cell, self.size));
        let aim = corners
            .next()
            .unwrap_or_else(|| corner_of(route.destination, self.size));

        let heading = heading_of(aim - position);
        let mut end = aim;
        if heading.is_some() {
            for corner in corners {
                if heading_of(corner - end) != heading {
                    break;
                }
                end = corner;
            }
        }

        let remaining = ((end - position).chebyshev_length() / speed_step).to_num::<u32>();
        Some((end, remaining))
    }

    /// Comes to rest keeping the current heading.
    pub(crate) fn halt(&mut self) {
        self.velocity = Velocity::rest(self.velocity.direction());
        self.displacement = FixedVec2::ZERO;
        self.state = MotionState::Idle;
    }
}

impl Bounded for Agent {
    type Key = AgentId;

    fn spatial_key(&self) -> AgentId {
        self.id
    }

    fn bounding_box(&self) -> Aabb {
        self.bounds
    }
}

impl MotionTarget for Agent {
    fn position(&self) -> FixedVec2 {
        self.bounds.min()
    }

    fn velocity(&self) -> FixedVec2 {
        self.displacement
    }

    fn bounds(&self) -> Aabb {
        self.bounds
    }
}

/// Box minimum corner of a footprint of `size` anchored at `anchor`.
pub(crate) fn corner_of(anchor: CellCoord, size: u32) -> FixedVec2 {
    let back = size.saturating_sub(1) / 2;
    FixedVec2::from_cell(CellCoord::new(
        anchor.column().saturating_sub(back),
        anchor.row().saturating_sub(back),
    ))
}

fn heading_of(delta: FixedVec2) -> Option<Direction> {
    Direction::from_offset(
        delta.x.signum().to_num::<i32>(),
        delta.y.signum().to_num::<i32>(),
    )
}

/// Reports whether the segment from `from` to `to` passes through `point`.
///
/// Segments are straight moves along one of the eight directions, so the
/// check is exact in fixed-point arithmetic.
pub(crate) fn sweeps(from: FixedVec2, to: FixedVec2, point: FixedVec2) -> bool {
    let segment = to - from;
    let offset = point - from;
    if segment.is_zero() {
        return offset.is_zero();
    }
    let cross = offset.x * segment.y - offset.y * segment.x;
    let dot = offset.x * segment.x + offset.y * segment.y;
    cross == Fixed::ZERO
        && dot >= Fixed::ZERO
        && dot <= segment.length_squared()
}
