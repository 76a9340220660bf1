#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative simulation state for gridwalk.
//!
//! The world owns the walkability grid, the spatial index and every agent.
//! Adapters mutate it exclusively through [`apply`] and observe it through
//! the read-only [`query`] module. Agents are always processed in ascending
//! identifier order and every position is fixed-point, so two worlds fed the
//! same commands stay bit-identical.

mod agent;
mod planner;
mod steering;

use std::collections::BTreeMap;

use gridwalk_core::{
    Aabb, AgentId, CellCoord, CellRect, CellRectSize, ClientId, Command, CommandError,
    ConfigError, Event, Fixed, PlacementError, SimulationConfig,
};
use gridwalk_navigation::WalkabilityGrid;
use gridwalk_spatial::{SpatialError, SpatialIndex};
use gridwalk_system_motion::{
    admissible_velocities, braking_level, clamp_chebyshev, MotionController, MotionState,
    Obstacle,
};
use tracing::{error, trace, warn};

use crate::{
    agent::{Agent, Route},
    planner::Plan,
    steering::{terrain_blocks, Selection, Surroundings},
};

/// Reasons a world cannot be created.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The simulation parameters are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The spatial index rejected its parameters.
    #[error(transparent)]
    Spatial(#[from] SpatialError<AgentId>),
    /// The grid covers no area.
    #[error("the walkability grid is empty")]
    EmptyGrid,
}

/// Represents the authoritative simulation state.
#[derive(Debug)]
pub struct World {
    config: SimulationConfig,
    grid: WalkabilityGrid,
    index: SpatialIndex<AgentId>,
    controller: MotionController,
    agents: BTreeMap<AgentId, Agent>,
    next_agent_id: u32,
    tick_index: u64,
    selection: Selection,
}

impl World {
    /// Creates an empty world over a fully built grid.
    pub fn new(config: SimulationConfig, grid: WalkabilityGrid) -> Result<Self, WorldError> {
        config.validate()?;
        let region = Aabb::from_cell_rect(CellRect::from_origin_and_size(
            CellCoord::new(0, 0),
            CellRectSize::new(grid.width(), grid.height()),
        ))
        .ok_or(WorldError::EmptyGrid)?;
        let index = SpatialIndex::with_config(region, &config)?;
        let controller = MotionController::new(config.speed_step());

        Ok(Self {
            config,
            grid,
            index,
            controller,
            agents: BTreeMap::new(),
            next_agent_id: 0,
            tick_index: 0,
            selection: Selection::default(),
        })
    }

    fn place_agent(&mut self, client: ClientId, area: CellRect) -> Result<AgentId, PlacementError> {
        let size = area.size();
        if area.is_empty() || size.width() != size.height() {
            return Err(PlacementError::InvalidFootprint);
        }
        if !self.grid.contains_rect(area) {
            return Err(PlacementError::OutOfBounds);
        }
        if !self.grid.area_walkable(area) {
            return Err(PlacementError::Blocked);
        }
        let bounds = Aabb::from_cell_rect(area).ok_or(PlacementError::InvalidFootprint)?;
        if let Some(occupant) = self.index.contents_in(&bounds).first() {
            return Err(PlacementError::Occupied(*occupant));
        }

        let id = AgentId::new(self.next_agent_id);
        let agent = Agent::new(id, client, area, bounds);
        if let Err(error) = self.index.attach_bounded(&agent) {
            error!(%error, "spatial index rejected a new agent");
            return Err(PlacementError::OutOfBounds);
        }
        self.next_agent_id = self.next_agent_id.saturating_add(1);
        let _ = self.agents.insert(id, agent);
        Ok(id)
    }

    /// Plans a fresh route for the agent, optionally treating every agent
    /// without a route of its own as an obstacle.
    fn route_agent(
        &mut self,
        id: AgentId,
        target: CellCoord,
        avoid_resting: bool,
        out_events: &mut Vec<Event>,
    ) {
        let resting: Vec<CellRect> = if avoid_resting {
            self.agents
                .values()
                .filter(|other| other.id != id && other.route.is_none())
                .map(Agent::area)
                .collect()
        } else {
            Vec::new()
        };
        let Some(agent) = self.agents.get_mut(&id) else {
            return;
        };
        let plan = planner::plan_around(&self.grid, &resting, agent.anchor(), target, agent.size);
        let steps = plan.steps();
        let reaches_target = plan.reaches_target;
        agent.route = Some(route_from(plan, agent.anchor(), target));
        agent.stalled_ticks = 0;
        out_events.push(Event::PathPlanned {
            agent: id,
            steps,
            reaches_target,
        });
    }

    fn route_is_obstructed(&self, agent: &Agent, walkable: bool) -> bool {
        let Some(route) = agent.route.as_ref() else {
            return false;
        };
        if walkable && !route.reaches_target {
            return true;
        }
        route.waypoints.iter().any(|cell| {
            CellRect::footprint(*cell, agent.size)
                .map_or(true, |area| !self.grid.area_walkable(area))
        })
    }

    fn advance_agents(&mut self, out_events: &mut Vec<Event>) {
        let ids: Vec<AgentId> = self.agents.keys().copied().collect();
        for id in ids {
            if let Err(error) = self.advance_agent(id, out_events) {
                error!(%error, agent = id.get(), "spatial index rejected an agent move");
            }
        }
    }

    /// Steers the agent for one tick and replans when it has gone too long
    /// without reaching a waypoint.
    fn advance_agent(
        &mut self,
        id: AgentId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), SpatialError<AgentId>> {
        let progressed = self.steer_agent(id, out_events)?;
        let limit = self
            .config
            .stall_ticks_before_replan
            .saturating_add(self.config.steps_per_cell);
        let Some(agent) = self.agents.get_mut(&id) else {
            return Ok(());
        };
        let Some(target) = agent.route.as_ref().map(|route| route.target) else {
            return Ok(());
        };
        if progressed {
            agent.stalled_ticks = 0;
            return Ok(());
        }
        agent.stalled_ticks = agent.stalled_ticks.saturating_add(1);
        if agent.stalled_ticks < limit {
            return Ok(());
        }
        warn!(
            agent = id.get(),
            stalled = agent.stalled_ticks,
            "agent stalled, replanning around resting agents"
        );
        self.route_agent(id, target, true, out_events);
        Ok(())
    }

    /// Selects and applies the agent's velocity for this tick, returning
    /// whether the agent reached a waypoint.
    fn steer_agent(
        &mut self,
        id: AgentId,
        out_events: &mut Vec<Event>,
    ) -> Result<bool, SpatialError<AgentId>> {
        let speed_step = self.config.speed_step();
        let Some(agent) = self.agents.get_mut(&id) else {
            return Ok(false);
        };
        let mut progressed = agent.drop_reached_waypoints();
        let Some((goal, remaining)) = agent.steering_goal(speed_step) else {
            return Ok(progressed);
        };

        if remaining == 0 && agent.velocity.is_rest() {
            let cell = agent.anchor();
            agent.route = None;
            agent.halt();
            agent.stalled_ticks = 0;
            agent.blocked = false;
            out_events.push(Event::AgentArrived { agent: id, cell });
            return Ok(true);
        }

        let level = braking_level(remaining, self.config.max_speed_level);
        let preferred = clamp_chebyshev(
            goal - agent.position(),
            speed_step * Fixed::from_num(level),
        );

        let Some(agent) = self.agents.get(&id) else {
            return Ok(progressed);
        };
        let sight = agent.bounds.expanded(Fixed::from_num(self.config.sight_radius));
        let obstacles: Vec<Obstacle> = self
            .index
            .contents_in(&sight)
            .into_iter()
            .filter(|other| *other != id)
            .filter_map(|other| self.agents.get(&other))
            .map(|other| Obstacle {
                bounds: other.bounds,
                velocity: other.displacement,
            })
            .collect();

        self.selection.reset();
        admissible_velocities(
            agent.velocity,
            self.config.max_speed_level,
            &mut self.selection.candidates,
        );
        let surroundings = Surroundings {
            preferred,
            obstacles: &obstacles,
            grid: &self.grid,
        };
        let _ = self
            .controller
            .update_velocity(agent, &mut self.selection, &surroundings);
        let decision = self.selection.chosen();

        let Some(agent) = self.agents.get_mut(&id) else {
            return Ok(progressed);
        };
        let Some(velocity) = decision else {
            trace!(agent = id.get(), "no collision-free velocity, waiting");
            self.block(id, out_events);
            return Ok(progressed);
        };

        let previous_level = agent.velocity.level();
        let displacement = velocity.vector(speed_step);
        if displacement.is_zero() {
            agent.velocity = velocity;
            agent.displacement = displacement;
            agent.state = MotionState::after_selection(previous_level, 0);
            agent.blocked = false;
            return Ok(progressed);
        }

        let from = agent.position();
        let moved = agent.bounds.translated(displacement);
        let token = self.index.begin_move(id)?;
        if !self.index.contents_in(&moved).is_empty() || terrain_blocks(&self.grid, &moved) {
            self.index.cancel_move(token)?;
            warn!(agent = id.get(), "collision after velocity selection, forcing idle");
            self.block(id, out_events);
            return Ok(progressed);
        }
        self.index.end_move(token, moved)?;

        agent.bounds = moved;
        agent.velocity = velocity;
        agent.displacement = displacement;
        agent.state = MotionState::after_selection(previous_level, velocity.level());
        agent.blocked = false;
        progressed |= agent.drop_swept_waypoints(from);
        trace!(
            agent = id.get(),
            level = velocity.level(),
            direction = ?velocity.direction(),
            state = ?agent.state,
            "agent advanced"
        );
        out_events.push(Event::AgentMoved {
            agent: id,
            from,
            to: moved.min(),
        });
        Ok(progressed)
    }

    /// Forces the agent to rest, reporting the first tick of each blockage.
    fn block(&mut self, id: AgentId, out_events: &mut Vec<Event>) {
        let Some(agent) = self.agents.get_mut(&id) else {
            return;
        };
        agent.halt();
        if !agent.blocked {
            agent.blocked = true;
            out_events.push(Event::AgentBlocked { agent: id });
        }
    }
}

fn route_from(plan: Plan, source: CellCoord, target: CellCoord) -> Route {
    let destination = plan.cells.last().copied().unwrap_or(source);
    Route {
        waypoints: plan.cells.into(),
        target,
        destination,
        reaches_target: plan.reaches_target,
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::PlaceAgent { client, area } => match world.place_agent(client, area) {
            Ok(agent) => out_events.push(Event::AgentPlaced {
                agent,
                client,
                area,
            }),
            Err(reason) => out_events.push(Event::PlacementRejected {
                client,
                area,
                reason,
            }),
        },
        Command::MoveAgent { agent, target } => {
            if !world.agents.contains_key(&agent) {
                out_events.push(Event::CommandRejected {
                    reason: CommandError::MissingAgent(agent),
                });
            } else if !world.grid.contains(target) {
                out_events.push(Event::CommandRejected {
                    reason: CommandError::OutOfBounds(target),
                });
            } else {
                world.route_agent(agent, target, false, out_events);
            }
        }
        Command::StopAgent { agent } => match world.agents.get_mut(&agent) {
            Some(stopped) => {
                stopped.route = None;
                stopped.halt();
                stopped.stalled_ticks = 0;
                stopped.blocked = false;
                out_events.push(Event::AgentStopped { agent });
            }
            None => out_events.push(Event::CommandRejected {
                reason: CommandError::MissingAgent(agent),
            }),
        },
        Command::EditTerrain { region, walkable } => {
            if world.grid.set_walkable(region, walkable).is_err() {
                out_events.push(Event::CommandRejected {
                    reason: CommandError::RegionOutOfBounds(region),
                });
                return;
            }
            out_events.push(Event::TerrainEdited { region, walkable });

            let affected: Vec<(AgentId, CellCoord)> = world
                .agents
                .values()
                .filter(|agent| world.route_is_obstructed(agent, walkable))
                .filter_map(|agent| agent.route.as_ref().map(|route| (agent.id, route.target)))
                .collect();
            for (agent, target) in affected {
                world.route_agent(agent, target, false, out_events);
            }
        }
        Command::Tick => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced {
                tick: world.tick_index,
            });
            world.advance_agents(out_events);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use gridwalk_core::{
        Aabb, AgentId, CellCoord, CellRect, ClientId, Direction, FixedVec2, SimulationConfig,
    };
    use gridwalk_navigation::WalkabilityGrid;
    use gridwalk_spatial::SpatialIndex;
    use gridwalk_system_motion::MotionState;
    use sha2::{Digest, Sha256};

    use super::{agent::Agent, World};

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick(world: &World) -> u64 {
        world.tick_index
    }

    /// Parameters the world was created with.
    #[must_use]
    pub fn config(world: &World) -> &SimulationConfig {
        &world.config
    }

    /// Provides read-only access to the walkability grid.
    #[must_use]
    pub fn grid(world: &World) -> &WalkabilityGrid {
        &world.grid
    }

    /// Provides read-only access to the spatial index of agents.
    #[must_use]
    pub fn spatial_index(world: &World) -> &SpatialIndex<AgentId> {
        &world.index
    }

    /// Captures every agent in ascending identifier order.
    #[must_use]
    pub fn agents(world: &World) -> Vec<AgentSnapshot> {
        world.agents.values().map(snapshot).collect()
    }

    /// Captures a single agent.
    #[must_use]
    pub fn agent(world: &World, id: AgentId) -> Option<AgentSnapshot> {
        world.agents.get(&id).map(snapshot)
    }

    /// Agents whose footprint overlaps the provided cells, in identifier order.
    #[must_use]
    pub fn agents_in(world: &World, area: CellRect) -> Vec<AgentId> {
        Aabb::from_cell_rect(area)
            .map(|bounds| world.index.contents_in(&bounds))
            .unwrap_or_default()
    }

    /// Agents whose footprint contains the point, in identifier order.
    #[must_use]
    pub fn agents_at(world: &World, point: FixedVec2) -> Vec<AgentId> {
        world.index.contents_at(point)
    }

    /// SHA-256 digest of every agent's simulation state, for desync detection.
    #[must_use]
    pub fn state_digest(world: &World) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(world.tick_index.to_le_bytes());
        for agent in world.agents.values() {
            hasher.update(agent.id.get().to_le_bytes());
            hasher.update(agent.client.get().to_le_bytes());
            hasher.update(agent.size.to_le_bytes());
            let position = agent.position();
            hasher.update(position.x.to_bits().to_le_bytes());
            hasher.update(position.y.to_bits().to_le_bytes());
            hasher.update([
                agent.velocity.level(),
                agent.velocity.direction().index() as u8,
                state_code(agent.state),
                u8::from(agent.blocked),
            ]);
            hasher.update(agent.stalled_ticks.to_le_bytes());
            match agent.route.as_ref() {
                Some(route) => {
                    hasher.update([1_u8]);
                    hasher.update(route.target.column().to_le_bytes());
                    hasher.update(route.target.row().to_le_bytes());
                    hasher.update((route.waypoints.len() as u64).to_le_bytes());
                    for cell in &route.waypoints {
                        hasher.update(cell.column().to_le_bytes());
                        hasher.update(cell.row().to_le_bytes());
                    }
                }
                None => hasher.update([0_u8]),
            }
        }
        hasher.finalize().into()
    }

    fn state_code(state: MotionState) -> u8 {
        match state {
            MotionState::Idle => 0,
            MotionState::Accelerating => 1,
            MotionState::Cruising => 2,
            MotionState::Decelerating => 3,
        }
    }

    /// Immutable representation of a single agent's state used for queries.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct AgentSnapshot {
        /// Unique identifier assigned to the agent.
        pub id: AgentId,
        /// Client owning the agent.
        pub client: ClientId,
        /// Side length of the square footprint in cells.
        pub size: u32,
        /// Cells currently touched by the footprint.
        pub area: CellRect,
        /// Minimum corner of the agent's bounding box.
        pub position: FixedVec2,
        /// Current speed level.
        pub speed_level: u8,
        /// Current heading.
        pub direction: Direction,
        /// Motion phase.
        pub state: MotionState,
        /// Indicates whether the agent is following a route.
        pub is_moving: bool,
        /// Cell the agent was last asked to reach, while it is moving.
        pub target: Option<CellCoord>,
        /// Waypoints still ahead of the agent.
        pub remaining_waypoints: usize,
    }

    fn snapshot(agent: &Agent) -> AgentSnapshot {
        AgentSnapshot {
            id: agent.id,
            client: agent.client,
            size: agent.size,
            area: agent.area(),
            position: agent.position(),
            speed_level: agent.velocity.level(),
            direction: agent.velocity.direction(),
            state: agent.state,
            is_moving: agent.route.is_some(),
            target: agent.route.as_ref().map(|route| route.target),
            remaining_waypoints: agent
                .route
                .as_ref()
                .map_or(0, |route| route.waypoints.len()),
        }
    }
}
