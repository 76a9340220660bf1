//! TOML scenario files describing a map, its agents and their orders.

use anyhow::{Context, Result};
use gridwalk_core::{
    AgentId, CellCoord, CellRect, CellRectSize, ClientId, Command, Event, SimulationConfig,
};
use gridwalk_navigation::{spawn_build, AsciiMap};
use gridwalk_world::{self as world, query, World};
use serde::Deserialize;
use tracing::{info, warn};

/// Headless simulation run loaded from a scenario file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    /// Overrides of the default simulation parameters.
    #[serde(default)]
    pub(crate) config: SimulationConfig,
    /// ASCII rows, `.` walkable and `#` blocked.
    pub(crate) map: String,
    /// Agents placed before the first tick, receiving ids in listed order.
    #[serde(default)]
    pub(crate) agents: Vec<AgentSpec>,
    /// Move orders issued at the start of the given tick.
    #[serde(default)]
    pub(crate) orders: Vec<OrderSpec>,
    /// Terrain edits applied at the start of the given tick.
    #[serde(default)]
    pub(crate) edits: Vec<EditSpec>,
    /// Number of ticks to simulate.
    pub(crate) ticks: u64,
}

/// Agent placement; `column` and `row` name the footprint's top-left cell.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct AgentSpec {
    #[serde(default)]
    pub(crate) client: u32,
    pub(crate) column: u32,
    pub(crate) row: u32,
    #[serde(default = "unit_size")]
    pub(crate) size: u32,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct OrderSpec {
    pub(crate) tick: u64,
    pub(crate) agent: u32,
    pub(crate) column: u32,
    pub(crate) row: u32,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EditSpec {
    pub(crate) tick: u64,
    pub(crate) column: u32,
    pub(crate) row: u32,
    #[serde(default = "unit_size")]
    pub(crate) width: u32,
    #[serde(default = "unit_size")]
    pub(crate) height: u32,
    pub(crate) walkable: bool,
}

fn unit_size() -> u32 {
    1
}

/// Final state of a finished run.
#[derive(Clone, Debug)]
pub(crate) struct Report {
    pub(crate) ticks: u64,
    pub(crate) agents: Vec<query::AgentSnapshot>,
    pub(crate) events: Vec<Event>,
    pub(crate) digest: [u8; 32],
}

impl Report {
    /// Lowercase hexadecimal rendering of the state digest.
    pub(crate) fn digest_hex(&self) -> String {
        self.digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl Scenario {
    /// Parses a scenario from TOML text.
    pub(crate) fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("failed to parse scenario toml")
    }

    /// Builds the world and plays every tick of the scenario.
    pub(crate) fn run(&self) -> Result<Report> {
        let map = AsciiMap::parse(&self.map).context("failed to parse scenario map")?;
        let grid = spawn_build(map, self.config.sector_size)
            .context("failed to start grid construction")?
            .wait()
            .context("failed to build walkability grid")?;
        info!(
            width = grid.width(),
            height = grid.height(),
            sectors = grid.sectors().len(),
            "walkability grid ready"
        );
        let mut world =
            World::new(self.config.clone(), grid).context("invalid simulation configuration")?;
        let mut events = Vec::new();

        for placement in &self.agents {
            let area = CellRect::from_origin_and_size(
                CellCoord::new(placement.column, placement.row),
                CellRectSize::new(placement.size, placement.size),
            );
            world::apply(
                &mut world,
                Command::PlaceAgent {
                    client: ClientId::new(placement.client),
                    area,
                },
                &mut events,
            );
        }

        for order in self.orders.iter().filter(|order| order.tick >= self.ticks) {
            warn!(tick = order.tick, agent = order.agent, "order scheduled after the last tick");
        }

        for tick in 0..self.ticks {
            for edit in self.edits.iter().filter(|edit| edit.tick == tick) {
                let region = CellRect::from_origin_and_size(
                    CellCoord::new(edit.column, edit.row),
                    CellRectSize::new(edit.width, edit.height),
                );
                world::apply(
                    &mut world,
                    Command::EditTerrain {
                        region,
                        walkable: edit.walkable,
                    },
                    &mut events,
                );
            }
            for order in self.orders.iter().filter(|order| order.tick == tick) {
                world::apply(
                    &mut world,
                    Command::MoveAgent {
                        agent: AgentId::new(order.agent),
                        target: CellCoord::new(order.column, order.row),
                    },
                    &mut events,
                );
            }
            world::apply(&mut world, Command::Tick, &mut events);
        }

        Ok(Report {
            ticks: query::tick(&world),
            agents: query::agents(&world),
            events,
            digest: query::state_digest(&world),
        })
    }
}
