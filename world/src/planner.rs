//! Two-level path planning over the sector graph and the cell grid.

use gridwalk_core::{CellCoord, CellRect};
use gridwalk_navigation::{Corridor, WalkabilityGrid};
use gridwalk_system_pathfinding::AStar;
use tracing::{debug, trace, warn};

/// Anchor cells from the source to the last reachable cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Plan {
    pub(crate) cells: Vec<CellCoord>,
    pub(crate) reaches_target: bool,
}

impl Plan {
    pub(crate) fn steps(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }
}

/// Plans a route for an object of `size` from `source` to `target`.
///
/// The sector graph is searched first; when it connects both ends the cell
/// search is confined to the sectors on that route. If the confined search
/// misses the target the cell search is repeated over the whole grid, whose
/// result is final, partial or not.
pub(crate) fn plan(
    grid: &WalkabilityGrid,
    source: CellCoord,
    target: CellCoord,
    size: u32,
) -> Plan {
    if let Some(corridor) = sector_corridor(grid, source, target, size) {
        let mut search = AStar::new();
        let confined = search.run(
            grid.corridor_node(source, &corridor),
            grid.corridor_node(target, &corridor),
            size,
        );
        if confined.reached_target {
            debug!(
                ?source,
                ?target,
                sectors = corridor.len(),
                steps = confined.steps(),
                "planned route inside sector corridor"
            );
            return Plan {
                cells: confined.path.iter().map(|node| node.cell()).collect(),
                reaches_target: true,
            };
        }
    }

    let mut search = AStar::new();
    let result = search.run(grid.node(source), grid.node(target), size);
    let plan = Plan {
        cells: result.path.iter().map(|node| node.cell()).collect(),
        reaches_target: result.reached_target,
    };
    if plan.reaches_target {
        debug!(?source, ?target, steps = plan.steps(), "planned route over full grid");
    } else {
        warn!(
            ?source,
            ?target,
            terminal = ?plan.cells.last(),
            "target unreachable, using nearest approach"
        );
    }
    plan
}

/// Plans like [`plan`] while treating the `avoid` regions as blocked.
pub(crate) fn plan_around(
    grid: &WalkabilityGrid,
    avoid: &[CellRect],
    source: CellCoord,
    target: CellCoord,
    size: u32,
) -> Plan {
    if avoid.is_empty() {
        return plan(grid, source, target, size);
    }
    let inside: Vec<CellRect> = avoid
        .iter()
        .copied()
        .filter(|region| {
            let contained = grid.contains_rect(*region);
            if !contained {
                trace!(?region, "skipping region outside the grid");
            }
            contained
        })
        .collect();
    let mut detour = grid.clone();
    if let Err(error) = detour.set_walkable_many(&inside, false) {
        warn!(%error, "failed to block avoided regions, planning without them");
        return plan(grid, source, target, size);
    }
    plan(&detour, source, target, size)
}

fn sector_corridor(
    grid: &WalkabilityGrid,
    source: CellCoord,
    target: CellCoord,
    size: u32,
) -> Option<Corridor> {
    let from = grid.sector_of(source)?;
    let to = grid.sector_of(target)?;
    let mut search = AStar::new();
    let coarse = search.run(grid.sector_node(from), grid.sector_node(to), size);
    if !coarse.reached_target {
        return None;
    }
    Some(Corridor::new(
        grid,
        coarse.path.iter().map(|node| node.id()),
    ))
}
