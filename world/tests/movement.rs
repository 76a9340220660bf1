use gridwalk_core::{
    Aabb, AgentId, CellCoord, CellRect, CellRectSize, ClientId, Command, Event, Fixed, FixedVec2,
    SimulationConfig,
};
use gridwalk_navigation::{AsciiMap, WalkabilityGrid};
use gridwalk_system_motion::MotionState;
use gridwalk_world::{self as world, query, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn open_world(width: u32, height: u32) -> World {
    let map = AsciiMap::open(width, height).expect("valid map");
    let grid = WalkabilityGrid::build(&map, 4).expect("grid builds");
    World::new(SimulationConfig::default(), grid).expect("valid world")
}

fn square(column: u32, row: u32, size: u32) -> CellRect {
    CellRect::from_origin_and_size(CellCoord::new(column, row), CellRectSize::new(size, size))
}

fn place(world: &mut World, column: u32, row: u32, size: u32) -> AgentId {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::PlaceAgent {
            client: ClientId::new(1),
            area: square(column, row, size),
        },
        &mut events,
    );
    match events.as_slice() {
        [Event::AgentPlaced { agent, .. }] => *agent,
        other => panic!("placement failed: {other:?}"),
    }
}

fn order(world: &mut World, agent: AgentId, column: u32, row: u32) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::MoveAgent {
            agent,
            target: CellCoord::new(column, row),
        },
        &mut events,
    );
    events
}

fn tick(world: &mut World) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, Command::Tick, &mut events);
    events
}

fn point(x: u32, y: u32) -> FixedVec2 {
    FixedVec2::new(Fixed::from_num(x), Fixed::from_num(y))
}

fn arrived(events: &[Event], id: AgentId) -> Option<CellCoord> {
    events.iter().find_map(|event| match event {
        Event::AgentArrived { agent, cell } if *agent == id => Some(*cell),
        _ => None,
    })
}

fn assert_no_overlap(world: &World) {
    let boxes: Vec<(AgentId, Aabb)> = query::agents(world)
        .into_iter()
        .map(|agent| {
            let side = Fixed::from_num(agent.size);
            let bounds = Aabb::from_min_size(agent.position, side, side).expect("non-empty");
            (agent.id, bounds)
        })
        .collect();
    for (index, (first, first_bounds)) in boxes.iter().enumerate() {
        for (second, second_bounds) in &boxes[index + 1..] {
            assert!(
                !first_bounds.intersects(second_bounds),
                "agents {first:?} and {second:?} overlap at tick {}",
                query::tick(world)
            );
        }
    }
}

fn assert_on_walkable_terrain(world: &World) {
    for agent in query::agents(world) {
        assert!(
            query::grid(world).area_walkable(agent.area),
            "agent {:?} stands on blocked terrain at {:?}",
            agent.id,
            agent.area
        );
    }
}

#[test]
fn diagonal_route_ends_exactly_on_the_target() {
    let mut world = open_world(10, 10);
    let agent = place(&mut world, 0, 0, 1);

    let planned = order(&mut world, agent, 9, 9);
    assert_eq!(
        planned,
        vec![Event::PathPlanned {
            agent,
            steps: 9,
            reaches_target: true,
        }]
    );

    let mut arrival = None;
    for _ in 0..40 {
        let events = tick(&mut world);
        if let Some(cell) = arrived(&events, agent) {
            arrival = Some(cell);
            break;
        }
    }

    assert_eq!(arrival, Some(CellCoord::new(9, 9)));
    let snapshot = query::agent(&world, agent).expect("agent exists");
    assert_eq!(snapshot.position, point(9, 9));
    assert_eq!(snapshot.speed_level, 0);
    assert_eq!(snapshot.state, MotionState::Idle);
    assert!(!snapshot.is_moving);
    assert_eq!(snapshot.area, square(9, 9, 1));
}

#[test]
fn straight_run_accelerates_cruises_and_brakes() {
    let mut world = open_world(10, 1);
    let agent = place(&mut world, 0, 0, 1);
    let _ = order(&mut world, agent, 9, 0);

    let mut levels = Vec::new();
    for _ in 0..13 {
        let events = tick(&mut world);
        assert_eq!(arrived(&events, agent), None);
        let snapshot = query::agent(&world, agent).expect("agent exists");
        levels.push(snapshot.speed_level);
    }
    assert_eq!(levels, vec![1, 2, 3, 4, 4, 4, 4, 4, 4, 3, 2, 1, 0]);

    let events = tick(&mut world);
    assert_eq!(arrived(&events, agent), Some(CellCoord::new(9, 0)));
    assert_eq!(
        query::agent(&world, agent).map(|snapshot| snapshot.position),
        Some(point(9, 0))
    );
}

#[test]
fn stopped_agent_stays_where_it_halted() {
    let mut world = open_world(10, 10);
    let agent = place(&mut world, 0, 0, 1);
    let _ = order(&mut world, agent, 9, 0);
    for _ in 0..3 {
        let _ = tick(&mut world);
    }

    let mut events = Vec::new();
    world::apply(&mut world, Command::StopAgent { agent }, &mut events);
    assert_eq!(events, vec![Event::AgentStopped { agent }]);
    let halted = query::agent(&world, agent).expect("agent exists");
    assert!(!halted.is_moving);
    assert_eq!(halted.speed_level, 0);

    for _ in 0..5 {
        let events = tick(&mut world);
        assert!(events
            .iter()
            .all(|event| !matches!(event, Event::AgentMoved { .. })));
    }
    let after = query::agent(&world, agent).expect("agent exists");
    assert_eq!(after.position, halted.position);
}

#[test]
fn terrain_edit_on_the_route_triggers_a_replan() {
    let mut world = open_world(10, 10);
    let agent = place(&mut world, 0, 5, 1);
    let _ = order(&mut world, agent, 9, 5);
    for _ in 0..2 {
        let _ = tick(&mut world);
    }

    let wall = CellRect::from_origin_and_size(CellCoord::new(5, 0), CellRectSize::new(1, 8));
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::EditTerrain {
            region: wall,
            walkable: false,
        },
        &mut events,
    );
    assert_eq!(
        events.first(),
        Some(&Event::TerrainEdited {
            region: wall,
            walkable: false,
        })
    );
    assert!(events.iter().any(|event| matches!(
        event,
        Event::PathPlanned {
            agent: planned,
            reaches_target: true,
            ..
        } if *planned == agent
    )));

    let mut arrival = None;
    for _ in 0..150 {
        let events = tick(&mut world);
        assert_on_walkable_terrain(&world);
        if let Some(cell) = arrived(&events, agent) {
            arrival = Some(cell);
            break;
        }
    }
    assert_eq!(arrival, Some(CellCoord::new(9, 5)));
}

#[test]
fn unrelated_terrain_edit_keeps_the_route() {
    let mut world = open_world(10, 10);
    let agent = place(&mut world, 0, 0, 1);
    let _ = order(&mut world, agent, 9, 0);

    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::EditTerrain {
            region: square(4, 6, 2),
            walkable: false,
        },
        &mut events,
    );

    assert_eq!(events.len(), 1);
    assert!(query::agent(&world, agent).expect("agent exists").is_moving);
}

#[test]
fn moving_agent_gets_past_a_resting_one() {
    let mut world = open_world(10, 10);
    let resting = place(&mut world, 5, 5, 1);
    let mover = place(&mut world, 0, 5, 1);
    let _ = order(&mut world, mover, 9, 5);

    let mut arrival = None;
    for _ in 0..200 {
        let events = tick(&mut world);
        assert_no_overlap(&world);
        if let Some(cell) = arrived(&events, mover) {
            arrival = Some(cell);
            break;
        }
    }

    assert_eq!(arrival, Some(CellCoord::new(9, 5)));
    let still = query::agent(&world, resting).expect("agent exists");
    assert_eq!(still.position, point(5, 5));
}

#[test]
fn large_agent_keeps_its_clearance_through_a_gap() {
    let map = AsciiMap::parse(
        "
        ..........
        ..........
        ..........
        #####...##
        ..........
        ..........
        ..........
        ",
    )
    .expect("valid map");
    let grid = WalkabilityGrid::build(&map, 4).expect("grid builds");
    let mut world = World::new(SimulationConfig::default(), grid).expect("valid world");
    let agent = place(&mut world, 1, 1, 2);
    let _ = order(&mut world, agent, 1, 5);

    let mut arrival = None;
    for _ in 0..150 {
        let events = tick(&mut world);
        assert_on_walkable_terrain(&world);
        if let Some(cell) = arrived(&events, agent) {
            arrival = Some(cell);
            break;
        }
    }

    assert_eq!(arrival, Some(CellCoord::new(1, 5)));
    assert_eq!(
        query::agent(&world, agent).map(|snapshot| snapshot.area),
        Some(square(1, 5, 2))
    );
}

#[test]
fn two_cell_agent_crosses_a_two_cell_corridor() {
    let map = AsciiMap::parse(
        "
        ##########
        ..........
        ..........
        ##########
        ",
    )
    .expect("valid map");
    let grid = WalkabilityGrid::build(&map, 4).expect("grid builds");
    let mut world = World::new(SimulationConfig::default(), grid).expect("valid world");
    let agent = place(&mut world, 0, 1, 2);
    let planned = order(&mut world, agent, 8, 1);
    assert_eq!(
        planned,
        vec![Event::PathPlanned {
            agent,
            steps: 8,
            reaches_target: true,
        }]
    );

    let mut arrival = None;
    for _ in 0..60 {
        let events = tick(&mut world);
        assert_on_walkable_terrain(&world);
        if let Some(cell) = arrived(&events, agent) {
            arrival = Some(cell);
            break;
        }
    }

    assert_eq!(arrival, Some(CellCoord::new(8, 1)));
    assert_eq!(
        query::agent(&world, agent).map(|snapshot| snapshot.area),
        Some(square(8, 1, 2))
    );
}

#[test]
fn random_crowds_never_overlap_or_leave_walkable_terrain() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_a11e);
    let map = AsciiMap::open(16, 16)
        .expect("valid map")
        .with_blocked([(6, 6), (6, 7), (7, 6), (7, 7), (11, 3), (3, 12)].map(
            |(column, row)| CellCoord::new(column, row),
        ));
    let grid = WalkabilityGrid::build(&map, 4).expect("grid builds");
    let mut world = World::new(SimulationConfig::default(), grid).expect("valid world");

    let mut placed = Vec::new();
    for _ in 0..12 {
        let size = rng.gen_range(1..=2);
        let area = square(rng.gen_range(0..15), rng.gen_range(0..15), size);
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::PlaceAgent {
                client: ClientId::new(0),
                area,
            },
            &mut events,
        );
        if let [Event::AgentPlaced { agent, .. }] = events.as_slice() {
            placed.push(*agent);
        }
    }
    assert!(!placed.is_empty());

    for agent in &placed {
        let _ = order(
            &mut world,
            *agent,
            rng.gen_range(0..16),
            rng.gen_range(0..16),
        );
    }

    for _ in 0..120 {
        let _ = tick(&mut world);
        assert_no_overlap(&world);
        assert_on_walkable_terrain(&world);
        for agent in query::agents(&world) {
            let found = query::agents_at(&world, agent.position);
            assert!(found.contains(&agent.id), "index lost agent {:?}", agent.id);
        }
    }
}
