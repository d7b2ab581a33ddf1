use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use gridstock::{
    CellCode, LayoutConfig, OperationMode, Position, SimConfig, Simulation, StrategyKind,
    render_ascii,
};

fn small_floor(robots: usize, mode: OperationMode) -> SimConfig {
    SimConfig {
        seed: Some(2024),
        width: 19,
        height: 14,
        robots,
        mode,
        tick_ms: 1,
        layout: LayoutConfig {
            rack_fill: 0.4,
            bay_stock: 3,
            ..LayoutConfig::default()
        },
        ..SimConfig::default()
    }
}

fn total_stock(sim: &Simulation) -> usize {
    let snapshot = sim.handle().snapshot().unwrap();
    snapshot.rack_stock
        + snapshot.bay_stock
        + snapshot.robots.iter().filter(|r| r.load.is_some()).count()
}

#[test]
fn store_mode_moves_stock_from_bays_to_racks() {
    let mut sim = Simulation::from_config(&small_floor(4, OperationMode::Store)).unwrap();
    let before = sim.handle().snapshot().unwrap();
    let total = total_stock(&sim);

    for _ in 0..400 {
        sim.step_until(Instant::now() + Duration::from_secs(60)).unwrap();
    }

    let after = sim.handle().snapshot().unwrap();
    assert_eq!(total_stock(&sim), total);
    assert!(after.rack_stock > before.rack_stock);
    assert!(after.bay_stock < before.bay_stock);
    assert_eq!(after.tick, 400);
}

#[test]
fn pick_mode_drains_the_racks_into_bays() {
    let mut sim = Simulation::from_config(&small_floor(4, OperationMode::Pick)).unwrap();
    let before = sim.handle().snapshot().unwrap();
    assert!(before.rack_stock > 0);

    for _ in 0..400 {
        sim.step_until(Instant::now() + Duration::from_secs(60)).unwrap();
    }

    let after = sim.handle().snapshot().unwrap();
    assert!(after.rack_stock < before.rack_stock);
    assert!(after.bay_stock > before.bay_stock);
}

#[test]
fn grid_and_snapshot_agree() {
    let mut sim = Simulation::from_config(&small_floor(5, OperationMode::Both)).unwrap();
    let stop = AtomicBool::new(false);
    sim.run(Some(50), &stop, |_, _| Ok(())).unwrap();

    let snapshot = sim.handle().snapshot().unwrap();
    assert_eq!(snapshot.grid_codes.len(), 19 * 14);
    let map = render_ascii(&snapshot);
    assert_eq!(map.lines().count(), 14);
    assert!(map.lines().all(|line| line.chars().count() == 19));

    let robot_cells = snapshot
        .grid_codes
        .iter()
        .filter(|c| **c == CellCode::Robot.code() || **c == CellCode::Confused.code())
        .count();
    assert_eq!(robot_cells, 5);
    for robot in &snapshot.robots {
        let idx = (robot.position.y * 19 + robot.position.x) as usize;
        let code = CellCode::from_code(snapshot.grid_codes[idx]).unwrap();
        assert!(matches!(code, CellCode::Robot | CellCode::Confused));
    }
}

#[test]
fn random_walkers_never_overlap() {
    let mut config = small_floor(8, OperationMode::Both);
    config.strategy = StrategyKind::Random;
    config.plan_horizon = 3;
    let mut sim = Simulation::from_config(&config).unwrap();

    for _ in 0..100 {
        sim.step_until(Instant::now() + Duration::from_secs(60)).unwrap();
        let snapshot = sim.handle().snapshot().unwrap();
        let mut seen: Vec<Position> = snapshot.robots.iter().map(|r| r.position).collect();
        seen.sort_by_key(|p| (p.x, p.y));
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }
}
