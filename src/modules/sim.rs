use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::modules::allocator::{OperationMode, TaskAllocator};
use crate::modules::config::SimConfig;
use crate::modules::error::SimError;
use crate::modules::robot::Robot;
use crate::modules::stats::Observer;
use crate::modules::view::{RobotSnapshot, WorldSnapshot};
use crate::modules::world::World;

/// Everything the simulation lock guards.
#[derive(Debug)]
pub struct Warehouse {
    world: World,
    allocator: TaskAllocator,
    observer: Observer,
    robots: Vec<Robot>,
    tick: u64,
}

impl Warehouse {
    /// Floor and stores first, then the allocator (its target is the initial rack stock),
    /// then the robots on whatever floor is left.
    pub fn build(config: &SimConfig) -> Result<Self, SimError> {
        let mut world = World::from_config(config)?;
        let allocator = TaskAllocator::new(config.mode, world.racks.n_items());
        let strategy = config.strategy.build();
        let mut robots = Vec::with_capacity(config.robots);
        for id in 0..config.robots {
            let robot = Robot::spawn(
                id,
                format!("robot-{id}"),
                Arc::clone(&strategy),
                config.plan_horizon,
                &mut world,
            )?;
            robots.push(robot);
        }
        info!(
            robots = robots.len(),
            strategy = %config.strategy,
            mode = %config.mode,
            target_stock = allocator.target_stock(),
            "warehouse ready"
        );
        Ok(Self::from_parts(world, allocator, robots))
    }

    pub fn from_parts(world: World, allocator: TaskAllocator, robots: Vec<Robot>) -> Self {
        let observer = Observer::new(robots.len());
        Self {
            world,
            allocator,
            observer,
            robots,
            tick: 0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn allocator(&self) -> &TaskAllocator {
        &self.allocator
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn robots(&self) -> &[Robot] {
        &self.robots
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn set_mode(&mut self, mode: OperationMode) {
        self.allocator.set_mode(mode);
    }

    /// Run one step for the robot at `index`.
    pub fn act(&mut self, index: usize) -> Result<(), SimError> {
        let Self {
            world,
            allocator,
            observer,
            robots,
            ..
        } = self;
        let robot = robots.get_mut(index).ok_or_else(|| {
            SimError::Configuration(format!("no robot at index {}", index))
        })?;
        robot.act(world, allocator, observer)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let grid = &self.world.grid;
        WorldSnapshot {
            tick: self.tick,
            generated_at: Utc::now(),
            width: grid.width(),
            height: grid.height(),
            grid_codes: grid.codes(),
            rack_stock: self.world.racks.n_items(),
            bay_stock: self.world.bays.n_items(),
            target_stock: self.allocator.target_stock(),
            free_rack_cells: self.world.racks.capacity_free(),
            mode: self.allocator.mode(),
            tasks_dispatched: self.observer.n_tasks,
            n_blocked: self.observer.n_blocked,
            blocked_pct: self.observer.blocked_percentage(),
            robots: self
                .robots
                .iter()
                .map(|robot| RobotSnapshot {
                    id: robot.id(),
                    name: robot.name().to_string(),
                    position: robot.position(),
                    state: robot.state(),
                    task: robot.task(),
                    action: robot.current_action().map(|a| a.label().to_string()),
                    load: robot.load().cloned(),
                })
                .collect(),
        }
    }
}

fn lock(shared: &Mutex<Warehouse>) -> Result<MutexGuard<'_, Warehouse>, SimError> {
    shared.lock().map_err(|_| SimError::LockPoisoned)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub acted: usize,
    /// Robots not reached before the deadline.
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Read/control access for code outside the tick loop.
#[derive(Debug, Clone)]
pub struct SimHandle {
    shared: Arc<Mutex<Warehouse>>,
}

impl SimHandle {
    pub fn snapshot(&self) -> Result<WorldSnapshot, SimError> {
        Ok(lock(&self.shared)?.snapshot())
    }

    pub fn set_mode(&self, mode: OperationMode) -> Result<(), SimError> {
        lock(&self.shared)?.set_mode(mode);
        Ok(())
    }

    pub fn mode(&self) -> Result<OperationMode, SimError> {
        Ok(lock(&self.shared)?.allocator().mode())
    }
}

/// Fixed-rate clock driving every robot once per tick in a fresh random order.
#[derive(Debug)]
pub struct Simulation {
    shared: Arc<Mutex<Warehouse>>,
    order_rng: StdRng,
    period: Duration,
}

impl Simulation {
    pub fn new(warehouse: Warehouse, seed: Option<u64>, period: Duration) -> Self {
        let order_rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        Self {
            shared: Arc::new(Mutex::new(warehouse)),
            order_rng,
            period,
        }
    }

    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        let warehouse = Warehouse::build(config)?;
        Ok(Self::new(
            warehouse,
            config.seed,
            Duration::from_millis(config.tick_ms),
        ))
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// One tick with a full period of budget.
    pub fn step(&mut self) -> Result<TickReport, SimError> {
        self.step_until(Instant::now() + self.period)
    }

    /// One tick; robots not reached by `deadline` sit this tick out.
    ///
    /// The lock is taken per robot so readers can get in between turns.
    pub fn step_until(&mut self, deadline: Instant) -> Result<TickReport, SimError> {
        let started = Instant::now();
        let (tick, n_robots) = {
            let mut warehouse = lock(&self.shared)?;
            warehouse.tick += 1;
            (warehouse.tick, warehouse.robots.len())
        };

        let mut order: Vec<usize> = (0..n_robots).collect();
        order.shuffle(&mut self.order_rng);

        let mut acted = 0;
        for index in order {
            if Instant::now() >= deadline {
                break;
            }
            lock(&self.shared)?.act(index)?;
            acted += 1;
        }

        let skipped = n_robots - acted;
        if skipped > 0 {
            debug!(tick, skipped, "tick deadline passed");
        }
        Ok(TickReport {
            tick,
            acted,
            skipped,
            elapsed: started.elapsed(),
        })
    }

    /// Tick until `stop` is raised or `ticks` have run, sleeping out the rest of each period.
    ///
    /// Returns the number of ticks run. Any robot error ends the run.
    pub fn run<F>(
        &mut self,
        ticks: Option<u64>,
        stop: &AtomicBool,
        mut on_tick: F,
    ) -> Result<u64, SimError>
    where
        F: FnMut(&TickReport, &SimHandle) -> Result<(), SimError>,
    {
        let handle = self.handle();
        let mut ran = 0;
        while !stop.load(Ordering::Relaxed) {
            if ticks.is_some_and(|limit| ran >= limit) {
                break;
            }
            let deadline = Instant::now() + self.period;
            let report = self.step_until(deadline)?;
            ran += 1;
            on_tick(&report, &handle)?;
            if let Some(rest) = deadline.checked_duration_since(Instant::now()) {
                thread::sleep(rest);
            }
        }
        info!(ticks = ran, "simulation stopped");
        Ok(ran)
    }
}
