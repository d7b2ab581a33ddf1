use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::modules::error::SimError;
use crate::modules::grid::{GridError, Position};
use crate::modules::inventory::{CellId, InventoryError, ProductId};
use crate::modules::robot::{Robot, RobotId, TaskKind};
use crate::modules::stats::Observer;
use crate::modules::world::{StoreKind, World};

/// Which transfers idle robots are sent on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Store while rack stock is below target, pick otherwise.
    #[default]
    Both,
    Pick,
    Store,
}

impl OperationMode {
    pub const fn label(self) -> &'static str {
        match self {
            OperationMode::Both => "both",
            OperationMode::Pick => "pick",
            OperationMode::Store => "store",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Bay to rack.
    Store,
    /// Rack to bay.
    Pick,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Store => write!(f, "store"),
            Operation::Pick => write!(f, "pick"),
        }
    }
}

/// Why an idle robot got no transfer this time. Never fatal.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AllocationFailure {
    #[error("no unreserved stock in {store}")]
    NoStock { store: String },
    #[error("{store} has no cells to deliver to")]
    NoCells { store: String },
    #[error(transparent)]
    Full(InventoryError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Allocation {
    Dispatched {
        operation: Operation,
        product: ProductId,
        origin: Position,
        destination: Position,
    },
    Repositioned {
        destination: Position,
        reason: AllocationFailure,
    },
    Parked(AllocationFailure),
}

#[derive(Debug, Clone)]
pub struct TaskAllocator {
    mode: OperationMode,
    target_stock: usize,
    idle_pool: Vec<RobotId>,
}

impl TaskAllocator {
    pub fn new(mode: OperationMode, target_stock: usize) -> Self {
        Self {
            mode,
            target_stock,
            idle_pool: Vec::new(),
        }
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: OperationMode) {
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, "operating mode changed");
        }
        self.mode = mode;
    }

    pub fn target_stock(&self) -> usize {
        self.target_stock
    }

    pub fn idle_pool(&self) -> &[RobotId] {
        &self.idle_pool
    }

    pub fn choose_operation(&self, rack_stock: usize) -> Operation {
        match self.mode {
            OperationMode::Pick => Operation::Pick,
            OperationMode::Store => Operation::Store,
            OperationMode::Both if rack_stock < self.target_stock => Operation::Store,
            OperationMode::Both => Operation::Pick,
        }
    }

    /// Handle an idle report: dispatch a transfer, or fall back to repositioning or parking.
    pub fn process_idle(
        &mut self,
        robot: &mut Robot,
        world: &mut World,
        observer: &mut Observer,
    ) -> Result<Allocation, SimError> {
        let operation = self.choose_operation(world.racks.n_items());
        let outcome = match operation {
            Operation::Store => Self::dispatch_store(world)?,
            Operation::Pick => Self::dispatch_pick(world)?,
        };

        match outcome {
            Ok((product, origin, destination)) => {
                robot.assign_task(
                    TaskKind::Transfer,
                    Some(origin),
                    Some(destination),
                    Some(product.clone()),
                )?;
                observer.count_task(operation);
                self.release(robot.id());
                Ok(Allocation::Dispatched {
                    operation,
                    product,
                    origin,
                    destination,
                })
            }
            Err(reason) => self.fallback(robot, world, reason),
        }
    }

    /// Reserve a bay product and an empty rack cell for it.
    fn dispatch_store(
        world: &mut World,
    ) -> Result<Result<(ProductId, Position, Position), AllocationFailure>, SimError> {
        let Some(product) = world.bays.pick_random_available_product(&mut world.rng) else {
            return Ok(Err(AllocationFailure::NoStock {
                store: world.bays.name().to_string(),
            }));
        };
        let bay_cell = world.bays.cell_of(&product).ok_or_else(|| {
            SimError::Desync(format!("sampled product {} has no bay cell", product))
        })?;
        world.bays.lock_cell(bay_cell, Some(&product))?;

        let rack_cell = match world.racks.request_optimal_cell() {
            Ok(cell_id) => cell_id,
            Err(full) => {
                world.bays.unlock_cell(bay_cell, Some(&product))?;
                return Ok(Err(AllocationFailure::Full(full)));
            }
        };
        world.racks.lock_cell(rack_cell, None)?;

        let origin = cell_position(world, StoreKind::Bays, bay_cell)?;
        let destination = cell_position(world, StoreKind::Racks, rack_cell)?;
        Ok(Ok((product, origin, destination)))
    }

    /// Reserve a rack product and send it to a random bay.
    fn dispatch_pick(
        world: &mut World,
    ) -> Result<Result<(ProductId, Position, Position), AllocationFailure>, SimError> {
        let Some(product) = world.racks.pick_random_available_product(&mut world.rng) else {
            return Ok(Err(AllocationFailure::NoStock {
                store: world.racks.name().to_string(),
            }));
        };
        let rack_cell = world.racks.cell_of(&product).ok_or_else(|| {
            SimError::Desync(format!("sampled product {} has no rack cell", product))
        })?;
        world.racks.lock_cell(rack_cell, Some(&product))?;

        let Some(bay_cell) = world.bays.random_cell(&mut world.rng) else {
            world.racks.unlock_cell(rack_cell, Some(&product))?;
            return Ok(Err(AllocationFailure::NoCells {
                store: world.bays.name().to_string(),
            }));
        };

        let origin = cell_position(world, StoreKind::Racks, rack_cell)?;
        let destination = cell_position(world, StoreKind::Bays, bay_cell)?;
        Ok(Ok((product, origin, destination)))
    }

    /// Robots next to storage are moved out of the way; everyone else waits in the idle pool.
    fn fallback(
        &mut self,
        robot: &mut Robot,
        world: &mut World,
        reason: AllocationFailure,
    ) -> Result<Allocation, SimError> {
        if world.scan_adjacent(robot.position()).is_some() {
            match world.random_empty_position() {
                Ok(destination) => {
                    robot.assign_task(TaskKind::Reposition, None, Some(destination), None)?;
                    self.release(robot.id());
                    return Ok(Allocation::Repositioned {
                        destination,
                        reason,
                    });
                }
                Err(GridError::NoSpace) => {
                    debug!(robot = %robot.name(), "no free cell to reposition to");
                }
                Err(err) => return Err(err.into()),
            }
        }

        if !self.idle_pool.contains(&robot.id()) {
            debug!(robot = %robot.name(), %reason, "parked");
            self.idle_pool.push(robot.id());
        }
        Ok(Allocation::Parked(reason))
    }

    fn release(&mut self, id: RobotId) {
        self.idle_pool.retain(|parked| *parked != id);
    }
}

fn cell_position(world: &World, kind: StoreKind, cell_id: CellId) -> Result<Position, SimError> {
    let store = world.store(kind);
    store.coords(cell_id).ok_or_else(|| {
        SimError::Desync(format!("{} cell {} has no coordinates", store.name(), cell_id))
    })
}
