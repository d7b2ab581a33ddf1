pub mod modules;

pub use modules::allocator::{
    Allocation, AllocationFailure, Operation, OperationMode, TaskAllocator,
};
pub use modules::config::{ConfigError, LayoutConfig, MIN_RACK_SPACING, SimConfig, load_config};
pub use modules::error::SimError;
pub use modules::grid::{CellCode, GridError, Position, SCAN_ORDER, Step, WorldGrid};
pub use modules::inventory::{CellId, InventoryError, InventoryStore, ProductId};
pub use modules::planner::{
    AStarStrategy, MoveStrategy, RandomStrategy, StrategyKind, calculate_path,
};
pub use modules::robot::{Action, Robot, RobotId, RobotState, TaskKind};
pub use modules::sim::{SimHandle, Simulation, TickReport, Warehouse};
pub use modules::stats::Observer;
pub use modules::view::{
    RobotSnapshot, WorldSnapshot, load_world_snapshot, render_ascii, render_summary,
    save_world_snapshot, save_world_snapshot_tick, snapshot_dir,
};
pub use modules::world::{StoreKind, World};
