use std::io;

use thiserror::Error;

use crate::modules::config::ConfigError;
use crate::modules::grid::{GridError, Position};
use crate::modules::inventory::InventoryError;

/// Errors that stop a robot's turn. Everything here is fatal for the simulation; recoverable
/// outcomes (no path, no stock, full racks) are reported as values instead.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{robot} has no storage cell within reach of {position}")]
    Unreachable { robot: String, position: Position },

    #[error("inventory bookkeeping out of sync: {0}")]
    Desync(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("snapshot i/o failed: {0}")]
    Snapshot(#[from] io::Error),

    #[error("warehouse lock poisoned")]
    LockPoisoned,
}
