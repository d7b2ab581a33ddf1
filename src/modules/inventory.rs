use std::collections::{HashMap, HashSet};
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::modules::grid::{CellCode, Position, WorldGrid};

/// Opaque product code; unique across every store in a warehouse.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

pub type CellId = usize;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("cell {cell_id} is out of range for {store} ({len} cells)")]
    CellOutOfRange {
        store: String,
        cell_id: CellId,
        len: usize,
    },
    #[error("cell {cell_id} of {store} is already taken")]
    CellOccupied { store: String, cell_id: CellId },
    #[error("product {product} is already present in {store}")]
    DuplicateProduct { store: String, product: ProductId },
    #[error("product {product} is not in cell {cell_id} of {store}")]
    ProductMissing {
        store: String,
        cell_id: CellId,
        product: ProductId,
    },
    #[error("cell {cell_id} of {store} disagrees with the grid (found {found:?})")]
    GridDesync {
        store: String,
        cell_id: CellId,
        found: Option<CellCode>,
    },
    #[error("{store} has no free, unlocked cell")]
    Full { store: String },
}

/// A set of storage cells on the grid (racks or loading bays) and what they hold.
///
/// Cell ids are creation order. Locks are reservations taken by the allocator for a task in
/// flight; placing into or removing from a cell releases its lock.
#[derive(Clone, Debug)]
pub struct InventoryStore {
    name: String,
    deep: bool,
    empty_code: CellCode,
    n_items: usize,
    coords: Vec<Position>,
    positions: HashMap<Position, CellId>,
    inventory: Vec<Vec<ProductId>>,
    records: HashMap<ProductId, CellId>,
    locked_cells: Vec<bool>,
    locked_products: HashSet<ProductId>,
}

impl InventoryStore {
    /// `empty_code` is what the grid shows for an empty cell of this store.
    pub fn new(name: impl Into<String>, deep: bool, empty_code: CellCode) -> Self {
        Self {
            name: name.into(),
            deep,
            empty_code,
            n_items: 0,
            coords: Vec::new(),
            positions: HashMap::new(),
            inventory: Vec::new(),
            records: HashMap::new(),
            locked_cells: Vec::new(),
            locked_products: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_deep(&self) -> bool {
        self.deep
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn coords(&self, cell_id: CellId) -> Option<Position> {
        self.coords.get(cell_id).copied()
    }

    pub fn cell_at(&self, pos: Position) -> Option<CellId> {
        self.positions.get(&pos).copied()
    }

    pub fn inventory(&self, cell_id: CellId) -> Option<&[ProductId]> {
        self.inventory.get(cell_id).map(Vec::as_slice)
    }

    pub fn cell_of(&self, product: &ProductId) -> Option<CellId> {
        self.records.get(product).copied()
    }

    pub fn contains(&self, product: &ProductId) -> bool {
        self.records.contains_key(product)
    }

    pub fn is_locked(&self, cell_id: CellId) -> bool {
        self.locked_cells.get(cell_id).copied().unwrap_or(false)
    }

    pub fn is_product_locked(&self, product: &ProductId) -> bool {
        self.locked_products.contains(product)
    }

    /// Cells that are neither stocked nor reserved.
    pub fn capacity_free(&self) -> usize {
        self.inventory
            .iter()
            .zip(&self.locked_cells)
            .filter(|(items, locked)| items.is_empty() && !**locked)
            .count()
    }

    /// Register a storage cell at `pos`. Occupied grid cells are logged and skipped.
    pub fn add_cell(&mut self, grid: &mut WorldGrid, pos: Position) -> Option<CellId> {
        if !grid.is_free(pos) {
            error!(store = %self.name, %pos, "cannot create a storage cell: position is occupied");
            return None;
        }
        // is_free implies in bounds
        grid.set_cell(pos, self.empty_code).ok()?;
        let cell_id = self.coords.len();
        self.coords.push(pos);
        self.positions.insert(pos, cell_id);
        self.inventory.push(Vec::new());
        self.locked_cells.push(false);
        debug!(store = %self.name, cell_id, %pos, "storage cell created");
        Some(cell_id)
    }

    fn check_range(&self, cell_id: CellId) -> Result<(), InventoryError> {
        if cell_id >= self.coords.len() {
            return Err(InventoryError::CellOutOfRange {
                store: self.name.clone(),
                cell_id,
                len: self.coords.len(),
            });
        }
        Ok(())
    }

    pub fn place_at(
        &mut self,
        grid: &mut WorldGrid,
        cell_id: CellId,
        product: ProductId,
    ) -> Result<(), InventoryError> {
        self.check_range(cell_id)?;
        if !self.deep && !self.inventory[cell_id].is_empty() {
            return Err(InventoryError::CellOccupied {
                store: self.name.clone(),
                cell_id,
            });
        }
        if self.records.contains_key(&product) {
            return Err(InventoryError::DuplicateProduct {
                store: self.name.clone(),
                product,
            });
        }
        let pos = self.coords[cell_id];
        let found = grid.get(pos);
        if !self.deep && found != Some(self.empty_code) {
            return Err(InventoryError::GridDesync {
                store: self.name.clone(),
                cell_id,
                found,
            });
        }

        info!(store = %self.name, cell_id, %product, "product placed");
        grid.set_cell(pos, CellCode::Item)
            .map_err(|_| InventoryError::GridDesync {
                store: self.name.clone(),
                cell_id,
                found,
            })?;
        self.locked_products.remove(&product);
        self.records.insert(product.clone(), cell_id);
        self.inventory[cell_id].push(product);
        self.n_items += 1;
        self.locked_cells[cell_id] = false;
        Ok(())
    }

    pub fn remove_product(
        &mut self,
        grid: &mut WorldGrid,
        cell_id: CellId,
        product: &ProductId,
    ) -> Result<(), InventoryError> {
        self.check_range(cell_id)?;
        let Some(slot) = self.inventory[cell_id].iter().position(|p| p == product) else {
            return Err(InventoryError::ProductMissing {
                store: self.name.clone(),
                cell_id,
                product: product.clone(),
            });
        };
        let pos = self.coords[cell_id];
        let found = grid.get(pos);
        if found != Some(CellCode::Item) {
            return Err(InventoryError::GridDesync {
                store: self.name.clone(),
                cell_id,
                found,
            });
        }

        info!(store = %self.name, cell_id, %product, "product removed");
        self.inventory[cell_id].remove(slot);
        self.n_items -= 1;
        self.records.remove(product);
        self.locked_products.remove(product);
        if self.inventory[cell_id].is_empty() {
            grid.set_cell(pos, self.empty_code)
                .map_err(|_| InventoryError::GridDesync {
                    store: self.name.clone(),
                    cell_id,
                    found,
                })?;
        }
        self.locked_cells[cell_id] = false;
        Ok(())
    }

    /// First cell, by creation order, that is empty and not reserved.
    pub fn request_optimal_cell(&self) -> Result<CellId, InventoryError> {
        self.inventory
            .iter()
            .zip(&self.locked_cells)
            .position(|(items, locked)| items.is_empty() && !*locked)
            .ok_or_else(|| InventoryError::Full {
                store: self.name.clone(),
            })
    }

    pub fn pick_random_available_product<R: Rng>(&self, rng: &mut R) -> Option<ProductId> {
        // Iterate cells rather than the hash index so a seeded rng gives a stable pick.
        let available: Vec<&ProductId> = self
            .inventory
            .iter()
            .flatten()
            .filter(|p| !self.locked_products.contains(*p))
            .collect();
        if available.is_empty() {
            warn!(store = %self.name, "no unreserved stock to hand out");
            return None;
        }
        Some(available[rng.gen_range(0..available.len())].clone())
    }

    pub fn random_cell<R: Rng>(&self, rng: &mut R) -> Option<CellId> {
        if self.coords.is_empty() {
            return None;
        }
        Some(rng.gen_range(0..self.coords.len()))
    }

    pub fn lock_cell(
        &mut self,
        cell_id: CellId,
        product: Option<&ProductId>,
    ) -> Result<(), InventoryError> {
        self.check_range(cell_id)?;
        self.locked_cells[cell_id] = true;
        if let Some(product) = product {
            self.locked_products.insert(product.clone());
        }
        Ok(())
    }

    pub fn unlock_cell(
        &mut self,
        cell_id: CellId,
        product: Option<&ProductId>,
    ) -> Result<(), InventoryError> {
        self.check_range(cell_id)?;
        self.locked_cells[cell_id] = false;
        if let Some(product) = product {
            self.locked_products.remove(product);
        }
        Ok(())
    }

    pub fn products(&self) -> impl Iterator<Item = (&ProductId, CellId)> {
        self.records.iter().map(|(p, id)| (p, *id))
    }
}
