use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::modules::config::SimConfig;
use crate::modules::error::SimError;
use crate::modules::grid::{CellCode, GridError, Position, SCAN_ORDER, WorldGrid};
use crate::modules::inventory::{CellId, InventoryError, InventoryStore, ProductId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Racks,
    Bays,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Racks => write!(f, "racks"),
            StoreKind::Bays => write!(f, "bays"),
        }
    }
}

/// The warehouse floor: occupancy grid, both storage areas, and the rng every random choice
/// in the simulation draws from.
#[derive(Debug)]
pub struct World {
    pub grid: WorldGrid,
    pub racks: InventoryStore,
    pub bays: InventoryStore,
    pub rng: StdRng,
}

impl World {
    pub fn new(grid: WorldGrid, rng: StdRng, deep_racks: bool) -> Self {
        Self {
            grid,
            racks: InventoryStore::new("racks", deep_racks, CellCode::Shelf),
            bays: InventoryStore::new("bays", true, CellCode::Operation),
            rng,
        }
    }

    /// Grid plus stocked racks and bays, laid out from `config`.
    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let layout = &config.layout;
        let grid = WorldGrid::new(config.width, config.height)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut world = World::new(grid, rng, layout.deep_racks);

        let (bay_cells, rack_cells) = layout.storage_cells(config.width, config.height);
        for pos in bay_cells {
            let Some(cell_id) = world.bays.add_cell(&mut world.grid, pos) else {
                continue;
            };
            for _ in 0..layout.bay_stock {
                let product = world.new_product_code();
                world.place_at(StoreKind::Bays, cell_id, product)?;
            }
        }

        for pos in rack_cells {
            let Some(cell_id) = world.racks.add_cell(&mut world.grid, pos) else {
                continue;
            };
            if world.rng.gen_bool(layout.rack_fill) {
                let product = world.new_product_code();
                world.place_at(StoreKind::Racks, cell_id, product)?;
            }
        }

        info!(
            racks = world.racks.len(),
            rack_stock = world.racks.n_items(),
            bays = world.bays.len(),
            bay_stock = world.bays.n_items(),
            "warehouse floor laid out"
        );
        Ok(world)
    }

    pub fn store(&self, kind: StoreKind) -> &InventoryStore {
        match kind {
            StoreKind::Racks => &self.racks,
            StoreKind::Bays => &self.bays,
        }
    }

    pub fn place_at(
        &mut self,
        kind: StoreKind,
        cell_id: CellId,
        product: ProductId,
    ) -> Result<(), InventoryError> {
        let store = match kind {
            StoreKind::Racks => &mut self.racks,
            StoreKind::Bays => &mut self.bays,
        };
        store.place_at(&mut self.grid, cell_id, product)
    }

    pub fn remove_product(
        &mut self,
        kind: StoreKind,
        cell_id: CellId,
        product: &ProductId,
    ) -> Result<(), InventoryError> {
        let store = match kind {
            StoreKind::Racks => &mut self.racks,
            StoreKind::Bays => &mut self.bays,
        };
        store.remove_product(&mut self.grid, cell_id, product)
    }

    /// First storage cell at `pos` or orthogonally next to it, probed in `SCAN_ORDER`.
    ///
    /// The layout keeps every floor cell next to at most one storage cell, so the first hit
    /// is the only one.
    pub fn scan_adjacent(&self, pos: Position) -> Option<(StoreKind, CellId)> {
        SCAN_ORDER.iter().find_map(|step| {
            let probe = pos.offset(*step);
            if let Some(id) = self.racks.cell_at(probe) {
                return Some((StoreKind::Racks, id));
            }
            self.bays.cell_at(probe).map(|id| (StoreKind::Bays, id))
        })
    }

    pub fn random_empty_position(&mut self) -> Result<Position, GridError> {
        self.grid.random_empty_position(&mut self.rng)
    }

    /// Fresh 8-hex-digit product code not used by either store.
    pub fn new_product_code(&mut self) -> ProductId {
        loop {
            let bytes: [u8; 4] = self.rng.r#gen();
            let product = ProductId::new(hex::encode(bytes));
            if !self.racks.contains(&product) && !self.bays.contains(&product) {
                return product;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::config::LayoutConfig;

    fn small_config() -> SimConfig {
        SimConfig {
            seed: Some(5),
            width: 10,
            height: 10,
            robots: 0,
            layout: LayoutConfig {
                rack_fill: 1.0,
                bay_stock: 1,
                ..LayoutConfig::default()
            },
            ..SimConfig::default()
        }
    }

    #[test]
    fn generated_layout_places_bays_and_racks() {
        let world = World::from_config(&small_config()).unwrap();
        // bays at x = 1, 4, 7 on row 0; racks at x = 1, 4, 7 on rows 4, 7
        assert_eq!(world.bays.len(), 3);
        assert_eq!(world.racks.len(), 6);
        assert_eq!(world.bays.n_items(), 3);
        assert_eq!(world.racks.n_items(), 6);
        assert_eq!(world.racks.coords(0), Some(Position::new(1, 4)));
        assert_eq!(world.grid.get(Position::new(1, 4)), Some(CellCode::Item));
        assert_eq!(world.grid.count(CellCode::Item), 9);
    }

    #[test]
    fn every_floor_cell_touches_at_most_one_storage_cell() {
        let world = World::from_config(&small_config()).unwrap();
        for x in 0..10 {
            for y in 0..10 {
                let pos = Position::new(x, y);
                if !world.grid.is_free(pos) {
                    continue;
                }
                let touching = SCAN_ORDER
                    .iter()
                    .map(|s| pos.offset(*s))
                    .filter(|p| {
                        world.racks.cell_at(*p).is_some() || world.bays.cell_at(*p).is_some()
                    })
                    .count();
                assert!(touching <= 1, "{pos} touches {touching} storage cells");
            }
        }
    }

    #[test]
    fn scan_follows_the_probe_order() {
        let mut world = World::new(WorldGrid::new(5, 5).unwrap(), StdRng::seed_from_u64(1), false);
        world.racks.add_cell(&mut world.grid, Position::new(2, 3)).unwrap();
        world.bays.add_cell(&mut world.grid, Position::new(3, 2)).unwrap();

        // +y is probed before +x
        assert_eq!(
            world.scan_adjacent(Position::new(2, 2)),
            Some((StoreKind::Racks, 0))
        );
        assert_eq!(
            world.scan_adjacent(Position::new(4, 2)),
            Some((StoreKind::Bays, 0))
        );
        // diagonals never count
        assert_eq!(world.scan_adjacent(Position::new(1, 1)), None);
        assert_eq!(world.scan_adjacent(Position::new(0, 0)), None);
    }

    #[test]
    fn product_codes_are_unique_hex() {
        let mut world = World::from_config(&small_config()).unwrap();
        let code = world.new_product_code();
        assert_eq!(code.as_str().len(), 8);
        assert!(code.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!world.racks.contains(&code));
        assert!(!world.bays.contains(&code));
    }

    #[test]
    fn explicit_cells_override_the_generated_layout() {
        let mut config = small_config();
        config.layout.racks = Some(vec![Position::new(5, 5)]);
        config.layout.bays = Some(vec![Position::new(0, 9), Position::new(3, 9)]);
        let world = World::from_config(&config).unwrap();
        assert_eq!(world.racks.len(), 1);
        assert_eq!(world.bays.len(), 2);
        assert_eq!(world.bays.coords(0), Some(Position::new(0, 9)));
        assert_eq!(world.bays.n_items(), 2);
    }

    #[test]
    fn crowded_explicit_racks_never_reach_the_floor() {
        let mut config = small_config();
        config.layout.racks = Some(vec![Position::new(2, 5), Position::new(4, 5)]);
        let err = World::from_config(&config).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }
}
