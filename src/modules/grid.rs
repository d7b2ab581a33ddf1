use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What occupies a grid cell. The discriminants are the wire codes read by viewers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CellCode {
    Empty = 0,
    Shelf = 1,
    Robot = 2,
    Operation = 3,
    Confused = 4,
    Item = 5,
}

impl CellCode {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn glyph(self) -> char {
        match self {
            CellCode::Empty => '.',
            CellCode::Shelf => '#',
            CellCode::Robot => 'R',
            CellCode::Operation => 'B',
            CellCode::Confused => '?',
            CellCode::Item => '$',
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CellCode::Empty),
            1 => Some(CellCode::Shelf),
            2 => Some(CellCode::Robot),
            3 => Some(CellCode::Operation),
            4 => Some(CellCode::Confused),
            5 => Some(CellCode::Item),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, step: Step) -> Self {
        Self {
            x: self.x + step.dx,
            y: self.y + step.dy,
        }
    }

    pub const fn manhattan(self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A single unit move on the 4-connected grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub dx: i32,
    pub dy: i32,
}

impl Step {
    pub const UP: Step = Step { dx: 0, dy: 1 };
    pub const DOWN: Step = Step { dx: 0, dy: -1 };
    pub const LEFT: Step = Step { dx: -1, dy: 0 };
    pub const RIGHT: Step = Step { dx: 1, dy: 0 };

    pub const ALL: [Step; 4] = [Step::LEFT, Step::RIGHT, Step::DOWN, Step::UP];

    pub const fn between(from: Position, to: Position) -> Self {
        Self {
            dx: to.x - from.x,
            dy: to.y - from.y,
        }
    }
}

/// Order in which the cells around a robot are probed for storage: self, +y, +x, -y, -x.
pub const SCAN_ORDER: [Step; 5] = [
    Step { dx: 0, dy: 0 },
    Step::UP,
    Step::RIGHT,
    Step::DOWN,
    Step::LEFT,
];

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("position {0} is outside the grid")]
    OutOfBounds(Position),
    #[error("no empty cell left on the grid")]
    NoSpace,
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidSize { width: i32, height: i32 },
}

/// Occupancy map of the warehouse floor, stored row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldGrid {
    width: i32,
    height: i32,
    cells: Vec<CellCode>,
}

impl WorldGrid {
    pub fn new(width: i32, height: i32) -> Result<Self, GridError> {
        if width <= 0 || height <= 0 {
            return Err(GridError::InvalidSize { width, height });
        }
        Ok(Self {
            width,
            height,
            cells: vec![CellCode::Empty; (width as usize) * (height as usize)],
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some((pos.y as usize) * (self.width as usize) + pos.x as usize)
    }

    pub fn get(&self, pos: Position) -> Option<CellCode> {
        self.index(pos).map(|idx| self.cells[idx])
    }

    /// In bounds and nothing on it.
    pub fn is_free(&self, pos: Position) -> bool {
        self.get(pos) == Some(CellCode::Empty)
    }

    pub fn set_cell(&mut self, pos: Position, code: CellCode) -> Result<(), GridError> {
        let idx = self.index(pos).ok_or(GridError::OutOfBounds(pos))?;
        self.cells[idx] = code;
        Ok(())
    }

    pub fn random_empty_position<R: Rng>(&self, rng: &mut R) -> Result<Position, GridError> {
        let empty: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, code)| **code == CellCode::Empty)
            .map(|(idx, _)| idx)
            .collect();
        if empty.is_empty() {
            return Err(GridError::NoSpace);
        }
        let idx = empty[rng.gen_range(0..empty.len())];
        Ok(self.position_of(idx))
    }

    fn position_of(&self, idx: usize) -> Position {
        let w = self.width as usize;
        Position::new((idx % w) as i32, (idx / w) as i32)
    }

    pub fn count(&self, code: CellCode) -> usize {
        self.cells.iter().filter(|c| **c == code).count()
    }

    /// Row-major copy of the raw cell codes.
    pub fn codes(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.code()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn free_cells_are_in_bounds_and_empty() {
        let mut grid = WorldGrid::new(4, 3).unwrap();
        assert!(grid.is_free(Position::new(0, 0)));
        assert!(grid.is_free(Position::new(3, 2)));
        assert!(!grid.is_free(Position::new(4, 0)));
        assert!(!grid.is_free(Position::new(0, -1)));

        grid.set_cell(Position::new(1, 1), CellCode::Shelf).unwrap();
        assert!(!grid.is_free(Position::new(1, 1)));
        assert_eq!(grid.get(Position::new(1, 1)), Some(CellCode::Shelf));
    }

    #[test]
    fn set_cell_rejects_out_of_bounds() {
        let mut grid = WorldGrid::new(2, 2).unwrap();
        assert_eq!(
            grid.set_cell(Position::new(2, 0), CellCode::Robot),
            Err(GridError::OutOfBounds(Position::new(2, 0)))
        );
    }

    #[test]
    fn random_empty_position_only_returns_empty_cells() {
        let mut grid = WorldGrid::new(3, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for x in 0..3 {
            for y in 0..3 {
                if (x, y) != (2, 1) {
                    grid.set_cell(Position::new(x, y), CellCode::Shelf).unwrap();
                }
            }
        }
        for _ in 0..10 {
            assert_eq!(
                grid.random_empty_position(&mut rng).unwrap(),
                Position::new(2, 1)
            );
        }

        grid.set_cell(Position::new(2, 1), CellCode::Robot).unwrap();
        assert_eq!(grid.random_empty_position(&mut rng), Err(GridError::NoSpace));
    }

    #[test]
    fn codes_are_row_major() {
        let mut grid = WorldGrid::new(3, 2).unwrap();
        grid.set_cell(Position::new(2, 0), CellCode::Item).unwrap();
        grid.set_cell(Position::new(0, 1), CellCode::Confused).unwrap();
        assert_eq!(grid.codes(), vec![0, 0, 5, 4, 0, 0]);
    }

    #[test]
    fn zero_sized_grid_is_rejected() {
        assert!(matches!(
            WorldGrid::new(0, 5),
            Err(GridError::InvalidSize { .. })
        ));
    }
}
