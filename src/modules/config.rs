use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modules::allocator::OperationMode;
use crate::modules::grid::Position;
use crate::modules::planner::StrategyKind;

/// Smallest spacing that keeps every floor cell next to at most one storage cell.
pub const MIN_RACK_SPACING: i32 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Distance between neighbouring storage cells along both axes.
    pub rack_spacing: i32,
    /// Chance that a rack starts out stocked.
    pub rack_fill: f64,
    pub deep_racks: bool,
    /// Products placed on each loading bay at startup.
    pub bay_stock: usize,
    /// Explicit rack coordinates; replaces the generated rack grid when set.
    pub racks: Option<Vec<Position>>,
    /// Explicit bay coordinates; replaces the generated bay row when set.
    pub bays: Option<Vec<Position>>,
}

impl LayoutConfig {
    /// Bay and rack coordinates for a `width` x `height` floor: the explicit lists when set,
    /// the generated row and lattice otherwise.
    pub fn storage_cells(&self, width: i32, height: i32) -> (Vec<Position>, Vec<Position>) {
        let step = self.rack_spacing.max(1) as usize;
        let bays = self.bays.clone().unwrap_or_else(|| {
            (1..width - 1)
                .step_by(step)
                .map(|x| Position::new(x, 0))
                .collect()
        });
        // one lattice row above the bays, keeping a free border
        let racks = self.racks.clone().unwrap_or_else(|| {
            (self.rack_spacing + 1..height - 1)
                .step_by(step)
                .flat_map(|y| (1..width - 1).step_by(step).map(move |x| Position::new(x, y)))
                .collect()
        });
        (bays, racks)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rack_spacing: MIN_RACK_SPACING,
            rack_fill: 0.5,
            deep_racks: false,
            bay_stock: 2,
            racks: None,
            bays: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: Option<u64>,
    pub width: i32,
    pub height: i32,
    pub robots: usize,
    pub strategy: StrategyKind,
    pub mode: OperationMode,
    pub tick_ms: u64,
    /// Max steps per plan; 0 plans all the way.
    pub plan_horizon: usize,
    pub layout: LayoutConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: None,
            width: 40,
            height: 30,
            robots: 12,
            strategy: StrategyKind::Astar,
            mode: OperationMode::Both,
            tick_ms: 50,
            plan_horizon: 0,
            layout: LayoutConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < 3 || self.height < 3 {
            return Err(ConfigError::Invalid(format!(
                "grid must be at least 3x3, got {}x{}",
                self.width, self.height
            )));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be greater than 0".into()));
        }
        let layout = &self.layout;
        if layout.rack_spacing < MIN_RACK_SPACING {
            return Err(ConfigError::Invalid(format!(
                "rack_spacing must be at least {}, got {}",
                MIN_RACK_SPACING, layout.rack_spacing
            )));
        }
        if !(0.0..=1.0).contains(&layout.rack_fill) {
            return Err(ConfigError::Invalid(format!(
                "rack_fill must be within 0..=1, got {}",
                layout.rack_fill
            )));
        }
        let explicit = layout.racks.iter().chain(layout.bays.iter()).flatten();
        for pos in explicit {
            if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
                return Err(ConfigError::Invalid(format!(
                    "storage cell {} lies outside the {}x{} grid",
                    pos, self.width, self.height
                )));
            }
        }
        if layout.racks.is_some() || layout.bays.is_some() {
            // a floor cell next to two storage cells would make Pick/Drop ambiguous
            let (bays, racks) = layout.storage_cells(self.width, self.height);
            let cells: Vec<Position> = bays.into_iter().chain(racks).collect();
            for (i, a) in cells.iter().enumerate() {
                let crowded = cells[i + 1..]
                    .iter()
                    .find(|b| a.manhattan(**b) < MIN_RACK_SPACING);
                if let Some(b) = crowded {
                    return Err(ConfigError::Invalid(format!(
                        "storage cells {} and {} are closer than {} cells",
                        a, b, MIN_RACK_SPACING
                    )));
                }
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<SimConfig, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(SimConfig::default());
    }
    let config: SimConfig = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: SimConfig =
            serde_json::from_str(r#"{"robots": 3, "mode": "store", "layout": {"bay_stock": 5}}"#)
                .unwrap();
        assert_eq!(config.robots, 3);
        assert_eq!(config.mode, OperationMode::Store);
        assert_eq!(config.layout.bay_stock, 5);
        assert_eq!(config.layout.rack_spacing, MIN_RACK_SPACING);
        assert_eq!(config.width, SimConfig::default().width);
    }

    #[test]
    fn tight_spacing_is_rejected() {
        let mut config = SimConfig::default();
        config.layout.rack_spacing = 2;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn out_of_grid_storage_is_rejected() {
        let mut config = SimConfig::default();
        config.layout.bays = Some(vec![Position::new(config.width, 0)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn crowded_explicit_storage_is_rejected() {
        let mut config = SimConfig::default();
        config.layout.racks = Some(vec![Position::new(2, 5), Position::new(4, 5)]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("(2, 5) and (4, 5)"));

        config.layout.racks = Some(vec![Position::new(2, 5), Position::new(5, 5)]);
        config.validate().unwrap();

        // duplicates count as crowded too
        config.layout.racks = Some(vec![Position::new(2, 5), Position::new(2, 5)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_bays_are_checked_against_generated_racks() {
        let mut config = SimConfig::default();
        // generated racks start at (1, 4)
        config.layout.bays = Some(vec![Position::new(1, 3)]);
        assert!(config.validate().is_err());
        config.layout.bays = Some(vec![Position::new(1, 1)]);
        config.validate().unwrap();
    }

    #[test]
    fn generated_cells_follow_the_spacing() {
        let layout = LayoutConfig::default();
        let (bays, racks) = layout.storage_cells(10, 10);
        assert_eq!(bays, vec![Position::new(1, 0), Position::new(4, 0), Position::new(7, 0)]);
        assert_eq!(racks.len(), 6);
        assert_eq!(racks[0], Position::new(1, 4));
        assert_eq!(racks[5], Position::new(7, 7));
    }

    #[test]
    fn bad_fill_is_rejected() {
        let mut config = SimConfig::default();
        config.layout.rack_fill = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = load_config(Path::new("definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("definitely/not/here.json"));
    }
}
