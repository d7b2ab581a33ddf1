use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::allocator::OperationMode;
use crate::modules::grid::{CellCode, Position};
use crate::modules::inventory::ProductId;
use crate::modules::robot::{RobotId, RobotState, TaskKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSnapshot {
    pub id: RobotId,
    pub name: String,
    pub position: Position,
    pub state: RobotState,
    pub task: TaskKind,
    /// Verb of the action in progress, if any.
    pub action: Option<String>,
    pub load: Option<ProductId>,
}

/// Point-in-time copy of the warehouse for viewers and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub generated_at: DateTime<Utc>,
    pub width: i32,
    pub height: i32,
    /// Row-major cell codes, row 0 first.
    pub grid_codes: Vec<u8>,
    pub rack_stock: usize,
    pub bay_stock: usize,
    pub target_stock: usize,
    pub free_rack_cells: usize,
    pub mode: OperationMode,
    pub tasks_dispatched: u64,
    pub n_blocked: u64,
    pub blocked_pct: f64,
    pub robots: Vec<RobotSnapshot>,
}

pub fn snapshot_dir() -> PathBuf {
    PathBuf::from(".gridstock")
}

fn latest_path(dir: &Path) -> PathBuf {
    dir.join("world_snapshot.json")
}

fn history_dir(dir: &Path) -> PathBuf {
    dir.join("world_snapshots")
}

/// Overwrite the latest snapshot under `dir`.
pub fn save_world_snapshot(dir: &Path, snapshot: &WorldSnapshot) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = latest_path(dir);
    let json = serde_json::to_vec_pretty(snapshot)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Keep a per-tick copy next to the latest one.
pub fn save_world_snapshot_tick(dir: &Path, snapshot: &WorldSnapshot) -> io::Result<PathBuf> {
    let history = history_dir(dir);
    fs::create_dir_all(&history)?;
    let path = history.join(format!("tick_{:06}.json", snapshot.tick));
    let json = serde_json::to_vec_pretty(snapshot)?;
    fs::write(&path, json)?;
    Ok(path)
}

pub fn load_world_snapshot(dir: &Path) -> io::Result<Option<WorldSnapshot>> {
    let path = latest_path(dir);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    let snapshot = serde_json::from_slice(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(snapshot))
}

/// Character map of the grid, highest row first so +y points up.
pub fn render_ascii(snapshot: &WorldSnapshot) -> String {
    let width = snapshot.width.max(0) as usize;
    if width == 0 {
        return String::new();
    }
    let rows = snapshot.height.max(0) as usize;
    let mut out = String::with_capacity(snapshot.grid_codes.len() + rows);
    for row in snapshot.grid_codes.chunks(width).rev() {
        for code in row {
            out.push(CellCode::from_code(*code).map_or('!', CellCode::glyph));
        }
        out.push('\n');
    }
    out
}

pub fn render_summary(snapshot: &WorldSnapshot) -> String {
    format!(
        concat!(
            "tick {} | mode {} | racks {}/{} (target {}, {} free) | bays {} ",
            "| tasks {} | blocked {} ({:.1}%)"
        ),
        snapshot.tick,
        snapshot.mode,
        snapshot.rack_stock,
        snapshot.rack_stock + snapshot.free_rack_cells,
        snapshot.target_stock,
        snapshot.free_rack_cells,
        snapshot.bay_stock,
        snapshot.tasks_dispatched,
        snapshot.n_blocked,
        snapshot.blocked_pct,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_snapshot() -> WorldSnapshot {
        WorldSnapshot {
            tick: 7,
            generated_at: Utc::now(),
            width: 3,
            height: 2,
            // row 0: bay, empty, robot; row 1: shelf, item, confused
            grid_codes: vec![3, 0, 2, 1, 5, 4],
            rack_stock: 1,
            bay_stock: 0,
            target_stock: 1,
            free_rack_cells: 1,
            mode: OperationMode::Both,
            tasks_dispatched: 2,
            n_blocked: 1,
            blocked_pct: 50.0,
            robots: vec![RobotSnapshot {
                id: 0,
                name: "bot-0".into(),
                position: Position::new(2, 0),
                state: RobotState::Moving,
                task: TaskKind::Transfer,
                action: Some("go".into()),
                load: None,
            }],
        }
    }

    #[test]
    fn ascii_puts_the_top_row_first() {
        assert_eq!(render_ascii(&tiny_snapshot()), "#$?\nB.R\n");
    }

    #[test]
    fn unknown_codes_are_flagged() {
        let mut snapshot = tiny_snapshot();
        snapshot.grid_codes[1] = 42;
        assert_eq!(render_ascii(&snapshot), "#$?\nB!R\n");
    }

    #[test]
    fn summary_mentions_the_mode_and_stock() {
        let summary = render_summary(&tiny_snapshot());
        assert!(summary.starts_with("tick 7 | mode both"));
        assert!(summary.contains("racks 1/2"));
        assert!(summary.contains("50.0%"));
    }

    #[test]
    fn snapshots_round_trip_through_disk() {
        let dir = std::env::temp_dir().join(format!("gridstock-view-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        assert_eq!(load_world_snapshot(&dir).unwrap(), None);

        let snapshot = tiny_snapshot();
        let path = save_world_snapshot(&dir, &snapshot).unwrap();
        assert!(path.ends_with("world_snapshot.json"));
        let history = save_world_snapshot_tick(&dir, &snapshot).unwrap();
        assert!(history.ends_with("tick_000007.json"));

        let loaded = load_world_snapshot(&dir).unwrap().unwrap();
        assert_eq!(loaded.grid_codes, snapshot.grid_codes);
        assert_eq!(loaded.robots, snapshot.robots);
        assert_eq!(loaded.mode, OperationMode::Both);
        fs::remove_dir_all(&dir).unwrap();
    }
}
