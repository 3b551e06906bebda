use chrono::{DateTime, Utc};
use std::collections::HashSet;

#[macro_use]
extern crate serde_derive;

/// One painted cell of the canvas. Empty cells are `None` in the grid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cell {
    pub color: String,
    pub user_id: String,
    pub username: String,
    pub placed_at: DateTime<Utc>,
}

/// The shared canvas: a dense width x height grid, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Grid {
    pub width: u16,
    pub height: u16,
    pub cells: Vec<Option<Cell>>,
    pub last_updated: DateTime<Utc>,
}

impl Grid {
    pub fn new(width: u16, height: u16, created_at: DateTime<Utc>) -> Self {
        Grid {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
            last_updated: created_at,
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && x < self.width as i64 && y >= 0 && y < self.height as i64
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells[y as usize * self.width as usize + x as usize].as_ref()
    }

    /// Overwrites the cell at (x, y). Returns false if the coordinates are
    /// outside the grid, leaving it untouched.
    pub fn set_cell(&mut self, x: u16, y: u16, cell: Cell) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.cells[y as usize * self.width as usize + x as usize] = Some(cell);
        true
    }

    pub fn painted_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn unique_users(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .map(|c| c.user_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn stats(&self) -> CanvasStats {
        CanvasStats {
            total_pixels: self.painted_cells() as u64,
            unique_users: self.unique_users() as u64,
            last_updated: self.last_updated,
            canvas_size: format!("{}x{}", self.width, self.height),
        }
    }
}

/// Audit-log entry for one successful placement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlacementRecord {
    pub x: u16,
    pub y: u16,
    pub color: String,
    pub user_id: String,
    pub username: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CanvasStats {
    pub total_pixels: u64,
    pub unique_users: u64,
    pub last_updated: DateTime<Utc>,
    pub canvas_size: String,
}

/// Read-only projection of the canvas handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CanvasView {
    pub grid: Grid,
    pub stats: CanvasStats,
}

/// Whether a user may place right now, and if not for how much longer.
/// `remaining_minutes` is rounded up to whole minutes for display.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CooldownStatus {
    pub can_place: bool,
    pub remaining_seconds: Option<u64>,
    pub remaining_minutes: Option<u64>,
}

impl CooldownStatus {
    pub fn eligible() -> Self {
        CooldownStatus {
            can_place: true,
            remaining_seconds: None,
            remaining_minutes: None,
        }
    }

    pub fn waiting(remaining_seconds: u64) -> Self {
        CooldownStatus {
            can_place: false,
            remaining_seconds: Some(remaining_seconds),
            remaining_minutes: Some((remaining_seconds + 59) / 60),
        }
    }
}

/// Metadata for one stored weekly snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SnapshotMeta {
    pub week: String,
    pub timestamp: DateTime<Utc>,
}

/// The newest stored snapshot plus its rendered image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentSnapshot {
    pub image: Vec<u8>,
    pub week: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates reconstructed from the placement log, as opposed to
/// `CanvasStats` which describes the currently painted cells.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryStats {
    pub total_placements: u64,
    pub unique_contributors: u64,
}
