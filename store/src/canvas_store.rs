use chrono::{DateTime, Utc};
use structures::{Cell, Grid, PlacementRecord, SnapshotMeta};

use crate::errors::StoreError;

/// Persistence boundary for the canvas subsystem.
///
/// Each method is an independent, per-record-atomic operation; there is no
/// cross-method transaction. A cell write, a cooldown write and a log append
/// for the same user action land as three separate commits, and conflicting
/// writes to the same cell resolve last-write-wins.
pub trait CanvasStore {
    /// Create the backing state for a `width` x `height` canvas if it does
    /// not exist yet. Calling this again is a no-op; an existing canvas is
    /// never resized or reset.
    fn ensure_initialized(&self, width: u16, height: u16, now: DateTime<Utc>)
        -> Result<(), StoreError>;

    fn read_cell(&self, x: u16, y: u16) -> Result<Option<Cell>, StoreError>;

    /// Overwrite the cell at (x, y) and advance the canvas `last_updated`
    /// to the cell's `placed_at`.
    fn write_cell(&self, x: u16, y: u16, cell: Cell) -> Result<(), StoreError>;

    fn read_all_cells(&self) -> Result<Grid, StoreError>;

    /// Replace the whole grid, e.g. for an admin wipe or a bulk import.
    fn replace_all_cells(&self, grid: &Grid) -> Result<(), StoreError>;

    fn read_cooldown(&self, user_id: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn write_cooldown(&self, user_id: &str, last_placed_at: DateTime<Utc>)
        -> Result<(), StoreError>;

    fn append_placement(&self, record: &PlacementRecord) -> Result<(), StoreError>;

    /// All placement records in append order.
    fn read_placements(&self) -> Result<Vec<PlacementRecord>, StoreError>;

    /// Store a rendered snapshot. A snapshot for the same week replaces the
    /// previous one.
    fn put_snapshot(&self, meta: &SnapshotMeta, image: &[u8]) -> Result<(), StoreError>;

    fn list_snapshots(&self) -> Result<Vec<SnapshotMeta>, StoreError>;

    /// The stored snapshot with the newest timestamp, with its image bytes.
    fn latest_snapshot(&self) -> Result<Option<(SnapshotMeta, Vec<u8>)>, StoreError>;
}
