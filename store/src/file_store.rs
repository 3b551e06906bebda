use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rmp_serde::{Deserializer, Serializer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use structures::{Cell, Grid, PlacementRecord, SnapshotMeta};
use tempfile::NamedTempFile;
use tracing::info;

use crate::canvas_store::CanvasStore;
use crate::errors::StoreError;
use crate::placement_log;

/// File-backed canvas store.
///
/// Layout under the data directory:
/// - `canvas.mp` — the grid as one MessagePack document
/// - `cooldowns.mp` — user id to last-placement timestamp
/// - `placements.log` — append-only bincode placement records
/// - `snapshots/` — one PNG per captured week plus `index.mp`
///
/// Documents are rewritten whole (the grid is small) through a temp file
/// and rename, so each individual update is atomic. Concurrent writers to
/// the same document resolve last-write-wins.
pub struct FileStore {
    canvas_path: PathBuf,
    cooldowns_path: PathBuf,
    log_path: PathBuf,
    snapshots_dir: PathBuf,
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        let data_dir = data_dir.into();
        FileStore {
            canvas_path: data_dir.join("canvas.mp"),
            cooldowns_path: data_dir.join("cooldowns.mp"),
            log_path: data_dir.join("placements.log"),
            snapshots_dir: data_dir.join("snapshots"),
            data_dir,
        }
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn create_if_missing(&self, path: &Path, bytes: &[u8]) -> Result<bool, StoreError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_grid(&self) -> Result<Grid, StoreError> {
        match fs::read(&self.canvas_path) {
            Ok(bytes) => decode_doc(&bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::NotInitialized(
                self.data_dir.display().to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    fn load_cooldowns(&self) -> Result<HashMap<String, DateTime<Utc>>, StoreError> {
        match fs::read(&self.cooldowns_path) {
            Ok(bytes) => decode_doc(&bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn load_snapshot_index(&self) -> Result<Vec<SnapshotMeta>, StoreError> {
        match fs::read(self.snapshots_dir.join("index.mp")) {
            Ok(bytes) => decode_doc(&bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn snapshot_image_path(&self, week: &str) -> PathBuf {
        self.snapshots_dir.join(format!("{}.png", week))
    }
}

impl CanvasStore for FileStore {
    fn ensure_initialized(
        &self,
        width: u16,
        height: u16,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(&self.snapshots_dir)?;

        let created =
            self.create_if_missing(&self.canvas_path, &encode_doc(&Grid::new(width, height, now))?)?;
        self.create_if_missing(
            &self.cooldowns_path,
            &encode_doc(&HashMap::<String, DateTime<Utc>>::new())?,
        )?;
        self.create_if_missing(&self.log_path, &[])?;

        if created {
            info!(width, height, dir = %self.data_dir.display(), "canvas store initialized");
        }
        Ok(())
    }

    fn read_cell(&self, x: u16, y: u16) -> Result<Option<Cell>, StoreError> {
        Ok(self.load_grid()?.cell(x, y).cloned())
    }

    fn write_cell(&self, x: u16, y: u16, cell: Cell) -> Result<(), StoreError> {
        let mut grid = self.load_grid()?;
        let placed_at = cell.placed_at;
        if !grid.set_cell(x, y, cell) {
            return Err(StoreError::OutOfBounds { x, y });
        }
        grid.last_updated = placed_at;
        self.write_atomic(&self.canvas_path, &encode_doc(&grid)?)
    }

    fn read_all_cells(&self) -> Result<Grid, StoreError> {
        self.load_grid()
    }

    fn replace_all_cells(&self, grid: &Grid) -> Result<(), StoreError> {
        self.write_atomic(&self.canvas_path, &encode_doc(grid)?)
    }

    fn read_cooldown(&self, user_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.load_cooldowns()?.get(user_id).copied())
    }

    fn write_cooldown(
        &self,
        user_id: &str,
        last_placed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut cooldowns = self.load_cooldowns()?;
        cooldowns.insert(user_id.to_string(), last_placed_at);
        self.write_atomic(&self.cooldowns_path, &encode_doc(&cooldowns)?)
    }

    fn append_placement(&self, record: &PlacementRecord) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.log_path)?;
        placement_log::append(&mut file, record)
    }

    fn read_placements(&self) -> Result<Vec<PlacementRecord>, StoreError> {
        match File::open(&self.log_path) {
            Ok(mut file) => placement_log::read_all(&mut file),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn put_snapshot(&self, meta: &SnapshotMeta, image: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.snapshots_dir)?;
        self.write_atomic(&self.snapshot_image_path(&meta.week), image)?;

        let mut index = self.load_snapshot_index()?;
        index.retain(|m| m.week != meta.week);
        index.push(meta.clone());
        self.write_atomic(&self.snapshots_dir.join("index.mp"), &encode_doc(&index)?)
    }

    fn list_snapshots(&self) -> Result<Vec<SnapshotMeta>, StoreError> {
        let mut index = self.load_snapshot_index()?;
        index.sort_by_key(|m| m.timestamp);
        Ok(index)
    }

    fn latest_snapshot(&self) -> Result<Option<(SnapshotMeta, Vec<u8>)>, StoreError> {
        let index = self.load_snapshot_index()?;
        let newest = match index.into_iter().max_by_key(|m| m.timestamp) {
            Some(meta) => meta,
            None => return Ok(None),
        };

        let image = fs::read(self.snapshot_image_path(&newest.week))?;
        Ok(Some((newest, image)))
    }
}

fn encode_doc<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::new(&mut buf);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

fn decode_doc<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    let mut deserializer = Deserializer::new(Cursor::new(bytes));
    Ok(T::deserialize(&mut deserializer)?)
}
