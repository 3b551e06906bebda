mod errors;
mod history;
mod manager;
mod render;
mod snapshot;

pub use crate::errors::CanvasError;
pub use crate::manager::{CanvasConfig, CanvasManager};
pub use crate::render::{encode_png, render_grid};
pub use crate::snapshot::{week_id, SnapshotOutcome};
