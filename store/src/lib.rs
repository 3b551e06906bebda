mod canvas_store;
mod constants;
mod errors;
mod file_store;
mod placement_log;

pub use crate::canvas_store::CanvasStore;
pub use crate::errors::StoreError;
pub use crate::file_store::FileStore;
