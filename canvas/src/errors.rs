use store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanvasError {
    #[error("{0}")]
    Validation(String),

    #[error("Please wait {remaining_seconds} more second(s) before placing another pixel")]
    CooldownActive {
        remaining_seconds: u64,
        remaining_minutes: u64,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
