use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Log encode error: {0}")]
    LogEncode(#[from] bincode::error::EncodeError),

    #[error("Log decode error: {0}")]
    LogDecode(#[from] bincode::error::DecodeError),

    #[error("Log entry has an invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("Cell ({x}, {y}) is outside the canvas")]
    OutOfBounds { x: u16, y: u16 },

    #[error("Canvas store is not initialized at {0}")]
    NotInitialized(String),
}
