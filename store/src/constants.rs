use bincode::config::{Configuration, Fixint, LittleEndian, NoLimit, WriteFixedArrayLength};

// Legacy encoding with fixed-width integers so the log format stays stable
// across bincode defaults
pub const BINCODE_CONFIG: Configuration<LittleEndian, Fixint, WriteFixedArrayLength, NoLimit> =
    bincode::config::legacy();
