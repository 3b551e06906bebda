//! Configuration utilities (data dir, canvas dimensions, cooldown)

use std::env;
use std::path::PathBuf;

use canvas::CanvasConfig;
use chrono::Duration;

/// Where the canvas state lives on disk.
///
/// Reads the `MURAL_DATA_DIR` env var or defaults to ./data.
pub fn data_dir() -> PathBuf {
    env::var("MURAL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"))
}

/// Canvas dimensions and cooldown, each overridable by env var:
/// MURAL_CANVAS_WIDTH, MURAL_CANVAS_HEIGHT (default 200x200) and
/// MURAL_COOLDOWN_SECONDS (default 30).
pub fn canvas_config() -> CanvasConfig {
    let defaults = CanvasConfig::default();
    CanvasConfig {
        width: env_or("MURAL_CANVAS_WIDTH", defaults.width),
        height: env_or("MURAL_CANVAS_HEIGHT", defaults.height),
        cooldown: Duration::seconds(env_or(
            "MURAL_COOLDOWN_SECONDS",
            defaults.cooldown.num_seconds(),
        )),
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
