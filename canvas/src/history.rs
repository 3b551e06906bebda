use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use structures::{Cell, Grid, HistoryStats, PlacementRecord};

/// Rebuild a grid by replaying placement records in log order.
/// With `up_to_seconds`, only records within that many seconds of the first
/// record are applied (the log is ordered, so replay stops at the cutoff).
pub fn replay(
    records: &[PlacementRecord],
    width: u16,
    height: u16,
    up_to_seconds: Option<i64>,
) -> Grid {
    let mut grid = Grid::new(width, height, DateTime::<Utc>::MIN_UTC);

    let cutoff = match (records.first(), up_to_seconds) {
        (Some(first), Some(seconds)) => Some(first.timestamp + Duration::seconds(seconds)),
        _ => None,
    };

    for record in records {
        if let Some(cutoff) = cutoff {
            if record.timestamp > cutoff {
                break;
            }
        }

        let applied = grid.set_cell(
            record.x,
            record.y,
            Cell {
                color: record.color.clone(),
                user_id: record.user_id.clone(),
                username: record.username.clone(),
                placed_at: record.timestamp,
            },
        );
        if applied {
            grid.last_updated = record.timestamp;
        }
    }

    grid
}

/// Aggregates over the whole log, as opposed to the live grid's stats.
pub fn stats(records: &[PlacementRecord]) -> HistoryStats {
    let contributors: HashSet<&str> = records.iter().map(|r| r.user_id.as_str()).collect();
    HistoryStats {
        total_placements: records.len() as u64,
        unique_contributors: contributors.len() as u64,
    }
}
