use chrono::{Datelike, NaiveDate, Weekday};
use structures::SnapshotMeta;

/// Weekly snapshots only run on this day; the scheduler may fire more often
/// and gets a `Skipped` outcome on every other day.
pub const SNAPSHOT_WEEKDAY: Weekday = Weekday::Sun;

/// ISO week identifier, e.g. "2023-W01".
pub fn week_id(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Result of a snapshot capture attempt. `Skipped` is a normal outcome of
/// invoking the job off-schedule, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Captured(SnapshotMeta),
    Skipped { weekday: Weekday },
}

impl SnapshotOutcome {
    pub fn skipped(&self) -> bool {
        matches!(self, SnapshotOutcome::Skipped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_id_uses_iso_weeks() {
        // The first of January 2023 still belongs to the last ISO week of 2022
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(week_id(date), "2022-W52");

        let date = NaiveDate::from_ymd_opt(2023, 1, 8).unwrap();
        assert_eq!(week_id(date), "2023-W01");

        let date = NaiveDate::from_ymd_opt(2023, 6, 18).unwrap();
        assert_eq!(week_id(date), "2023-W24");
    }
}
