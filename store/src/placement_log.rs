use std::io::{Read, Write};

use bincode::{Decode, Encode};
use chrono::TimeZone;
use chrono::Utc;
use structures::PlacementRecord;

use crate::constants::BINCODE_CONFIG;
use crate::errors::StoreError;

/// On-disk form of one placement record. Timestamps are stored as epoch
/// milliseconds; strings are length-prefixed by the bincode config.
#[derive(Encode, Decode, PartialEq, Eq, Debug)]
pub struct StoredPlacement {
    pub x: u16,
    pub y: u16,
    pub ms_since_epoch: i64,
    pub color: String,
    pub user_id: String,
    pub username: String,
}

impl From<&PlacementRecord> for StoredPlacement {
    fn from(record: &PlacementRecord) -> Self {
        StoredPlacement {
            x: record.x,
            y: record.y,
            ms_since_epoch: record.timestamp.timestamp_millis(),
            color: record.color.clone(),
            user_id: record.user_id.clone(),
            username: record.username.clone(),
        }
    }
}

impl StoredPlacement {
    fn into_record(self) -> Result<PlacementRecord, StoreError> {
        let timestamp = Utc
            .timestamp_millis_opt(self.ms_since_epoch)
            .single()
            .ok_or(StoreError::InvalidTimestamp(self.ms_since_epoch))?;

        Ok(PlacementRecord {
            x: self.x,
            y: self.y,
            color: self.color,
            user_id: self.user_id,
            username: self.username,
            timestamp,
        })
    }
}

pub fn append<W: Write>(writer: &mut W, record: &PlacementRecord) -> Result<(), StoreError> {
    bincode::encode_into_std_write(StoredPlacement::from(record), writer, BINCODE_CONFIG)?;
    Ok(())
}

pub fn read_all<R: Read>(reader: &mut R) -> Result<Vec<PlacementRecord>, StoreError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;

    let mut data = std::io::Cursor::new(buf);
    let mut records = Vec::new();
    while data.position() < data.get_ref().len() as u64 {
        let stored: StoredPlacement = bincode::decode_from_std_read(&mut data, BINCODE_CONFIG)?;
        records.push(stored.into_record()?);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(x: u16, user: &str, ms: i64) -> PlacementRecord {
        PlacementRecord {
            x,
            y: 0,
            color: "#FF0000".to_string(),
            user_id: user.to_string(),
            username: user.to_string(),
            timestamp: Utc.timestamp_millis_opt(ms).unwrap(),
        }
    }

    #[test]
    fn round_trips_in_append_order() {
        let mut buf = Vec::new();
        append(&mut buf, &record(1, "alice", 1_000)).unwrap();
        append(&mut buf, &record(2, "bob", 2_500)).unwrap();
        append(&mut buf, &record(3, "alice", 9_000)).unwrap();

        let records = read_all(&mut buf.as_slice()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], record(1, "alice", 1_000));
        assert_eq!(records[1].user_id, "bob");
        assert_eq!(records[2].timestamp.timestamp_millis(), 9_000);
    }

    #[test]
    fn empty_log_reads_as_empty() {
        let mut empty: &[u8] = &[];
        let records = read_all(&mut empty).unwrap();
        assert!(records.is_empty());
    }
}
