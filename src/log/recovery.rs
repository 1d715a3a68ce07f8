//! Log Recovery
//!
//! Rebuilds the in-memory index by replaying the log on open.

use crate::error::Result;
use crate::index::HashIndex;

use super::LogFile;

/// Replays a log into a key → offset index
pub struct LogRecovery;

/// Result of a recovery scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Records read, puts and deletes together
    pub records_scanned: u64,

    /// Delete records seen
    pub tombstones: u64,

    /// Keys left in the index
    pub live_keys: usize,

    /// Bytes consumed, always equal to the log size on success
    pub bytes_scanned: u64,
}

impl LogRecovery {
    /// Scan `log` from offset 0 and return the index of its live keys
    ///
    /// The newest put of each key wins, a delete removes the key. Any read
    /// or decode error aborts the scan; a log that ends mid-record is
    /// refused rather than truncated.
    pub fn recover(log: &mut LogFile) -> Result<(HashIndex, RecoveryStats)> {
        let mut index = HashIndex::new();
        let mut stats = RecoveryStats::default();

        for item in log.iter() {
            let (offset, record) = item?;
            stats.records_scanned += 1;
            stats.bytes_scanned = offset + record.size();

            if record.is_tombstone() {
                stats.tombstones += 1;
                index.remove(&record.key);
            } else {
                index.insert(record.key, offset);
            }
        }

        stats.live_keys = index.len();
        Ok((index, stats))
    }
}
