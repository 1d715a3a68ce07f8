//! Log File
//!
//! Append-only record file with a write cursor.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::config::SyncStrategy;
use crate::error::{IoContext, Result, StoreError};
use crate::record::{decode_header, Record, HEADER_SIZE};

/// The data file plus the offset of the next append
///
/// `write_offset` is the logical end of the log. Reads never look past it,
/// so bytes left behind by a failed append are invisible and get
/// overwritten by the next successful one.
pub struct LogFile {
    path: PathBuf,
    file: File,
    write_offset: u64,
    sync_strategy: SyncStrategy,
    /// Appends since the last fsync
    unsynced: usize,
}

impl LogFile {
    /// Open an existing log or create an empty one
    ///
    /// The write cursor starts at the current file length.
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .context("open log file")?;
        Self::from_file(path, file, sync_strategy)
    }

    /// Create a fresh, empty log, discarding any file already at `path`
    pub fn create(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .context("create log file")?;
        Self::from_file(path, file, sync_strategy)
    }

    fn from_file(path: &Path, file: File, sync_strategy: SyncStrategy) -> Result<Self> {
        let write_offset = file.metadata().context("stat log file")?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            write_offset,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Read the record starting at `offset`
    ///
    /// Returns:
    /// - `Ok(Some(record))`: a complete record
    /// - `Ok(None)`: `offset` is at or past the end of the log
    /// - `Err(CorruptHeader | CorruptBody)`: the log ends mid-record or
    ///   the header is malformed
    pub fn read_at(&mut self, offset: u64) -> Result<Option<Record>> {
        if offset >= self.write_offset {
            return Ok(None);
        }

        let remaining = self.write_offset - offset;
        if remaining < HEADER_SIZE as u64 {
            return Err(StoreError::CorruptHeader(format!(
                "log ends {} bytes into the header at offset {}",
                remaining, offset
            )));
        }

        self.file
            .seek(SeekFrom::Start(offset))
            .context("seek to record")?;

        let mut header = [0u8; HEADER_SIZE];
        self.file.read_exact(&mut header).context("read header")?;
        let header = decode_header(&header).map_err(|e| match e {
            StoreError::CorruptHeader(msg) => {
                StoreError::CorruptHeader(format!("at offset {}: {}", offset, msg))
            }
            other => other,
        })?;

        if header.record_size() > remaining {
            return Err(StoreError::CorruptBody(format!(
                "record at offset {} needs {} bytes but the log ends after {}",
                offset,
                header.record_size(),
                remaining
            )));
        }

        let mut payload = vec![0u8; header.payload_size()];
        self.file.read_exact(&mut payload).context("read payload")?;

        Ok(Some(Record::from_parts(header, &payload)))
    }

    /// Write `bytes` at an absolute offset
    ///
    /// Does not move the write cursor; callers pass the cursor so records
    /// stay contiguous.
    pub fn append_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .context("seek to write offset")?;
        self.file.write_all(bytes).context("write record")?;
        Ok(())
    }

    /// Append a record at the write cursor and return its offset
    ///
    /// The cursor only advances once the write (and the sync, if one is due)
    /// has succeeded, so a failed append can simply be retried. Records whose
    /// key or value is too long for the header are refused before any write.
    pub fn append(&mut self, record: &Record) -> Result<u64> {
        record.validate()?;

        let offset = self.write_offset;
        let encoded = record.encode();
        self.append_at(offset, &encoded)?;

        self.unsynced += 1;
        let sync_due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNWrites { count } => self.unsynced >= count,
        };
        if sync_due {
            self.sync()?;
        }

        self.write_offset += encoded.len() as u64;
        Ok(offset)
    }

    /// Fold the log into the latest surviving record per key
    ///
    /// Puts insert or overwrite, deletes remove. Recovery and merge both
    /// rely on this being the meaning of the log.
    pub fn fold(&mut self) -> Result<HashMap<Bytes, Record>> {
        let mut live = HashMap::new();
        for item in self.iter() {
            let (_, record) = item?;
            if record.is_tombstone() {
                live.remove(&record.key);
            } else {
                live.insert(record.key.clone(), record);
            }
        }
        Ok(live)
    }

    /// Iterate `(offset, record)` pairs from the start of the log
    pub fn iter(&mut self) -> LogIterator<'_> {
        LogIterator {
            log: self,
            offset: 0,
            done: false,
        }
    }

    /// Force file data to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data().context("sync log file")?;
        self.unsynced = 0;
        Ok(())
    }

    /// Offset of the next append, which is also the log's logical size
    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record that the underlying file now lives at `path`
    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    pub(crate) fn set_sync_strategy(&mut self, sync_strategy: SyncStrategy) {
        self.sync_strategy = sync_strategy;
    }
}

/// Iterator over the records of a log, in file order
///
/// Stops after the first error.
pub struct LogIterator<'a> {
    log: &'a mut LogFile,
    offset: u64,
    done: bool,
}

impl Iterator for LogIterator<'_> {
    type Item = Result<(u64, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.log.read_at(self.offset) {
            Ok(Some(record)) => {
                let offset = self.offset;
                self.offset += record.size();
                Some(Ok((offset, record)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
