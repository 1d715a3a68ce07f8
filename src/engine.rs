//! Engine Module
//!
//! The storage engine that ties the log, the index and merge together.
//!
//! ## Responsibilities
//! - Recover the index from the log on open
//! - Append puts and deletes, keeping the index in step
//! - Serve point reads through the index
//! - Compact the log (merge) and swap it in atomically

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn, Dispatch};

use crate::command::Command;
use crate::config::{Config, SyncStrategy};
use crate::error::{IoContext, Result, StoreError};
use crate::index::{HashIndex, SkipList};
use crate::log::{LogFile, LogRecovery, RecoveryStats};
use crate::record::{check_len, Mark, Record};

/// Everything guarded by the engine lock
struct EngineState {
    log: LogFile,
    index: HashIndex,
}

/// Outcome of a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Keys carried into the compacted log
    pub live_keys: usize,

    /// Log size before the merge
    pub bytes_before: u64,

    /// Log size after the merge
    pub bytes_after: u64,
}

/// The main storage engine
///
/// ## Concurrency Model: one lock for everything
///
/// - `put`, `get`, `delete` and `merge` all take `state` for their whole
///   duration, disk I/O included
/// - No read/write split: a `get` excludes other readers as well
/// - Share between threads with `Arc<Engine>`
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// `{data_dir}/lsm.data`
    log_path: PathBuf,

    /// Log handle and index (exclusive access)
    state: Mutex<EngineState>,

    /// What the open-time scan found
    recovery: RecoveryStats,

    /// Where this engine's diagnostics go
    dispatch: Dispatch,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const LOG_FILENAME: &'static str = "lsm.data";
    const MERGE_FILENAME: &'static str = "lsm.data.tmp";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory if needed
    /// 2. Remove a temporary file left by an interrupted merge
    /// 3. Open/create the log; its length becomes the write cursor
    /// 4. Replay the log into the index, refusing a corrupt log
    pub fn open(config: Config) -> Result<Self> {
        let dispatch = config
            .dispatch
            .clone()
            .unwrap_or_else(|| tracing::dispatcher::get_default(Dispatch::clone));

        tracing::dispatcher::with_default(&dispatch, || Self::open_inner(config, dispatch.clone()))
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    fn open_inner(config: Config, dispatch: Dispatch) -> Result<Self> {
        if config.skiplist_max_level == 0 {
            return Err(StoreError::InvalidArgument(
                "skiplist_max_level must be at least 1".to_string(),
            ));
        }

        fs::create_dir_all(&config.data_dir).context("create data directory")?;

        let merge_path = config.data_dir.join(Self::MERGE_FILENAME);
        if merge_path.exists() {
            warn!(path = %merge_path.display(), "removing leftover merge file");
            fs::remove_file(&merge_path).context("remove leftover merge file")?;
        }

        let log_path = config.data_dir.join(Self::LOG_FILENAME);
        let mut log = LogFile::open(&log_path, config.sync_strategy)?;
        let (index, recovery) = LogRecovery::recover(&mut log)?;

        info!(
            path = %log_path.display(),
            records = recovery.records_scanned,
            tombstones = recovery.tombstones,
            live_keys = recovery.live_keys,
            bytes = recovery.bytes_scanned,
            "opened log"
        );

        Ok(Self {
            config,
            log_path,
            state: Mutex::new(EngineState { log, index }),
            recovery,
            dispatch,
        })
    }

    /// Run `f` with this engine's dispatcher as the default
    fn traced<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Execute a command
    ///
    /// Routes commands to appropriate handlers
    pub fn execute(&self, command: Command) -> Result<Option<Vec<u8>>> {
        match command {
            Command::Get { key } => self.get(&key),
            Command::Put { key, value } => {
                self.put(&key, &value)?;
                Ok(None)
            }
            Command::Delete { key, value } => {
                self.delete(&key, &value)?;
                Ok(None)
            }
            Command::Merge => {
                self.merge()?;
                Ok(None)
            }
        }
    }

    /// Get a value by key
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key is live
    /// - `Ok(None)`: key was never written or has been deleted
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.traced(|| {
            let mut state = self.state.lock();

            let Some(offset) = state.index.get(key) else {
                debug!(key_len = key.len(), "get: not found");
                return Ok(None);
            };

            match state.log.read_at(offset)? {
                Some(record) if record.key.as_ref() == key && !record.is_tombstone() => {
                    Ok(Some(record.value.to_vec()))
                }
                _ => Err(StoreError::IndexMismatch { offset }),
            }
        })
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire the lock
    /// 2. Append a put record at the write cursor
    /// 3. Point the index at it
    ///
    /// If the append fails neither the index nor the cursor move.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Self::check_args(key, value)?;

        self.traced(|| {
            let mut state = self.state.lock();

            let record = Record::put(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value));
            let offset = state.log.append(&record)?;
            state.index.insert(record.key, offset);

            debug!(key_len = key.len(), value_len = value.len(), offset, "put");
            Ok(())
        })
    }

    /// Delete a key
    ///
    /// Appends a tombstone carrying `value` and drops the key from the index.
    /// The tombstone's value is never read back. Deleting a key that is not
    /// present still writes the tombstone; merge discards it.
    pub fn delete(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Self::check_args(key, value)?;

        self.traced(|| {
            let mut state = self.state.lock();

            let tombstone = Record {
                key: Bytes::copy_from_slice(key),
                value: Bytes::copy_from_slice(value),
                mark: Mark::Delete,
            };
            let offset = state.log.append(&tombstone)?;
            let existed = state.index.remove(key).is_some();

            debug!(key_len = key.len(), offset, existed, "delete");
            Ok(())
        })
    }

    /// Compact the log down to one put per live key
    ///
    /// Steps:
    /// 1. Acquire the lock (held for the whole merge)
    /// 2. Fold the log into its surviving records
    /// 3. Write them in key order to `lsm.data.tmp`, building a new index
    /// 4. fsync, then rename over `lsm.data`
    /// 5. Adopt the new file and index
    ///
    /// Any failure before the rename leaves the old log and index in place.
    /// Once the rename has happened the merge is committed; a failure to
    /// sync the directory afterwards is only logged.
    pub fn merge(&self) -> Result<MergeStats> {
        self.traced(|| {
            let mut state = self.state.lock();
            self.merge_locked(&mut state)
        })
    }

    /// Internal merge implementation (called with the lock held)
    fn merge_locked(&self, state: &mut EngineState) -> Result<MergeStats> {
        let bytes_before = state.log.write_offset();
        let merge_path = self.config.data_dir.join(Self::MERGE_FILENAME);

        let (mut compacted, index) = match self.write_compacted(&mut state.log, &merge_path) {
            Ok(written) => written,
            Err(e) => {
                warn!(error = %e, "merge aborted, keeping current log");
                // The old log is still authoritative; a stray temp file is
                // also removed on the next open.
                let _ = fs::remove_file(&merge_path);
                return Err(e);
            }
        };

        compacted.set_path(self.log_path.clone());
        compacted.set_sync_strategy(self.config.sync_strategy);

        let stats = MergeStats {
            live_keys: index.len(),
            bytes_before,
            bytes_after: compacted.write_offset(),
        };

        state.log = compacted;
        state.index = index;

        if let Err(e) = Self::sync_dir(&self.config.data_dir) {
            warn!(error = %e, "merged log renamed but directory sync failed");
        }

        info!(
            live_keys = stats.live_keys,
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            "merged log"
        );
        Ok(stats)
    }

    /// Write the survivors of `log` to `merge_path` and rename it into place
    fn write_compacted(&self, log: &mut LogFile, merge_path: &Path) -> Result<(LogFile, HashIndex)> {
        let live = log.fold()?;

        let mut ordered = SkipList::new(self.config.skiplist_max_level)?;
        for (key, record) in live {
            ordered.insert(key, record.value)?;
        }

        // Sync once at the end rather than per record.
        let mut compacted = LogFile::create(
            merge_path,
            SyncStrategy::EveryNWrites { count: usize::MAX },
        )?;
        let mut index = HashIndex::new();
        for (key, value) in ordered.iter() {
            let offset = compacted.append(&Record::put(key.clone(), value.clone()))?;
            index.insert(key.clone(), offset);
        }
        compacted.sync()?;

        fs::rename(merge_path, &self.log_path).context("rename merged log into place")?;
        Ok((compacted, index))
    }

    #[cfg(unix)]
    fn sync_dir(dir: &Path) -> Result<()> {
        fs::File::open(dir)
            .and_then(|d| d.sync_all())
            .context("sync data directory")
    }

    #[cfg(not(unix))]
    fn sync_dir(_dir: &Path) -> Result<()> {
        Ok(())
    }

    fn check_args(key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument(
                "key must not be empty".to_string(),
            ));
        }
        check_len("key", key.len())?;
        check_len("value", value.len())?;
        Ok(())
    }

    /// Force the log to disk
    pub fn sync(&self) -> Result<()> {
        self.traced(|| self.state.lock().log.sync())
    }

    /// Close the engine gracefully
    ///
    /// Runs a final merge and syncs the log
    pub fn close(self) -> Result<()> {
        self.traced(|| {
            let mut state = self.state.lock();
            self.merge_locked(&mut state)?;
            state.log.sync()?;
            info!(path = %self.log_path.display(), "closed engine");
            Ok(())
        })
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the log file path
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Logical size of the log in bytes
    pub fn log_size(&self) -> u64 {
        self.state.lock().log.write_offset()
    }

    /// Statistics from the recovery scan done by `open`
    pub fn recovery_stats(&self) -> RecoveryStats {
        self.recovery
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
