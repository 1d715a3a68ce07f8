//! Configuration for lsmkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use tracing::Dispatch;

/// Main configuration for an lsmkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the data file
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── lsm.data         (append-only log)
    ///     └── lsm.data.tmp     (only while a merge is running)
    pub data_dir: PathBuf,

    /// Sync strategy: how often to fsync the log
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Maximum tower height of skip lists built by the engine
    pub skiplist_max_level: usize,

    // -------------------------------------------------------------------------
    // Logging Configuration
    // -------------------------------------------------------------------------
    /// Sink for the engine's diagnostics. `None` captures whatever
    /// dispatcher is current when the engine is opened.
    pub dispatch: Option<Dispatch>,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync once N appends have accumulated since the last sync
    EveryNWrites { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./lsmkv_data"),
            sync_strategy: SyncStrategy::EveryNWrites { count: 100 },
            skiplist_max_level: 12,
            dispatch: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the skip list maximum level
    pub fn skiplist_max_level(mut self, level: usize) -> Self {
        self.config.skiplist_max_level = level;
        self
    }

    /// Route the engine's diagnostics to the given dispatcher
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.config.dispatch = Some(dispatch);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
