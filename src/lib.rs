//! # lsmkv
//!
//! An embedded key-value store with:
//! - An append-only data log (`lsm.data`)
//! - An in-memory hash index rebuilt by replaying the log on open
//! - Merge compaction that rewrites the log and swaps it in atomically
//! - An arena-backed skip list for ordered in-memory lookup
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                               │
//! │          put / get / delete / merge (one Mutex)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   LogFile   │          │  HashIndex  │
//!   │  (Append)   │          │ key→offset  │
//!   └──────┬──────┘          └─────────────┘
//!          │ fold
//!          ▼
//!   ┌─────────────┐
//!   │  SkipList   │  (orders the merge output)
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod log;
pub mod index;
pub mod command;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::{Config, SyncStrategy};
pub use engine::{Engine, MergeStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of lsmkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
