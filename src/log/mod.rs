//! Log Module
//!
//! The append-only data file and the scans over it.
//!
//! ## Responsibilities
//! - Append encoded records at the write cursor
//! - Positional reads of single records
//! - Fold the whole log into its surviving records (merge)
//! - Rebuild the key → offset index on open (recovery)
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Record @ 0                                   │
//! │ ┌──────────┬──────────┬────────┬─────┬─────┐ │
//! │ │KeySz (4) │ValSz (4) │Mark (2)│ Key │Value│ │
//! │ └──────────┴──────────┴────────┴─────┴─────┘ │
//! ├──────────────────────────────────────────────┤
//! │ Record @ size(record 0)                      │
//! │ ...                                          │
//! └──────────────────────────────────────────────┘
//! ```
//! No file header or footer; records are packed back to back.

mod file;
mod recovery;

pub use file::{LogFile, LogIterator};
pub use recovery::{LogRecovery, RecoveryStats};
