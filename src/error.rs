//! Error types for lsmkv
//!
//! Provides a unified error type for all operations.

use std::io;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for lsmkv operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error while trying to {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt record header: {0}")]
    CorruptHeader(String),

    #[error("Corrupt record body: {0}")]
    CorruptBody(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Index points at offset {offset} which does not hold the indexed key")]
    IndexMismatch { offset: u64 },
}

impl StoreError {
    /// True for the two record corruption variants
    pub fn is_corruption(&self) -> bool {
        matches!(self, StoreError::CorruptHeader(_) | StoreError::CorruptBody(_))
    }
}

/// Attaches the failing step to an `io::Error`
pub(crate) trait IoContext<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, io::Error> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|source| StoreError::Io { context, source })
    }
}
