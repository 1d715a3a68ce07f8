//! Command definitions
//!
//! Operations a front end can hand to `Engine::execute`.

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: Vec<u8> },

    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key (the value is stored in the tombstone only)
    Delete { key: Vec<u8>, value: Vec<u8> },

    /// Compact the log
    Merge,
}

impl Command {
    /// Whether the command appends to or rewrites the log
    pub fn is_write(&self) -> bool {
        !matches!(self, Command::Get { .. })
    }
}
