//! Index Module
//!
//! In-memory structures over the keys of the log.
//!
//! ## Responsibilities
//! - O(1) point lookups from key to log offset (`HashIndex`)
//! - Ordered insert/lookup and sorted traversal (`SkipList`)
//!
//! The engine keeps a `HashIndex` for reads and uses a `SkipList` to put
//! the survivors of a merge in key order.

mod hash;
mod skiplist;

pub use hash::HashIndex;
pub use skiplist::{SkipList, SkipListIter, DEFAULT_MAX_LEVEL};
