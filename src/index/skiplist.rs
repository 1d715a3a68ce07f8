//! Skip list
//!
//! Arena-backed, insert-only probabilistic ordered index.
//!
//! ```text
//! Level 2:  H2 ──────────────────────► 30 ──────────────► NIL
//!            │                          │
//! Level 1:  H1 ──────► 10 ────────────► 30 ──────► 50 ──► NIL
//!            │          │               │           │
//! Level 0:  H0 ──────► 10 ──► 20 ─────► 30 ──► 40 ► 50 ──► NIL
//! ```
//!
//! Every node lives in `nodes` and links to others by index. Each level
//! has its own sentinel header; headers and tower nodes are chained
//! downwards with `down`.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, StoreError};

/// Maximum height used when none is configured. LevelDB uses 12.
pub const DEFAULT_MAX_LEVEL: usize = 12;

type NodeId = usize;

struct Node {
    /// Empty for headers; inserted keys are never empty
    key: Bytes,
    value: Bytes,
    level: usize,
    right: Option<NodeId>,
    down: Option<NodeId>,
}

/// Ordered multi-level linked list over byte keys
///
/// Inserting a key that is already present links a second node in front
/// of the first, so `search` sees the newest value and `iter` yields every
/// copy, newest first.
pub struct SkipList {
    /// Arena; `nodes[i]` for `i < max_level` is the header of level `i`
    nodes: Vec<Node>,
    max_level: usize,
    /// Tallest tower built so far
    height: usize,
    len: usize,
    rng: StdRng,
}

impl SkipList {
    /// Create an empty skip list with towers of at most `max_level` nodes
    pub fn new(max_level: usize) -> Result<Self> {
        Self::with_rng(max_level, StdRng::from_entropy())
    }

    /// Like `new`, with a fixed seed for reproducible tower heights
    pub fn with_seed(max_level: usize, seed: u64) -> Result<Self> {
        Self::with_rng(max_level, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_level: usize, rng: StdRng) -> Result<Self> {
        if max_level == 0 {
            return Err(StoreError::InvalidArgument(
                "skip list needs at least one level".to_string(),
            ));
        }

        let nodes = (0..max_level)
            .map(|level| Node {
                key: Bytes::new(),
                value: Bytes::new(),
                level,
                right: None,
                down: level.checked_sub(1),
            })
            .collect();

        Ok(Self {
            nodes,
            max_level,
            height: 0,
            len: 0,
            rng,
        })
    }

    /// Insert a key-value pair
    ///
    /// Algorithm:
    ///   1. Find the last node with key < `key` at each level
    ///   2. Pick a random tower height
    ///   3. Splice one node per level in after the predecessor, bottom-up,
    ///      linking each to the one below with `down`
    pub fn insert(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(StoreError::InvalidArgument(
                "skip list keys must be non-empty".to_string(),
            ));
        }
        let value = value.into();

        let predecessors = self.predecessors(&key);
        let height = self.random_level();

        let mut below = None;
        for (level, &pred) in predecessors.iter().enumerate().take(height) {
            let id = self.nodes.len();
            self.nodes.push(Node {
                key: key.clone(),
                value: value.clone(),
                level,
                right: self.nodes[pred].right,
                down: below,
            });
            self.nodes[pred].right = Some(id);
            below = Some(id);
        }

        self.len += 1;
        self.height = self.height.max(height);
        Ok(())
    }

    /// Look up a key, returning the most recently inserted value for it
    pub fn search(&self, key: &[u8]) -> Option<&Bytes> {
        let mut cur = self.top_header();
        loop {
            cur = self.advance(cur, key);
            match self.nodes[cur].down {
                Some(down) => cur = down,
                None => break,
            }
        }

        let next = &self.nodes[self.nodes[cur].right?];
        (next.key.as_ref() == key).then_some(&next.value)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.search(key).is_some()
    }

    /// Iterate level 0 in ascending key order
    pub fn iter(&self) -> SkipListIter<'_> {
        self.level_iter(0)
    }

    /// Iterate the nodes linked at `level`, in key order
    ///
    /// An out-of-range level yields nothing.
    pub fn level_iter(&self, level: usize) -> SkipListIter<'_> {
        let next = if level < self.max_level {
            self.nodes[level].right
        } else {
            None
        };
        SkipListIter {
            list: self,
            level,
            next,
        }
    }

    /// Number of inserts performed
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Height of the tallest tower, 0 while empty
    pub fn height(&self) -> usize {
        self.height
    }

    /// Count fair-coin successes before the first failure, clamped to
    /// `[1, max_level]`
    pub fn random_level(&mut self) -> usize {
        let mut successes = 0;
        while successes < self.max_level && self.rng.gen_bool(0.5) {
            successes += 1;
        }
        successes.clamp(1, self.max_level)
    }

    fn top_header(&self) -> NodeId {
        self.max_level - 1
    }

    /// Last node at `from`'s level whose key is strictly less than `key`
    fn advance(&self, mut from: NodeId, key: &[u8]) -> NodeId {
        while let Some(next) = self.nodes[from].right {
            if self.nodes[next].key.as_ref() < key {
                from = next;
            } else {
                break;
            }
        }
        from
    }

    /// Per-level predecessors of `key`, indexed by level
    fn predecessors(&self, key: &[u8]) -> Vec<NodeId> {
        let mut preds = vec![0; self.max_level];
        let mut cur = self.top_header();
        for level in (0..self.max_level).rev() {
            cur = self.advance(cur, key);
            preds[level] = cur;
            if let Some(down) = self.nodes[cur].down {
                cur = down;
            }
        }
        preds
    }
}

/// Iterator over one level of a skip list
pub struct SkipListIter<'a> {
    list: &'a SkipList,
    level: usize,
    next: Option<NodeId>,
}

impl<'a> Iterator for SkipListIter<'a> {
    type Item = (&'a Bytes, &'a Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.list.nodes[self.next?];
        debug_assert_eq!(node.level, self.level);
        self.next = node.right;
        Some((&node.key, &node.value))
    }
}
