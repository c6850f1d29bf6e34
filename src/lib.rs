//! Persistent single-file ordered index: a disk-paged B-tree over `u64`
//! keys and values with fixed 512-byte blocks, a bounded LRU node cache,
//! and write-through durability.
//!
//! [`BTree`] is the entry point: create or open an index file, then
//! `insert`, `search`, and `collect` against it. The `cli` module carries
//! the shell and CSV helpers used by the `tanoak` binary.

#![warn(missing_docs)]

pub mod cli;
pub mod error;
pub mod node;
pub mod store;
pub mod tree;
pub mod types;

pub use error::{IndexError, Result};
pub use node::Node;
pub use store::{BlockStore, StoreOptions, StoreStats, DEFAULT_CACHE_BLOCKS, MAGIC};
pub use tree::{BTree, Pairs, TreeStats};
pub use types::{BlockId, BLOCK_SIZE, DEGREE, MAX_CHILDREN, MAX_KEYS};
