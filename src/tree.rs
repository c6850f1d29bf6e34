//! Disk-paged B-tree: search, insert with preemptive splitting, in-order
//! traversal, and structural verification.
//!
//! [`BTree`] is the session handle the rest of the crate passes around; it
//! owns the [`BlockStore`] and is the only way to reach one.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{IndexError, Result};
use crate::node::Node;
use crate::store::{BlockStore, StoreOptions, StoreStats};
use crate::types::{BlockId, DEGREE, NULL_BLOCK};

/// Snapshot of file and cache counters for inspection commands.
#[derive(Debug, Clone, Serialize)]
pub struct TreeStats {
    /// Root block id, 0 while the tree is empty.
    pub root_block: u64,
    /// Next block id the store will hand out.
    pub next_block: u64,
    /// Blocks the file logically holds, header included.
    pub block_count: u64,
    /// Levels from root to leaf, 0 for an empty tree.
    pub height: u64,
    /// Number of key/value pairs.
    pub entries: u64,
    /// Cache and block traffic counters.
    pub cache: StoreStats,
}

/// Ascending iterator over the pairs of a tree.
pub struct Pairs {
    entries: Vec<(u64, u64)>,
    index: usize,
}

impl Iterator for Pairs {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index < self.entries.len() {
            let item = self.entries[self.index];
            self.index += 1;
            Some(item)
        } else {
            None
        }
    }
}

/// Persistent ordered map from `u64` keys to `u64` values.
///
/// One handle owns one index file for its whole lifetime; every mutation is
/// flushed before the call returns.
pub struct BTree {
    store: BlockStore,
}

impl BTree {
    /// Create a new index file and hand back a session over it.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(path, StoreOptions::default())
    }

    /// [`BTree::create`] with explicit store tunables.
    pub fn create_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        Ok(Self {
            store: BlockStore::create(path, options)?,
        })
    }

    /// Open an existing index file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    /// [`BTree::open`] with explicit store tunables.
    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        Ok(Self {
            store: BlockStore::open(path, options)?,
        })
    }

    /// Flush and release the underlying file.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    /// Look up the value stored under `key`.
    pub fn search(&mut self, key: u64) -> Result<Option<u64>> {
        let mut current = self.store.root();
        while !current.is_null() {
            let node = self.store.read_node(current)?;
            match node.keys.binary_search(&key) {
                Ok(idx) => return Ok(Some(node.values[idx])),
                Err(idx) => {
                    if node.is_leaf() {
                        return Ok(None);
                    }
                    current = node.children[idx];
                }
            }
        }
        Ok(None)
    }

    /// Insert a new pair. Fails with [`IndexError::DuplicateKey`] if the
    /// key is present; a rejected insert mutates nothing.
    pub fn insert(&mut self, key: u64, value: u64) -> Result<()> {
        if self.search(key)?.is_some() {
            return Err(IndexError::DuplicateKey(key));
        }

        let root_id = self.store.root();
        if root_id.is_null() {
            let id = self.store.allocate_block()?;
            let mut node = Node::new(id, NULL_BLOCK);
            node.keys.push(key);
            node.values.push(value);
            self.store.write_node(&node)?;
            self.store.set_root(id)?;
            debug!(root = id.0, "tree.root.create");
            return Ok(());
        }

        let root = self.store.read_node(root_id)?;
        if root.is_full() {
            let new_root_id = self.store.allocate_block()?;
            let mut new_root = Node::new(new_root_id, NULL_BLOCK);
            new_root.children.push(root_id);
            self.split_child(&mut new_root, 0)?;
            self.store.set_root(new_root_id)?;
            debug!(root = new_root_id.0, "tree.root.split");
            self.insert_nonfull(new_root, key, value)
        } else {
            self.insert_nonfull(root, key, value)
        }
    }

    /// Every pair in ascending key order.
    pub fn collect(&mut self) -> Result<Vec<(u64, u64)>> {
        let mut pairs = Vec::new();
        let root = self.store.root();
        if !root.is_null() {
            self.collect_into(root, &mut pairs)?;
        }
        Ok(pairs)
    }

    /// Ascending iterator over every pair.
    pub fn iter(&mut self) -> Result<Pairs> {
        Ok(Pairs {
            entries: self.collect()?,
            index: 0,
        })
    }

    /// Number of pairs, counted by traversal.
    pub fn len(&mut self) -> Result<u64> {
        Ok(self.collect()?.len() as u64)
    }

    /// True while no pair has ever been inserted.
    pub fn is_empty(&self) -> bool {
        self.store.root().is_null()
    }

    /// Levels from the root down to the leaves.
    pub fn height(&mut self) -> Result<u64> {
        let mut levels = 0;
        let mut current = self.store.root();
        while !current.is_null() {
            levels += 1;
            let node = self.store.read_node(current)?;
            current = if node.is_leaf() {
                NULL_BLOCK
            } else {
                node.children[0]
            };
        }
        Ok(levels)
    }

    /// File and cache counters for the inspection commands.
    pub fn stats(&mut self) -> Result<TreeStats> {
        let entries = self.len()?;
        let height = self.height()?;
        Ok(TreeStats {
            root_block: self.store.root().0,
            next_block: self.store.next_block_id().0,
            block_count: self.store.block_count(),
            height,
            entries,
            cache: self.store.stats(),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Sweep the whole tree and report every structural violation found.
    ///
    /// An empty result means the tree is sound. I/O failures and blocks
    /// that cannot be decoded surface as errors, not findings.
    pub fn verify(&mut self) -> Result<Vec<String>> {
        let mut findings = Vec::new();
        let root = self.store.root();
        if root.is_null() {
            return Ok(findings);
        }
        let mut leaf_depth = None;
        self.verify_node(
            root,
            NULL_BLOCK,
            1,
            None,
            None,
            &mut leaf_depth,
            &mut findings,
        )?;

        let pairs = self.collect()?;
        for window in pairs.windows(2) {
            if window[0].0 >= window[1].0 {
                findings.push(format!("traversal out of order at key {}", window[1].0));
            }
        }
        Ok(findings)
    }

    fn insert_nonfull(&mut self, mut node: Node, key: u64, value: u64) -> Result<()> {
        let mut idx = match node.keys.binary_search(&key) {
            Ok(_) => return Err(IndexError::DuplicateKey(key)),
            Err(idx) => idx,
        };

        if node.is_leaf() {
            node.keys.insert(idx, key);
            node.values.insert(idx, value);
            self.store.write_node(&node)?;
            trace!(block = node.block_id.0, key, "tree.insert.leaf");
            return Ok(());
        }

        let child = self.store.read_node(node.children[idx])?;
        let child = if child.is_full() {
            self.split_child(&mut node, idx)?;
            // The median just moved up into this node; an incoming key
            // greater than it belongs in the new right sibling.
            if key > node.keys[idx] {
                idx += 1;
            }
            self.store.read_node(node.children[idx])?
        } else {
            child
        };
        self.insert_nonfull(child, key, value)
    }

    /// Split the full child at `index`, promoting its median pair into
    /// `parent`. All touched nodes are persisted before returning.
    fn split_child(&mut self, parent: &mut Node, index: usize) -> Result<()> {
        let left_id = parent.children[index];
        let mut left = self.store.read_node(left_id)?;
        let right_id = self.store.allocate_block()?;
        let mut right = Node::new(right_id, parent.block_id);

        let mid = DEGREE - 1;
        let mid_key = left.keys[mid];
        let mid_value = left.values[mid];

        right.keys = left.keys.split_off(mid + 1);
        right.values = left.values.split_off(mid + 1);
        left.keys.pop();
        left.values.pop();

        if !left.is_leaf() {
            right.children = left.children.split_off(mid + 1);
            for i in 0..right.children.len() {
                let mut adopted = self.store.read_node(right.children[i])?;
                adopted.parent_id = right_id;
                self.store.write_node(&adopted)?;
            }
        }
        left.parent_id = parent.block_id;

        parent.keys.insert(index, mid_key);
        parent.values.insert(index, mid_value);
        parent.children.insert(index + 1, right_id);

        self.store.write_node(&left)?;
        self.store.write_node(&right)?;
        self.store.write_node(parent)?;
        trace!(
            parent = parent.block_id.0,
            left = left_id.0,
            right = right_id.0,
            promoted = mid_key,
            "tree.split_child"
        );
        Ok(())
    }

    fn collect_into(&mut self, id: BlockId, pairs: &mut Vec<(u64, u64)>) -> Result<()> {
        let node = self.store.read_node(id)?;
        if node.is_leaf() {
            pairs.extend(node.keys.iter().copied().zip(node.values.iter().copied()));
            return Ok(());
        }
        for i in 0..node.keys.len() {
            self.collect_into(node.children[i], pairs)?;
            pairs.push((node.keys[i], node.values[i]));
        }
        self.collect_into(node.children[node.keys.len()], pairs)
    }

    #[allow(clippy::too_many_arguments)]
    fn verify_node(
        &mut self,
        id: BlockId,
        parent: BlockId,
        depth: u64,
        lower: Option<u64>,
        upper: Option<u64>,
        leaf_depth: &mut Option<u64>,
        findings: &mut Vec<String>,
    ) -> Result<()> {
        if id.is_null() || id.0 >= self.store.next_block_id().0 {
            findings.push(format!("block {id} outside the allocated range"));
            return Ok(());
        }
        let node = self.store.read_node(id)?;

        if node.parent_id != parent {
            findings.push(format!(
                "block {id} records parent {} instead of {parent}",
                node.parent_id
            ));
        }
        if node.keys.is_empty() {
            findings.push(format!("block {id} holds no keys"));
        }
        if !parent.is_null() && node.keys.len() < DEGREE - 1 {
            findings.push(format!(
                "block {id} holds {} keys, below the non-root minimum",
                node.keys.len()
            ));
        }
        for window in node.keys.windows(2) {
            if window[0] >= window[1] {
                findings.push(format!("block {id} keys out of order at {}", window[1]));
            }
        }
        if let Some(lower) = lower {
            if node.keys.first().is_some_and(|&k| k <= lower) {
                findings.push(format!("block {id} leaks keys below separator {lower}"));
            }
        }
        if let Some(upper) = upper {
            if node.keys.last().is_some_and(|&k| k >= upper) {
                findings.push(format!("block {id} leaks keys above separator {upper}"));
            }
        }

        if node.is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    findings.push(format!(
                        "leaf {id} sits at depth {depth}, others at {expected}"
                    ));
                }
                Some(_) => {}
            }
            return Ok(());
        }

        for i in 0..node.children.len() {
            let lower = if i == 0 { lower } else { Some(node.keys[i - 1]) };
            let upper = if i == node.keys.len() {
                upper
            } else {
                Some(node.keys[i])
            };
            self.verify_node(
                node.children[i],
                id,
                depth + 1,
                lower,
                upper,
                leaf_depth,
                findings,
            )?;
        }
        Ok(())
    }
}
