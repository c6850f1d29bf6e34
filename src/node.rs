//! Fixed-layout codec between tree nodes and 512-byte blocks.
//!
//! All integers are unsigned 64-bit, big-endian. A node block stores a
//! three-field header followed by fixed slot arrays; unused trailing slots
//! are always zero. Byte offsets are given by the constants in [`layout`].

use crate::error::{IndexError, Result};
use crate::types::{BlockId, BLOCK_SIZE, MAX_CHILDREN, MAX_KEYS};

/// Byte ranges of the node block fields.
pub mod layout {
    use core::ops::Range;

    /// Id of the block itself, for self-checks on read.
    pub const BLOCK_ID: Range<usize> = 0..8;
    /// Id of the parent block, zero for the root.
    pub const PARENT_ID: Range<usize> = 8..16;
    /// Number of occupied key/value slots.
    pub const KEY_COUNT: Range<usize> = 16..24;
    /// 19 key slots of 8 bytes each.
    pub const KEYS: Range<usize> = 24..176;
    /// 19 value slots of 8 bytes each.
    pub const VALUES: Range<usize> = 176..328;
    /// 20 child-id slots of 8 bytes each.
    pub const CHILDREN: Range<usize> = 328..488;
    /// Zero padding to the end of the block.
    pub const PAD: Range<usize> = 488..512;
}

fn slot(base: core::ops::Range<usize>, index: usize) -> core::ops::Range<usize> {
    let start = base.start + index * 8;
    start..start + 8
}

fn read_u64(src: &[u8], range: core::ops::Range<usize>) -> u64 {
    u64::from_be_bytes(src[range].try_into().unwrap())
}

/// One tree node in its decoded form.
///
/// `keys` and `values` are parallel and always the same length. `children`
/// is empty for a leaf and `keys.len() + 1` long for an internal node;
/// leaf-ness is exactly `children.is_empty()`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    /// Block this node lives in.
    pub block_id: BlockId,
    /// Parent block, null for the root.
    pub parent_id: BlockId,
    /// Sorted, distinct keys.
    pub keys: Vec<u64>,
    /// Values parallel to `keys`.
    pub values: Vec<u64>,
    /// Child block ids, empty for a leaf.
    pub children: Vec<BlockId>,
}

impl Node {
    /// Fresh empty leaf.
    pub fn new(block_id: BlockId, parent_id: BlockId) -> Self {
        Self {
            block_id,
            parent_id,
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    /// True when the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// True when every key slot is occupied.
    pub fn is_full(&self) -> bool {
        self.keys.len() == MAX_KEYS
    }

    /// Serialize into a block buffer, zero-filling unused slots.
    pub fn encode(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() < BLOCK_SIZE {
            return Err(IndexError::Corruption("node buffer too small"));
        }
        if self.keys.len() > MAX_KEYS {
            return Err(IndexError::Corruption("node holds too many keys"));
        }
        if self.values.len() != self.keys.len() {
            return Err(IndexError::Corruption("key/value arity mismatch"));
        }
        if !self.children.is_empty() && self.children.len() != self.keys.len() + 1 {
            return Err(IndexError::Corruption("child arity mismatch"));
        }
        let block = &mut dst[..BLOCK_SIZE];
        block.fill(0);
        block[layout::BLOCK_ID].copy_from_slice(&self.block_id.0.to_be_bytes());
        block[layout::PARENT_ID].copy_from_slice(&self.parent_id.0.to_be_bytes());
        block[layout::KEY_COUNT].copy_from_slice(&(self.keys.len() as u64).to_be_bytes());
        for (i, key) in self.keys.iter().enumerate() {
            block[slot(layout::KEYS, i)].copy_from_slice(&key.to_be_bytes());
        }
        for (i, value) in self.values.iter().enumerate() {
            block[slot(layout::VALUES, i)].copy_from_slice(&value.to_be_bytes());
        }
        for (i, child) in self.children.iter().enumerate() {
            block[slot(layout::CHILDREN, i)].copy_from_slice(&child.0.to_be_bytes());
        }
        Ok(())
    }

    /// Deserialize from a block buffer.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < BLOCK_SIZE {
            return Err(IndexError::Corruption("node block truncated"));
        }
        let block = &src[..BLOCK_SIZE];
        let block_id = BlockId(read_u64(block, layout::BLOCK_ID));
        let parent_id = BlockId(read_u64(block, layout::PARENT_ID));
        let key_count = read_u64(block, layout::KEY_COUNT);
        if key_count > MAX_KEYS as u64 {
            return Err(IndexError::Corruption("key count exceeds node capacity"));
        }
        let key_count = key_count as usize;

        let mut keys = Vec::with_capacity(key_count);
        let mut values = Vec::with_capacity(key_count);
        for i in 0..key_count {
            keys.push(read_u64(block, slot(layout::KEYS, i)));
            values.push(read_u64(block, slot(layout::VALUES, i)));
        }

        let mut slots = [BlockId(0); MAX_CHILDREN];
        for (i, child) in slots.iter_mut().enumerate() {
            *child = BlockId(read_u64(block, slot(layout::CHILDREN, i)));
        }
        let children = if slots.iter().any(|c| !c.is_null()) {
            let children: Vec<BlockId> = slots[..key_count + 1].to_vec();
            if children.iter().any(|c| c.is_null()) {
                return Err(IndexError::Corruption("internal node with null child"));
            }
            children
        } else {
            Vec::new()
        };

        Ok(Self {
            block_id,
            parent_id,
            keys,
            values,
            children,
        })
    }
}
