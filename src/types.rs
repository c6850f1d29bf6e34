use std::fmt;

/// Size of every block in the index file, header included.
pub const BLOCK_SIZE: usize = 512;

/// Minimum degree of the tree (T).
pub const DEGREE: usize = 10;

/// Maximum keys per node (2T - 1).
pub const MAX_KEYS: usize = 2 * DEGREE - 1;

/// Maximum children per node (2T).
pub const MAX_CHILDREN: usize = 2 * DEGREE;

/// Block 0 holds the file header, so id 0 doubles as the null sentinel
/// in root and child slots.
pub const NULL_BLOCK: BlockId = BlockId(0);

/// Identity of one 512-byte block in the index file.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct BlockId(pub u64);

impl BlockId {
    /// True for the reserved header/sentinel id.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Byte offset of this block in the file.
    pub fn offset(self) -> Option<u64> {
        self.0.checked_mul(BLOCK_SIZE as u64)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlockId {
    fn from(value: u64) -> Self {
        BlockId(value)
    }
}

impl From<BlockId> for u64 {
    fn from(value: BlockId) -> Self {
        value.0
    }
}
