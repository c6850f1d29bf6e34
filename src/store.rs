//! Block-level file manager: header block, monotonic allocation, node I/O
//! through a bounded LRU cache, write-through durability.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{IndexError, Result};
use crate::node::Node;
use crate::types::{BlockId, BLOCK_SIZE, NULL_BLOCK};

/// Magic signature at the start of every index file.
pub const MAGIC: &[u8; 8] = b"TANOAK01";

/// Default node cache capacity, in blocks.
pub const DEFAULT_CACHE_BLOCKS: usize = 3;

/// Header block field offsets.
mod header {
    use core::ops::Range;

    pub const MAGIC: Range<usize> = 0..8;
    pub const ROOT_BLOCK_ID: Range<usize> = 8..16;
    pub const NEXT_BLOCK_ID: Range<usize> = 16..24;
}

/// Tunables applied when a store is created or opened.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Node cache capacity in blocks. Values below 1 are clamped to 1.
    pub cache_blocks: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache_blocks: DEFAULT_CACHE_BLOCKS,
        }
    }
}

/// Counters for cache behaviour and block traffic.
#[derive(Default, Clone, Debug, Serialize)]
pub struct StoreStats {
    /// Node reads served from the cache.
    pub hits: u64,
    /// Node reads that went to disk.
    pub misses: u64,
    /// Nodes dropped from the cache to make room.
    pub evictions: u64,
    /// Node blocks written to disk.
    pub writes: u64,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} evictions={} writes={}",
            self.hits, self.misses, self.evictions, self.writes
        )
    }
}

/// Owner of the index file: every node and header read/write goes through
/// here. Mutations are flushed before the call returns, so the file is as
/// durable as the last completed operation.
#[derive(Debug)]
pub struct BlockStore {
    file: File,
    path: PathBuf,
    root: BlockId,
    next_block_id: BlockId,
    cache: LruCache<BlockId, Node>,
    stats: StoreStats,
}

impl BlockStore {
    /// Create a fresh index file. Fails with [`IndexError::AlreadyExists`]
    /// if the path is taken; overwrite policy belongs to the caller.
    pub fn create(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(IndexError::AlreadyExists(path.to_path_buf()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        let mut store = Self {
            file,
            path: path.to_path_buf(),
            root: NULL_BLOCK,
            next_block_id: BlockId(1),
            cache: new_cache(&options),
            stats: StoreStats::default(),
        };
        store.sync_header()?;
        debug!(path = %store.path.display(), "store.create");
        Ok(store)
    }

    /// Open an existing index file, validating its header block.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut block = [0u8; BLOCK_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut block).map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                IndexError::Format("file too small to hold a header block")
            } else {
                IndexError::Io(err)
            }
        })?;
        if &block[header::MAGIC] != MAGIC {
            return Err(IndexError::Format("magic signature mismatch"));
        }
        let root = BlockId(read_u64(&block, header::ROOT_BLOCK_ID));
        let next_block_id = BlockId(read_u64(&block, header::NEXT_BLOCK_ID));
        if next_block_id.0 < 1 {
            return Err(IndexError::Format("next block id below first node block"));
        }
        if !root.is_null() && root.0 >= next_block_id.0 {
            return Err(IndexError::Format("root block id outside allocated range"));
        }

        debug!(
            path = %path.display(),
            root = root.0,
            next = next_block_id.0,
            "store.open"
        );
        Ok(Self {
            file,
            path: path.to_path_buf(),
            root,
            next_block_id,
            cache: new_cache(&options),
            stats: StoreStats::default(),
        })
    }

    /// Hand out the next block id and persist the bumped header.
    ///
    /// The allocation is durable even if the block is never written; a
    /// crash mid-insert leaves a gap, not corruption.
    pub fn allocate_block(&mut self) -> Result<BlockId> {
        let id = self.next_block_id;
        self.next_block_id = BlockId(id.0 + 1);
        self.sync_header()?;
        trace!(block = id.0, "store.block.allocate");
        Ok(id)
    }

    /// Fetch a node, from cache when resident, otherwise from disk.
    pub fn read_node(&mut self, id: BlockId) -> Result<Node> {
        self.check_block_id(id)?;
        if let Some(node) = self.cache.get(&id) {
            self.stats.hits += 1;
            return Ok(node.clone());
        }
        self.stats.misses += 1;

        let mut block = [0u8; BLOCK_SIZE];
        self.file.seek(SeekFrom::Start(block_offset(id)?))?;
        self.file.read_exact(&mut block)?;
        let node = Node::decode(&block)?;
        if node.block_id != id {
            return Err(IndexError::Corruption("block id does not match its slot"));
        }
        self.cache_node(node.clone());
        trace!(block = id.0, "store.block.read");
        Ok(node)
    }

    /// Write a node to its block and flush, then refresh the cache.
    pub fn write_node(&mut self, node: &Node) -> Result<()> {
        self.check_block_id(node.block_id)?;
        let mut block = [0u8; BLOCK_SIZE];
        node.encode(&mut block)?;
        self.file.seek(SeekFrom::Start(block_offset(node.block_id)?))?;
        self.file.write_all(&block)?;
        self.file.sync_data()?;
        self.stats.writes += 1;
        self.cache_node(node.clone());
        trace!(block = node.block_id.0, keys = node.keys.len(), "store.block.write");
        Ok(())
    }

    /// Point the header at a new root and persist it.
    pub fn set_root(&mut self, id: BlockId) -> Result<()> {
        self.root = id;
        self.sync_header()?;
        debug!(root = id.0, "store.root.update");
        Ok(())
    }

    /// Write the header block and flush.
    pub fn sync_header(&mut self) -> Result<()> {
        let mut block = [0u8; BLOCK_SIZE];
        block[header::MAGIC].copy_from_slice(MAGIC);
        block[header::ROOT_BLOCK_ID].copy_from_slice(&self.root.0.to_be_bytes());
        block[header::NEXT_BLOCK_ID].copy_from_slice(&self.next_block_id.0.to_be_bytes());
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&block)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Flush and release the file handle.
    pub fn close(mut self) -> Result<()> {
        self.file.sync_all()?;
        self.cache.clear();
        debug!(path = %self.path.display(), "store.close");
        Ok(())
    }

    /// Current root block id, null while the tree is empty.
    pub fn root(&self) -> BlockId {
        self.root
    }

    /// Next id [`allocate_block`](Self::allocate_block) will hand out.
    pub fn next_block_id(&self) -> BlockId {
        self.next_block_id
    }

    /// Blocks the file logically holds, header block included.
    pub fn block_count(&self) -> u64 {
        self.next_block_id.0
    }

    /// Path the store was created or opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the cache and traffic counters.
    pub fn stats(&self) -> StoreStats {
        self.stats.clone()
    }

    fn check_block_id(&self, id: BlockId) -> Result<()> {
        if id.is_null() || id.0 >= self.next_block_id.0 {
            return Err(IndexError::Corruption("block id outside allocated range"));
        }
        Ok(())
    }

    fn cache_node(&mut self, node: Node) {
        let id = node.block_id;
        if let Some((evicted_id, _)) = self.cache.push(id, node) {
            // push returns the old value when the key was already cached;
            // only a different key leaving counts as an eviction.
            if evicted_id != id {
                self.stats.evictions += 1;
                trace!(block = evicted_id.0, "store.block.evict");
            }
        }
    }
}

fn new_cache(options: &StoreOptions) -> LruCache<BlockId, Node> {
    let capacity = NonZeroUsize::new(options.cache_blocks).unwrap_or(NonZeroUsize::MIN);
    LruCache::new(capacity)
}

fn block_offset(id: BlockId) -> Result<u64> {
    id.offset()
        .ok_or(IndexError::Corruption("block offset overflows u64"))
}

fn read_u64(block: &[u8], range: core::ops::Range<usize>) -> u64 {
    u64::from_be_bytes(block[range].try_into().unwrap())
}
