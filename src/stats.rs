use crate::constants::CLASS_SLOTS;
use crate::size_class::SizeClass;

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Chunks obtained from the heap extension primitive.
    pub chunks: usize,
    /// Pool blocks currently handed out, per class slot.
    pub live_blocks: [usize; CLASS_SLOTS],
    /// Pool blocks sitting on a free list, per class slot.
    pub free_blocks: [usize; CLASS_SLOTS],
    /// Large objects currently handed out.
    pub large_live: usize,
    /// Bytes of large spans currently held, headers included.
    pub large_bytes: usize,
    /// Requests that failed with out of memory.
    pub failures: usize,
}

impl PoolStats {
    pub const fn new() -> Self {
        Self {
            chunks: 0,
            live_blocks: [0; CLASS_SLOTS],
            free_blocks: [0; CLASS_SLOTS],
            large_live: 0,
            large_bytes: 0,
            failures: 0,
        }
    }

    pub fn heap_bytes(&self) -> usize {
        self.chunks * crate::constants::CHUNK_SIZE
    }

    pub fn live(&self, class: SizeClass) -> usize {
        self.live_blocks[class.index()]
    }

    pub fn free(&self, class: SizeClass) -> usize {
        self.free_blocks[class.index()]
    }

    pub fn live_pool_blocks(&self) -> usize {
        self.live_blocks.iter().sum()
    }

    pub fn free_pool_blocks(&self) -> usize {
        self.free_blocks.iter().sum()
    }

    /// Every block ever carved is either live or free.
    pub fn carved_blocks(&self) -> usize {
        self.live_pool_blocks() + self.free_pool_blocks()
    }
}
