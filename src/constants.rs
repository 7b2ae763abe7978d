/// Width of the size word stored in front of every payload.
pub const HEADER_SIZE: usize = 8;

/// Granularity of every heap extension; one chunk is carved into one class.
pub const CHUNK_SIZE: usize = 1 << 12;

/// Largest payload served from a size class: payload + header must fit a chunk.
pub const POOL_CEILING: usize = CHUNK_SIZE - HEADER_SIZE;

/// log2 of the smallest pooled block (32 bytes).
pub const MIN_CLASS: u8 = 5;

/// log2 of the largest pooled block (one whole chunk).
pub const MAX_CLASS: u8 = 12;

/// Slots in the class table, indexed directly by log2 of the block size.
pub const CLASS_SLOTS: usize = MAX_CLASS as usize + 1;

/// Smallest value a large-object header may hold. Anything at or below
/// `CHUNK_SIZE` reads back as a pooled block.
pub const LARGE_HEADER_MIN: usize = CHUNK_SIZE + 1;

/// Set in the header of a free pooled block when the release guard is on.
pub const FREE_TAG: usize = 1 << (usize::BITS - 1);

/// Alignment of every payload pointer handed out.
pub const MIN_ALIGN: usize = HEADER_SIZE;
