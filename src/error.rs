use thiserror::Error;

/// Failures surfaced by the allocation entry points.
///
/// Neither variant leaves a partial effect behind: no header is written and
/// no free list is touched before the failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The heap could not be extended or the large-span allocator refused.
    #[error("out of memory")]
    OutOfMemory,
    /// `count * size` does not fit in the address space.
    #[error("allocation size overflows: {count} * {size}")]
    SizeOverflow { count: usize, size: usize },
}

/// A pointer handed back to the allocator that it could not have produced.
///
/// Only detected when the release guard is enabled; otherwise these are
/// undefined behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("header {word:#x} is neither a pool block nor a large allocation")]
    InvalidHeader { word: usize },
    #[error("block of {block_size} bytes released twice")]
    DoubleFree { block_size: usize },
}
