use crate::constants::{CHUNK_SIZE, HEADER_SIZE, MAX_CLASS, MIN_CLASS, POOL_CEILING};

/// log2 of the block needed for a `size`-byte payload, header included.
///
/// Only meaningful for `size <= POOL_CEILING`.
pub fn block_index(size: usize) -> u32 {
    debug_assert!(size <= POOL_CEILING);

    if size <= HEADER_SIZE {
        MIN_CLASS as u32
    } else {
        u32::BITS - (size as u32 + 7).leading_zeros()
    }
}

/// A power-of-two block size in `32..=4096`, stored as its log2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass(u8);

impl SizeClass {
    pub const MIN: SizeClass = SizeClass(MIN_CLASS);
    pub const MAX: SizeClass = SizeClass(MAX_CLASS);

    /// The class serving a `size`-byte payload, or `None` when the request
    /// is empty or belongs on the large-object path.
    pub fn for_request(size: usize) -> Option<SizeClass> {
        if size == 0 || size > POOL_CEILING {
            return None;
        }

        Some(SizeClass(block_index(size) as u8))
    }

    /// Recovers the class from a block size read out of a header.
    pub fn from_block_size(block_size: usize) -> Option<SizeClass> {
        if !block_size.is_power_of_two() {
            return None;
        }

        let log2 = block_size.trailing_zeros() as u8;

        (MIN_CLASS..=MAX_CLASS)
            .contains(&log2)
            .then_some(SizeClass(log2))
    }

    pub(crate) const fn from_log2_unchecked(log2: u8) -> SizeClass {
        SizeClass(log2)
    }

    pub fn all() -> impl Iterator<Item = SizeClass> {
        (MIN_CLASS..=MAX_CLASS).map(SizeClass)
    }

    pub const fn log2(self) -> u8 {
        self.0
    }

    /// Slot in the class table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Total block size, header included.
    pub const fn block_size(self) -> usize {
        1 << self.0
    }

    /// Bytes a caller may use behind the payload pointer.
    pub const fn usable_size(self) -> usize {
        self.block_size() - HEADER_SIZE
    }

    pub const fn blocks_per_chunk(self) -> usize {
        CHUNK_SIZE >> self.0
    }
}
