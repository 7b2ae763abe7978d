use crate::constants::{CHUNK_SIZE, FREE_TAG, HEADER_SIZE};
use crate::error::UsageError;
use crate::size_class::SizeClass;
use core::ptr::NonNull;

/// The size word in front of a payload, decoded.
///
/// Pool headers hold the block size (a power of two up to `CHUNK_SIZE`),
/// large headers hold the recorded payload size (always above `CHUNK_SIZE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    Pool(SizeClass),
    Large(usize),
}

impl Header {
    pub fn encode(self) -> usize {
        match self {
            Header::Pool(class) => class.block_size(),
            Header::Large(size) => size,
        }
    }

    /// Checked decode, used when the release guard is on.
    pub fn decode(word: usize) -> Result<Header, UsageError> {
        if word & FREE_TAG != 0 {
            let block_size = word & !FREE_TAG;

            return match SizeClass::from_block_size(block_size) {
                Some(_) => Err(UsageError::DoubleFree { block_size }),
                None => Err(UsageError::InvalidHeader { word }),
            };
        }

        if word > CHUNK_SIZE {
            return Ok(Header::Large(word));
        }

        SizeClass::from_block_size(word)
            .map(Header::Pool)
            .ok_or(UsageError::InvalidHeader { word })
    }

    /// Trusts the word; garbage in, garbage out.
    pub fn decode_unchecked(word: usize) -> Header {
        if word > CHUNK_SIZE {
            Header::Large(word)
        } else {
            debug_assert!(SizeClass::from_block_size(word).is_some(), "bad header {word:#x}");

            Header::Pool(SizeClass::from_log2_unchecked(word.trailing_zeros() as u8))
        }
    }

    /// Bytes usable behind the payload pointer.
    pub fn usable_size(self) -> usize {
        match self {
            Header::Pool(class) => class.usable_size(),
            Header::Large(size) => size,
        }
    }
}

/// Stores `word` at the start of a block.
///
/// # Safety
/// `raw` must be valid for an aligned `usize` write.
pub unsafe fn write_header(raw: NonNull<u8>, word: usize) {
    raw.cast::<usize>().as_ptr().write(word);
}

/// Reads the word immediately preceding `payload`.
///
/// # Safety
/// `payload` must come from this allocator and still be live.
pub unsafe fn read_header(payload: NonNull<u8>) -> usize {
    raw_of(payload).cast::<usize>().as_ptr().read()
}

/// # Safety
/// `raw` must be the start of a block at least `HEADER_SIZE` long.
pub unsafe fn payload_of(raw: NonNull<u8>) -> NonNull<u8> {
    NonNull::new_unchecked(raw.as_ptr().add(HEADER_SIZE))
}

/// # Safety
/// `payload` must have been produced by [`payload_of`].
pub unsafe fn raw_of(payload: NonNull<u8>) -> NonNull<u8> {
    NonNull::new_unchecked(payload.as_ptr().sub(HEADER_SIZE))
}
