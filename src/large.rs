use crate::backend::Backend;
use crate::constants::{HEADER_SIZE, LARGE_HEADER_MIN};
use crate::error::AllocError;
use crate::header::{payload_of, raw_of, write_header};
use core::ptr::NonNull;

/// Header value recorded for a large payload of `size` bytes.
///
/// Payloads just above the pool ceiling are recorded as `LARGE_HEADER_MIN`
/// so their header cannot be mistaken for a pool block.
pub(crate) fn recorded_size(size: usize) -> usize {
    size.max(LARGE_HEADER_MIN)
}

/// Length of the span backing a large object with header `recorded`.
pub(crate) fn span_size(recorded: usize) -> Option<usize> {
    recorded.checked_add(HEADER_SIZE)
}

pub(crate) fn allocate<B: Backend>(
    backend: &mut B,
    size: usize,
) -> Result<NonNull<u8>, AllocError> {
    let recorded = recorded_size(size);
    let span = span_size(recorded).ok_or(AllocError::OutOfMemory)?;

    let raw = backend.large_alloc(span).ok_or(AllocError::OutOfMemory)?;

    unsafe {
        write_header(raw, recorded);
        Ok(payload_of(raw))
    }
}

/// # Safety
/// `payload` must be a live large allocation whose header reads `recorded`.
pub(crate) unsafe fn release<B: Backend>(backend: &mut B, payload: NonNull<u8>, recorded: usize) {
    // recorded + HEADER_SIZE succeeded at allocation time
    backend.large_free(raw_of(payload), recorded + HEADER_SIZE);
}
