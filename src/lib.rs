//! A multi-pool allocator: segregated LIFO free lists over power-of-two size
//! classes, refilled one 4096-byte heap extension at a time, with requests
//! above 4088 bytes sent straight to a large-span allocator.
//!
//! ```text
//!   payload pointer ──────────┐
//!                             ▼
//!   ┌──────────────┬───────────────────────────────┐
//!   │ size (8 B)   │ payload / next-free link      │   one block, 2^k bytes
//!   └──────────────┴───────────────────────────────┘
//! ```
//!
//! Pool blocks record their block size in the header, large objects record
//! their payload size; anything above 4096 reads back as a large object.
//!
//! [`MultiPool`] is the single-threaded context and works over any
//! [`Backend`]. [`LockedPool`] puts one behind a spin lock and implements
//! `GlobalAlloc`. On unix the crate-root functions drive a process-wide
//! pool over the program break and anonymous mappings, returning null on
//! failure like their C counterparts.

#[cfg(not(target_pointer_width = "64"))]
compile_error!("multipool stores 8-byte headers and supports only 64-bit targets.");

mod allocator;
mod backend;
mod chunk;
mod config;
mod constants;
mod error;
mod event;
mod free_list;
mod header;
mod large;
mod locked;
mod size_class;
mod stats;

pub use allocator::MultiPool;
pub use backend::{ArenaBackend, Backend};
#[cfg(unix)]
pub use backend::SystemBackend;
pub use config::{Config, ReleaseGuard};
pub use constants::{CHUNK_SIZE, HEADER_SIZE, MIN_ALIGN, POOL_CEILING};
pub use error::{AllocError, UsageError};
pub use header::Header;
pub use locked::LockedPool;
pub use size_class::{block_index, SizeClass};
pub use stats::PoolStats;

#[cfg(unix)]
static GLOBAL: LockedPool<SystemBackend> = LockedPool::new(MultiPool::new(SystemBackend::new()));

/// Allocates `size` bytes from the process-wide pool; null for zero bytes
/// or when memory runs out.
#[cfg(unix)]
pub fn allocate(size: usize) -> *mut u8 {
    locked::into_raw(GLOBAL.allocate(size))
}

/// Allocates `count * size` zeroed bytes; null for zero, overflow or when
/// memory runs out.
#[cfg(unix)]
pub fn zero_allocate(count: usize, size: usize) -> *mut u8 {
    locked::into_raw(GLOBAL.zero_allocate(count, size))
}

/// Resizes an allocation from the process-wide pool.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by this module's functions.
#[cfg(unix)]
pub unsafe fn resize(ptr: *mut u8, size: usize) -> *mut u8 {
    locked::into_raw(GLOBAL.resize(ptr, size))
}

/// Releases an allocation from the process-wide pool.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by this module's functions.
#[cfg(unix)]
pub unsafe fn release(ptr: *mut u8) {
    GLOBAL.release(ptr)
}

/// Counters of the process-wide pool.
#[cfg(unix)]
pub fn stats() -> PoolStats {
    GLOBAL.stats()
}
