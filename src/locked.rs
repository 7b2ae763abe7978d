use super::allocator::MultiPool;
use super::backend::Backend;
use super::constants::MIN_ALIGN;
use super::error::AllocError;
use super::stats::PoolStats;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

/// A [`MultiPool`] behind a spin lock, usable from any thread and as the
/// global allocator.
///
/// One lock guards every class. Neither the lock nor anything done while it
/// is held allocates or logs, so the pool can back the allocator its own
/// waiters and the installed logger would use.
pub struct LockedPool<B: Backend>(spin::Mutex<MultiPool<B>>);

impl<B: Backend> LockedPool<B> {
    pub const fn new(pool: MultiPool<B>) -> Self {
        Self(spin::Mutex::new(pool.defer_events(true)))
    }

    /// Runs `f` with exclusive access to the pool, then logs whatever it
    /// reported after the lock is released.
    pub fn with<R>(&self, f: impl FnOnce(&mut MultiPool<B>) -> R) -> R {
        let (result, events) = {
            let mut pool = self.0.lock();
            let result = f(&mut *pool);

            (result, pool.take_events())
        };

        events.log();
        result
    }

    pub fn allocate(&self, size: usize) -> Result<Option<NonNull<u8>>, AllocError> {
        self.with(|pool| pool.allocate(size))
    }

    pub fn zero_allocate(
        &self,
        count: usize,
        size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        self.with(|pool| pool.zero_allocate(count, size))
    }

    /// # Safety
    /// See [`MultiPool::resize`].
    pub unsafe fn resize(
        &self,
        ptr: *mut u8,
        size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        self.with(|pool| pool.resize(ptr, size))
    }

    /// # Safety
    /// See [`MultiPool::release`].
    pub unsafe fn release(&self, ptr: *mut u8) {
        self.with(|pool| pool.release(ptr))
    }

    pub fn stats(&self) -> PoolStats {
        self.0.lock().stats()
    }

    pub fn into_inner(self) -> MultiPool<B> {
        self.0.into_inner().defer_events(false)
    }
}

pub(crate) fn into_raw(result: Result<Option<NonNull<u8>>, AllocError>) -> *mut u8 {
    match result {
        Ok(Some(ptr)) => ptr.as_ptr(),
        Ok(None) | Err(_) => ptr::null_mut(),
    }
}

// Payloads are only word aligned; stricter layouts are refused.
unsafe impl<B: Backend + Send> GlobalAlloc for LockedPool<B> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > MIN_ALIGN {
            return ptr::null_mut();
        }

        into_raw(self.allocate(layout.size()))
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > MIN_ALIGN {
            return ptr::null_mut();
        }

        into_raw(self.zero_allocate(1, layout.size()))
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.release(ptr)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > MIN_ALIGN {
            return ptr::null_mut();
        }

        into_raw(self.resize(ptr, new_size))
    }
}
