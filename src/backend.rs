use core::ptr::NonNull;
use crate::constants::{CHUNK_SIZE, MIN_ALIGN};
use log::error;
use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::collections::HashMap;

/// Where a pool gets its memory from.
///
/// # Safety
/// Every region returned must be exclusively owned by the caller, writable
/// for the requested length and aligned to at least `MIN_ALIGN`. Regions
/// from `extend_heap` are never reclaimed by the backend.
pub unsafe trait Backend {
    /// Grows the heap by `increment` bytes, returning the previous boundary.
    fn extend_heap(&mut self, increment: usize) -> Option<NonNull<u8>>;

    /// A region of at least `size` bytes for one large object.
    fn large_alloc(&mut self, size: usize) -> Option<NonNull<u8>>;

    /// Returns a region obtained from `large_alloc`.
    ///
    /// # Safety
    /// `ptr` and `size` must be exactly the pair used when the region was
    /// allocated, and the region must not be used afterwards.
    unsafe fn large_free(&mut self, ptr: NonNull<u8>, size: usize);
}

/// The program break for pool chunks, anonymous mappings for large objects.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend;

#[cfg(unix)]
impl SystemBackend {
    pub const fn new() -> Self {
        SystemBackend
    }
}

#[cfg(unix)]
fn sbrk(increment: usize) -> Option<NonNull<u8>> {
    let increment = libc::intptr_t::try_from(increment).ok()?;
    let prev = unsafe { libc::sbrk(increment) };

    if prev as isize == -1 {
        return None;
    }

    NonNull::new(prev.cast::<u8>())
}

#[cfg(unix)]
unsafe impl Backend for SystemBackend {
    fn extend_heap(&mut self, increment: usize) -> Option<NonNull<u8>> {
        // another sbrk user may have left the break unaligned
        let current = sbrk(0)?;
        let pad = (current.as_ptr() as usize).wrapping_neg() % MIN_ALIGN;

        if pad != 0 {
            sbrk(pad)?;
        }

        sbrk(increment)
    }

    fn large_alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        let ptr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return None;
        }

        NonNull::new(ptr.cast::<u8>())
    }

    unsafe fn large_free(&mut self, ptr: NonNull<u8>, size: usize) {
        if libc::munmap(ptr.as_ptr().cast(), size) != 0 {
            error!("munmap({:p}, {}) failed", ptr, size);
            std::process::abort();
        }
    }
}

/// A bounded heap carved out of one up-front allocation, with large spans
/// served by the global allocator and tracked in a ledger.
///
/// Exhausting the region or the optional span budget reports out of memory,
/// which makes failure paths reproducible. Releasing a span with the wrong
/// pointer or size panics.
pub struct ArenaBackend {
    region: NonNull<u8>,
    capacity: usize,
    brk: usize,
    spans: HashMap<usize, usize>,
    released: Vec<(usize, usize)>,
    span_budget: Option<usize>,
    span_bytes: usize,
}

impl ArenaBackend {
    /// An arena holding at most `capacity` bytes of pool chunks.
    pub fn with_capacity(capacity: usize) -> Self {
        let region = match Self::region_layout(capacity) {
            Some(layout) => {
                let ptr = unsafe { alloc(layout) };

                NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(layout))
            }
            None => NonNull::dangling(),
        };

        Self {
            region,
            capacity,
            brk: 0,
            spans: HashMap::new(),
            released: vec![],
            span_budget: None,
            span_bytes: 0,
        }
    }

    /// Caps the bytes of large spans that may be live at once.
    pub fn with_span_budget(mut self, budget: usize) -> Self {
        self.span_budget = Some(budget);
        self
    }

    fn region_layout(capacity: usize) -> Option<Layout> {
        if capacity == 0 {
            return None;
        }

        Layout::from_size_align(capacity, CHUNK_SIZE).ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes handed out through `extend_heap` so far.
    pub fn heap_used(&self) -> usize {
        self.brk
    }

    /// Whether `ptr` lies inside the heap region.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.region.as_ptr() as usize;
        let addr = ptr as usize;

        addr >= start && addr < start + self.brk
    }

    /// Live large spans as `(address, size)`, lowest address first.
    pub fn live_spans(&self) -> Vec<(usize, usize)> {
        let mut spans: Vec<_> = self.spans.iter().map(|(&addr, &size)| (addr, size)).collect();
        spans.sort_unstable();
        spans
    }

    /// Every `(address, size)` pair passed to `large_free`, in call order.
    pub fn released_spans(&self) -> &[(usize, usize)] {
        &self.released
    }

    fn span_layout(size: usize) -> Option<Layout> {
        Layout::from_size_align(size, MIN_ALIGN).ok()
    }
}

unsafe impl Backend for ArenaBackend {
    fn extend_heap(&mut self, increment: usize) -> Option<NonNull<u8>> {
        let end = self.brk.checked_add(increment)?;

        if end > self.capacity {
            return None;
        }

        let prev = unsafe { self.region.as_ptr().add(self.brk) };
        self.brk = end;

        NonNull::new(prev)
    }

    fn large_alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }

        let total = self.span_bytes.checked_add(size)?;
        if self.span_budget.is_some_and(|budget| total > budget) {
            return None;
        }

        let layout = Self::span_layout(size)?;
        let ptr = NonNull::new(unsafe { alloc(layout) })?;

        self.spans.insert(ptr.as_ptr() as usize, size);
        self.span_bytes = total;

        Some(ptr)
    }

    unsafe fn large_free(&mut self, ptr: NonNull<u8>, size: usize) {
        let addr = ptr.as_ptr() as usize;

        match self.spans.get(&addr).copied() {
            Some(allocated) if allocated == size => {
                self.spans.remove(&addr);
                self.span_bytes -= size;
                self.released.push((addr, size));

                if let Some(layout) = Self::span_layout(size) {
                    dealloc(ptr.as_ptr(), layout);
                }
            }
            Some(allocated) => panic!(
                "large_free({:p}, {}): span was allocated with {} bytes",
                ptr, size, allocated
            ),
            None => panic!("large_free({:p}, {}): not a live span", ptr, size),
        }
    }
}

impl Drop for ArenaBackend {
    fn drop(&mut self) {
        for (&addr, &size) in self.spans.iter() {
            if let Some(layout) = Self::span_layout(size) {
                unsafe { dealloc(addr as *mut u8, layout) };
            }
        }

        if let Some(layout) = Self::region_layout(self.capacity) {
            unsafe { dealloc(self.region.as_ptr(), layout) };
        }
    }
}

unsafe impl Send for ArenaBackend {}
