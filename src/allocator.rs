use super::backend::Backend;
use super::chunk::Chunk;
use super::config::{Config, ReleaseGuard};
use super::constants::{FREE_TAG, HEADER_SIZE};
use super::error::{AllocError, UsageError};
use super::event::{Event, Events};
use super::free_list::{ClassTable, FreeBlock};
use super::header::{payload_of, raw_of, read_header, Header};
use super::large;
use super::size_class::SizeClass;
use super::stats::PoolStats;
use core::mem::size_of;
use core::ptr::{self, NonNull};
use log::error;

/// A multi-pool allocator context: one LIFO free list per power-of-two
/// class, refilled a chunk at a time, plus a large-object path.
///
/// Every payload handed out is preceded by an 8-byte size word, so release
/// and resize recover the class or the large size from the pointer alone.
///
/// The context is single-threaded: every entry point takes `&mut self`.
/// Share it between threads through [`LockedPool`](crate::LockedPool).
///
/// Refills, large spans and failures are reported through `log` when the
/// entry point returns. Inside a `LockedPool` they are queued instead and
/// logged once the lock is released.
pub struct MultiPool<B: Backend> {
    backend: B,
    table: ClassTable,
    config: Config,
    stats: PoolStats,
    events: Events,
    defer: bool,
}

// The table only points into memory owned by the pool itself.
unsafe impl<B: Backend + Send> Send for MultiPool<B> {}

impl<B: Backend> MultiPool<B> {
    pub const fn new(backend: B) -> Self {
        Self::with_config(backend, Config::new())
    }

    pub const fn with_config(backend: B, config: Config) -> Self {
        Self {
            backend,
            table: ClassTable::new(),
            config,
            stats: PoolStats::new(),
            events: Events::new(),
            defer: false,
        }
    }

    /// Allocates `size` bytes. Zero bytes allocates nothing and yields `None`.
    pub fn allocate(&mut self, size: usize) -> Result<Option<NonNull<u8>>, AllocError> {
        if size == 0 {
            return Ok(None);
        }

        let result = self.allocate_nonzero(size);
        self.publish();

        result.map(Some)
    }

    /// Allocates `count * size` zeroed bytes.
    pub fn zero_allocate(
        &mut self,
        count: usize,
        size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let total = count
            .checked_mul(size)
            .ok_or(AllocError::SizeOverflow { count, size })?;

        let Some(ptr) = self.allocate(total)? else {
            return Ok(None);
        };

        unsafe { ptr.as_ptr().write_bytes(0, total) };

        Ok(Some(ptr))
    }

    /// Grows `ptr` to hold `size` bytes, moving it only when its block is
    /// too small. A null `ptr` allocates; a zero `size` releases and yields
    /// `None`. On failure the original allocation is left intact.
    ///
    /// # Safety
    /// `ptr` must be null or live and produced by this pool.
    pub unsafe fn resize(
        &mut self,
        ptr: *mut u8,
        size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let Some(old) = NonNull::new(ptr) else {
            return self.allocate(size);
        };

        if size == 0 {
            self.release(ptr);
            return Ok(None);
        }

        let capacity = self.header_of(old).usable_size();

        if size <= capacity {
            return Ok(Some(old));
        }

        let new = self.allocate_nonzero(size);
        self.publish();
        let new = new?;

        ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), capacity.min(size));
        self.release(ptr);

        Ok(Some(new))
    }

    /// Returns an allocation to its pool, or its span to the backend.
    ///
    /// # Safety
    /// `ptr` must be null or live and produced by this pool. Releasing twice
    /// is undefined behavior unless the guard is on, in which case a second
    /// release of a pool block aborts.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };

        match self.header_of(payload) {
            Header::Pool(class) => self.pool_release(payload, class),
            Header::Large(recorded) => {
                let span = raw_of(payload).as_ptr() as usize;
                let len = recorded + HEADER_SIZE;

                large::release(&mut self.backend, payload, recorded);

                self.stats.large_live = self.stats.large_live.saturating_sub(1);
                self.stats.large_bytes = self.stats.large_bytes.saturating_sub(len);
                self.events.push(Event::LargeReleased { span, len });
            }
        }

        self.publish();
    }

    /// Bytes usable behind `ptr`; zero for null.
    ///
    /// # Safety
    /// Same contract as [`release`](Self::release).
    pub unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
        NonNull::new(ptr).map_or(0, |payload| self.header_of(payload).usable_size())
    }

    /// Decodes the header in front of `ptr` without trusting it.
    ///
    /// # Safety
    /// The word before `ptr` must be readable.
    pub unsafe fn inspect(&self, ptr: NonNull<u8>) -> Result<Header, UsageError> {
        Header::decode(read_header(ptr))
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = self.stats;

        for class in SizeClass::all() {
            stats.free_blocks[class.index()] = self.table.list(class).len();
        }

        stats
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Queue events until [`take_events`](Self::take_events) instead of
    /// logging them from inside the entry points.
    pub(crate) const fn defer_events(mut self, defer: bool) -> Self {
        self.defer = defer;
        self
    }

    pub(crate) fn take_events(&mut self) -> Events {
        self.events.take()
    }

    fn publish(&mut self) {
        if !self.defer {
            self.events.take().log();
        }
    }

    fn allocate_nonzero(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let result = match SizeClass::for_request(size) {
            Some(class) => self.pool_alloc(class),
            None => self.large_alloc(size),
        };

        if result.is_err() {
            self.stats.failures += 1;
        }

        result
    }

    fn pool_alloc(&mut self, class: SizeClass) -> Result<NonNull<u8>, AllocError> {
        if self.table.list(class).is_empty() {
            self.refill(class)?;
        }

        let block = unsafe { self.table.list_mut(class).pop() }.ok_or(AllocError::OutOfMemory)?;

        unsafe { (*block.as_ptr()).header = class.block_size() };
        self.stats.live_blocks[class.index()] += 1;

        Ok(unsafe { payload_of(block.cast()) })
    }

    fn refill(&mut self, class: SizeClass) -> Result<(), AllocError> {
        let chunk = Chunk::obtain(&mut self.backend)
            .inspect_err(|_| self.events.push(Event::HeapExhausted))?;
        let carved = chunk.carve(class, self.free_tag());

        unsafe { self.table.list_mut(class).install(carved.head, carved.blocks) };
        self.stats.chunks += 1;
        self.events.push(Event::Carved {
            chunk: carved.head.as_ptr() as usize,
            class,
        });

        Ok(())
    }

    fn large_alloc(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let payload = large::allocate(&mut self.backend, size)
            .inspect_err(|_| self.events.push(Event::LargeRefused { size }))?;
        let span = large::recorded_size(size) + HEADER_SIZE;

        self.stats.large_live += 1;
        self.stats.large_bytes += span;
        self.events.push(Event::LargeSpan {
            span: unsafe { raw_of(payload) }.as_ptr() as usize,
            len: span,
        });

        Ok(payload)
    }

    unsafe fn pool_release(&mut self, payload: NonNull<u8>, class: SizeClass) {
        if self.config.zero_on_release {
            let link = size_of::<*mut FreeBlock>();

            payload.as_ptr().add(link).write_bytes(0, class.usable_size() - link);
        }

        let block = raw_of(payload).cast::<FreeBlock>();

        (*block.as_ptr()).header = class.block_size() | self.free_tag();
        self.table.list_mut(class).push(block);

        let live = &mut self.stats.live_blocks[class.index()];
        *live = live.saturating_sub(1);
    }

    unsafe fn header_of(&self, payload: NonNull<u8>) -> Header {
        let word = read_header(payload);

        match self.config.guard {
            ReleaseGuard::Unchecked => Header::decode_unchecked(word),
            ReleaseGuard::Abort => {
                Header::decode(word).unwrap_or_else(|err| misuse(payload, err, self.defer))
            }
        }
    }

    fn free_tag(&self) -> usize {
        match self.config.guard {
            ReleaseGuard::Unchecked => 0,
            ReleaseGuard::Abort => FREE_TAG,
        }
    }
}

#[cold]
fn misuse(payload: NonNull<u8>, err: UsageError, locked: bool) -> ! {
    if locked {
        // A logger could allocate through the lock we hold; stderr does not.
        eprintln!("multipool: bad pointer {:p} handed back to the pool: {}", payload, err);
    } else {
        error!("bad pointer {:p} handed back to the pool: {}", payload, err);
    }

    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ArenaBackend;
    use crate::constants::CHUNK_SIZE;

    fn pool(chunks: usize) -> MultiPool<ArenaBackend> {
        MultiPool::new(ArenaBackend::with_capacity(chunks * CHUNK_SIZE))
    }

    #[test]
    fn miss_carves_one_chunk() {
        let mut pool = pool(4);
        let class = SizeClass::for_request(100).unwrap();

        pool.allocate(100).unwrap().unwrap();

        let stats = pool.stats();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.live(class), 1);
        assert_eq!(stats.free(class), class.blocks_per_chunk() - 1);
        assert_eq!(pool.backend().heap_used(), CHUNK_SIZE);
    }

    #[test]
    fn hits_do_not_extend_the_heap() {
        let mut pool = pool(1);

        for _ in 0..SizeClass::MIN.blocks_per_chunk() {
            pool.allocate(8).unwrap().unwrap();
        }

        assert_eq!(pool.stats().chunks, 1);
        assert_eq!(pool.stats().free(SizeClass::MIN), 0);
        assert_eq!(pool.allocate(8), Err(AllocError::OutOfMemory));
    }

    #[test]
    fn blocks_come_out_in_address_order() {
        let mut pool = pool(1);
        let a = pool.allocate(50).unwrap().unwrap().as_ptr() as usize;
        let b = pool.allocate(50).unwrap().unwrap().as_ptr() as usize;

        assert_eq!(b - a, 64);
    }

    #[test]
    fn failed_refill_leaves_no_trace() {
        let mut pool = pool(0);
        let before = pool.stats();

        assert_eq!(pool.allocate(16), Err(AllocError::OutOfMemory));

        let after = pool.stats();
        assert_eq!(after.chunks, before.chunks);
        assert_eq!(after.carved_blocks(), 0);
        assert_eq!(after.failures, 1);
    }

    #[test]
    fn release_counts_back() {
        let mut pool = pool(1);
        let class = SizeClass::for_request(200).unwrap();
        let ptr = pool.allocate(200).unwrap().unwrap();

        unsafe { pool.release(ptr.as_ptr()) };

        let stats = pool.stats();
        assert_eq!(stats.live(class), 0);
        assert_eq!(stats.free(class), class.blocks_per_chunk());
    }

    #[test]
    fn guard_tags_free_blocks() {
        let mut pool = MultiPool::with_config(
            ArenaBackend::with_capacity(CHUNK_SIZE),
            Config::new().with_guard(ReleaseGuard::Abort),
        );
        let ptr = pool.allocate(20).unwrap().unwrap();

        unsafe {
            assert_eq!(pool.inspect(ptr), Ok(Header::Pool(SizeClass::MIN)));
            pool.release(ptr.as_ptr());
            assert_eq!(pool.inspect(ptr), Err(UsageError::DoubleFree { block_size: 32 }));
        }

        let again = pool.allocate(20).unwrap().unwrap();
        assert_eq!(again, ptr);
        unsafe { assert_eq!(pool.inspect(again), Ok(Header::Pool(SizeClass::MIN))) };
    }

    #[test]
    fn unchecked_pool_keeps_plain_headers() {
        let mut pool = pool(1);
        let ptr = pool.allocate(20).unwrap().unwrap();

        unsafe {
            pool.release(ptr.as_ptr());
            assert_eq!(read_header(ptr), 32);
        }
    }

    #[test]
    fn zero_on_release_scrubs_payload() {
        let mut pool = MultiPool::with_config(
            ArenaBackend::with_capacity(CHUNK_SIZE),
            Config::new().with_zero_on_release(true),
        );
        let class = SizeClass::for_request(60).unwrap();
        let ptr = pool.allocate(60).unwrap().unwrap();

        unsafe {
            ptr.as_ptr().write_bytes(0xEE, 60);
            pool.release(ptr.as_ptr());

            let link = size_of::<usize>();
            let tail =
                core::slice::from_raw_parts(ptr.as_ptr().add(link), class.usable_size() - link);
            assert!(tail.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn usable_size_per_path() {
        let mut pool = pool(1);
        let small = pool.allocate(10).unwrap().unwrap();
        let large = pool.allocate(10_000).unwrap().unwrap();

        unsafe {
            assert_eq!(pool.usable_size(small.as_ptr()), 24);
            assert_eq!(pool.usable_size(large.as_ptr()), 10_000);
            assert_eq!(pool.usable_size(ptr::null_mut()), 0);

            pool.release(large.as_ptr());
        }

        assert_eq!(pool.stats().large_live, 0);
        assert_eq!(pool.stats().large_bytes, 0);
    }

    #[test]
    fn deferred_pool_queues_events() {
        let mut pool = pool(1).defer_events(true);

        let small = pool.allocate(100).unwrap().unwrap();
        let large = pool.allocate(5000).unwrap().unwrap();
        unsafe { pool.release(large.as_ptr()) };
        assert_eq!(pool.allocate(8), Err(AllocError::OutOfMemory));

        let chunk = small.as_ptr() as usize - HEADER_SIZE;
        let span = large.as_ptr() as usize - HEADER_SIZE;
        let events: Vec<_> = pool.take_events().iter().collect();

        assert_eq!(
            events,
            vec![
                Event::Carved { chunk, class: SizeClass::for_request(100).unwrap() },
                Event::LargeSpan { span, len: 5008 },
                Event::LargeReleased { span, len: 5008 },
                Event::HeapExhausted,
            ]
        );
        assert_eq!(pool.take_events().iter().count(), 0);
    }

    #[test]
    fn standalone_pool_logs_as_it_goes() {
        let mut pool = pool(1);

        pool.allocate(100).unwrap().unwrap();
        assert_eq!(pool.allocate(5000).map(|p| p.is_some()), Ok(true));

        assert_eq!(pool.take_events().iter().count(), 0);
    }

    #[test]
    fn exhausting_the_backend_directly() {
        let mut pool = pool(2);
        let capacity = pool.backend().capacity();

        assert_eq!(pool.config().guard, ReleaseGuard::Unchecked);
        assert!(pool.backend_mut().extend_heap(capacity).is_some());
        assert_eq!(pool.backend().heap_used(), 2 * CHUNK_SIZE);

        assert_eq!(pool.allocate(16), Err(AllocError::OutOfMemory));
        assert_eq!(pool.stats().chunks, 0);
        assert_eq!(pool.stats().failures, 1);
    }
}
