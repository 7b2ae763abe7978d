use crate::constants::CLASS_SLOTS;
use crate::size_class::SizeClass;
use core::ptr::{self, NonNull};

/// Overlay of a block sitting on a free list: the header word, then the
/// successor in the first payload word.
#[repr(C)]
pub(crate) struct FreeBlock {
    pub header: usize,
    pub next: *mut FreeBlock,
}

/// LIFO chain of free blocks of one class, threaded through the blocks
/// themselves.
pub(crate) struct FreeList {
    head: *mut FreeBlock,
    len: usize,
}

impl FreeList {
    pub const EMPTY: FreeList = FreeList {
        head: ptr::null_mut(),
        len: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// # Safety
    /// `block` must be a block of this list's class that is not on any list
    /// and not live.
    pub unsafe fn push(&mut self, block: NonNull<FreeBlock>) {
        (*block.as_ptr()).next = self.head;
        self.head = block.as_ptr();
        self.len += 1;
    }

    /// # Safety
    /// Every block on the list must still be untouched since it was pushed.
    pub unsafe fn pop(&mut self) -> Option<NonNull<FreeBlock>> {
        let block = NonNull::new(self.head)?;

        self.head = (*block.as_ptr()).next;
        self.len -= 1;

        Some(block)
    }

    /// Installs a freshly carved, null-terminated chain as the whole list.
    ///
    /// # Safety
    /// `head` must start a chain of exactly `len` blocks ending in null.
    pub unsafe fn install(&mut self, head: NonNull<FreeBlock>, len: usize) {
        debug_assert!(self.is_empty(), "refilling a non-empty free list");

        self.head = head.as_ptr();
        self.len = len;
    }
}

/// One free list per power-of-two class, indexed by log2 of the block size.
pub(crate) struct ClassTable {
    lists: [FreeList; CLASS_SLOTS],
}

impl ClassTable {
    pub const fn new() -> Self {
        Self {
            lists: [FreeList::EMPTY; CLASS_SLOTS],
        }
    }

    pub fn list(&self, class: SizeClass) -> &FreeList {
        &self.lists[class.index()]
    }

    pub fn list_mut(&mut self, class: SizeClass) -> &mut FreeList {
        &mut self.lists[class.index()]
    }
}
