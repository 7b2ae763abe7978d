use crate::backend::Backend;
use crate::constants::{CHUNK_SIZE, MIN_ALIGN};
use crate::error::AllocError;
use crate::free_list::FreeBlock;
use crate::size_class::SizeClass;
use core::ptr::{self, NonNull};

/// One `CHUNK_SIZE` extension of the heap, not yet sliced.
pub(crate) struct Chunk {
    base: NonNull<u8>,
}

/// A null-terminated chain of free blocks produced by [`Chunk::carve`].
pub(crate) struct Carved {
    pub head: NonNull<FreeBlock>,
    pub blocks: usize,
}

impl Chunk {
    pub fn obtain<B: Backend>(backend: &mut B) -> Result<Chunk, AllocError> {
        let base = backend.extend_heap(CHUNK_SIZE).ok_or(AllocError::OutOfMemory)?;

        debug_assert_eq!(base.as_ptr() as usize % MIN_ALIGN, 0);
        Ok(Chunk { base })
    }

    /// Slices the chunk into equal blocks of `class`, each headed by its
    /// block size (or'd with `tag`) and linked to the next; the last links
    /// to null.
    pub fn carve(self, class: SizeClass, tag: usize) -> Carved {
        let block_size = class.block_size();
        let blocks = class.blocks_per_chunk();
        let base = self.base.as_ptr();

        for i in 0..blocks {
            unsafe {
                let slot = base.add(i * block_size).cast::<FreeBlock>();
                let next = if i + 1 < blocks {
                    base.add((i + 1) * block_size).cast::<FreeBlock>()
                } else {
                    ptr::null_mut()
                };

                slot.write(FreeBlock {
                    header: block_size | tag,
                    next,
                });
            }
        }

        Carved {
            head: self.base.cast(),
            blocks,
        }
    }
}
