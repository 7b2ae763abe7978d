use crate::constants::CHUNK_SIZE;
use crate::size_class::SizeClass;
use log::{trace, warn};

/// A slow-path occurrence inside the pool, reported through `log` once no
/// lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Carved { chunk: usize, class: SizeClass },
    HeapExhausted,
    LargeSpan { span: usize, len: usize },
    LargeRefused { size: usize },
    LargeReleased { span: usize, len: usize },
}

impl Event {
    pub fn log(self) {
        match self {
            Event::Carved { chunk, class } => trace!(
                "carved chunk {:#x} into {} blocks of {} bytes",
                chunk,
                class.blocks_per_chunk(),
                class.block_size()
            ),
            Event::HeapExhausted => warn!("heap extension of {} bytes failed", CHUNK_SIZE),
            Event::LargeSpan { span, len } => trace!("large span {:#x} of {} bytes", span, len),
            Event::LargeRefused { size } => warn!("large allocation of {} bytes failed", size),
            Event::LargeReleased { span, len } => {
                trace!("releasing large span {:#x} of {} bytes", span, len)
            }
        }
    }
}

// A resize can refill or map once and unmap once.
const SLOTS: usize = 4;

/// Fixed-size queue of pending events; recording never allocates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Events {
    slots: [Option<Event>; SLOTS],
    len: usize,
}

impl Events {
    pub const fn new() -> Self {
        Self {
            slots: [None; SLOTS],
            len: 0,
        }
    }

    /// Queues `event`; once full, further events are dropped.
    pub fn push(&mut self, event: Event) {
        if let Some(slot) = self.slots.get_mut(self.len) {
            *slot = Some(event);
            self.len += 1;
        }
    }

    pub fn take(&mut self) -> Events {
        core::mem::replace(self, Events::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.slots[..self.len].iter().flatten().copied()
    }

    pub fn log(self) {
        self.iter().for_each(Event::log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_keeps_order_and_caps() {
        let mut events = Events::new();

        for size in 0..SLOTS + 2 {
            events.push(Event::LargeRefused { size });
        }

        let queued: Vec<_> = events.take().iter().collect();
        assert_eq!(queued.len(), SLOTS);
        assert_eq!(queued[0], Event::LargeRefused { size: 0 });
        assert_eq!(queued[SLOTS - 1], Event::LargeRefused { size: SLOTS - 1 });
        assert_eq!(events.iter().count(), 0);
    }
}
