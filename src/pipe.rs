//! Lock-free bounded pipe: single writer, multiple readers.
//!
//! Each worker owns one pipe. The owner pushes and pops at the front, so its
//! most recently produced work is the first it takes back (LIFO, cache-warm).
//! Any other worker may steal from the back, consuming the oldest entries
//! first (FIFO) and staying out of the owner's way.
//!
//! The pipe is a power-of-two ring of slots guarded by per-slot flags. The
//! owner advances `write_index` with plain stores; thieves advance
//! `read_count` after claiming a slot. Claiming is a compare-exchange on the
//! slot flag, so the owner's front pop and any thief's back pop of the same
//! last entry are decided by a single winner. Counters wrap modulo twice the
//! capacity, which keeps a full ring distinguishable from an empty one.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam::utils::CachePadded;

const PIPE_SIZE_LOG2: u32 = 8;

/// Slots per pipe.
pub(crate) const PIPE_CAPACITY: usize = 1 << PIPE_SIZE_LOG2;

const INDEX_MASK: u32 = PIPE_CAPACITY as u32 - 1;
const WRAP_MASK: u32 = (2 * PIPE_CAPACITY as u32) - 1;

const SLOT_EMPTY: u32 = 0;
const SLOT_COMMITTED: u32 = 1;

/// Bounded MRSW ring deque. Front operations are reserved for the owning
/// worker; `try_steal_back` may be called from any thread.
pub(crate) struct Pipe<T> {
    /// Advanced only by the owner, modulo twice the capacity. Thieves read
    /// it to judge emptiness.
    write_index: CachePadded<AtomicU32>,
    /// Advanced by whichever thief claims the slot at the back. Free-running;
    /// masked on use (the natural u32 wrap is a multiple of the ring period).
    read_count: CachePadded<AtomicU32>,
    flags: [AtomicU32; PIPE_CAPACITY],
    slots: [UnsafeCell<MaybeUninit<T>>; PIPE_CAPACITY],
}

// Safety: slot contents are only touched by the thread that won the slot's
// flag transition, and a slot is never rewritten until `read_count` has
// advanced past it.
unsafe impl<T: Send> Send for Pipe<T> {}
unsafe impl<T: Send> Sync for Pipe<T> {}

impl<T> Pipe<T> {
    pub(crate) fn new() -> Self {
        Pipe {
            write_index: CachePadded::new(AtomicU32::new(0)),
            read_count: CachePadded::new(AtomicU32::new(0)),
            flags: std::array::from_fn(|_| AtomicU32::new(SLOT_EMPTY)),
            slots: std::array::from_fn(|_| UnsafeCell::new(MaybeUninit::uninit())),
        }
    }

    #[inline]
    fn occupancy(write_index: u32, read_count: u32) -> u32 {
        write_index.wrapping_sub(read_count) & WRAP_MASK
    }

    pub(crate) fn is_empty(&self) -> bool {
        let read = self.read_count.load(Ordering::Acquire);
        let write = self.write_index.load(Ordering::Acquire);
        Self::occupancy(write, read) == 0
    }

    /// Owner only. Hands the entry back when the pipe is full.
    pub(crate) fn try_push_front(&self, value: T) -> Result<(), T> {
        let write = self.write_index.load(Ordering::Relaxed);
        let read = self.read_count.load(Ordering::Acquire);
        if Self::occupancy(write, read) >= PIPE_CAPACITY as u32 {
            return Err(value);
        }

        let slot = (write & INDEX_MASK) as usize;
        debug_assert_eq!(self.flags[slot].load(Ordering::Relaxed), SLOT_EMPTY);
        unsafe { (*self.slots[slot].get()).write(value) };

        // The committed flag is what publishes the entry; the index store
        // lets thieves see the pipe as non-empty.
        self.flags[slot].store(SLOT_COMMITTED, Ordering::Release);
        self.write_index
            .store(write.wrapping_add(1) & WRAP_MASK, Ordering::Release);
        Ok(())
    }

    /// Owner only. Fails when the pipe is empty or a thief is claiming the
    /// last remaining entry.
    pub(crate) fn try_pop_front(&self) -> Option<T> {
        let write = self.write_index.load(Ordering::Relaxed);
        let read = self.read_count.load(Ordering::Acquire);
        if Self::occupancy(write, read) == 0 {
            return None;
        }

        // Retract the slot speculatively, then race any thief for its flag.
        let prev = write.wrapping_sub(1) & WRAP_MASK;
        self.write_index.store(prev, Ordering::Release);

        let slot = (prev & INDEX_MASK) as usize;
        match self.flags[slot].compare_exchange(
            SLOT_COMMITTED,
            SLOT_EMPTY,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => Some(unsafe { (*self.slots[slot].get()).assume_init_read() }),
            Err(_) => {
                // A thief won the last entry; undo the retraction.
                self.write_index.store(write, Ordering::Release);
                None
            }
        }
    }

    /// Thief side: claim the oldest committed entry. Fails when the pipe is
    /// empty or another claimant got there first.
    pub(crate) fn try_steal_back(&self) -> Option<T> {
        let mut read = self.read_count.load(Ordering::Acquire);
        loop {
            let write = self.write_index.load(Ordering::Acquire);
            if Self::occupancy(write, read) == 0 {
                return None;
            }

            let slot = (read & INDEX_MASK) as usize;
            if self.flags[slot]
                .compare_exchange(
                    SLOT_COMMITTED,
                    SLOT_EMPTY,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                // Copy out before advancing the count: the owner may not
                // rewrite this slot until the count moves past it.
                let value = unsafe { (*self.slots[slot].get()).assume_init_read() };
                self.read_count.fetch_add(1, Ordering::Release);
                return Some(value);
            }

            // Lost the race for this slot. Chase the back if it has moved on;
            // otherwise give up and let the caller try another pipe.
            let current = self.read_count.load(Ordering::Acquire);
            if current == read {
                return None;
            }
            read = current;
        }
    }
}

impl<T> Drop for Pipe<T> {
    fn drop(&mut self) {
        for (slot, flag) in self.slots.iter_mut().zip(self.flags.iter_mut()) {
            if *flag.get_mut() == SLOT_COMMITTED {
                unsafe { slot.get_mut().assume_init_drop() };
            }
        }
    }
}
