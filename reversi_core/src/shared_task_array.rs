//! Lock-free ring buffer for burst injection and spillover (§4.4).
//!
//! Used for two things only: handing out all root Tasks at startup, and
//! absorbing subtasks a worker couldn't fit in its LocalHeap. It is not
//! priority-ordered — pops just drain in push order — so it is not on the
//! critical path that needs priority fidelity; the LocalHeap and
//! GlobalChunkQueue carry that.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::task::Task;

/// A ring slot. `None` tasks are never pushed, so `Option` just gives us a
/// safe "has this slot been written yet" check alongside the head/tail
/// cursors during the brief window between a tail-CAS and the slot write.
struct Slot(UnsafeCell<Option<Task>>);

// SAFETY: a slot is written by exactly the pusher that won the tail CAS for
// it, and read by exactly the popper that won the head CAS for it; the two
// never overlap for the same slot at the same time.
unsafe impl Sync for Slot {}

pub struct SharedTaskArray {
    slots: Box<[Slot]>,
    mask: u64,
    head: AtomicU64,
    tail: AtomicU64,
}

impl SharedTaskArray {
    /// `capacity` is rounded up to a power of two.
    pub fn new(capacity: usize) -> SharedTaskArray {
        let capacity = capacity.max(1).next_power_of_two();
        let slots = (0..capacity).map(|_| Slot(UnsafeCell::new(None))).collect::<Vec<_>>().into_boxed_slice();
        SharedTaskArray {
            slots,
            mask: (capacity - 1) as u64,
            head: AtomicU64::new(0),
            tail: AtomicU64::new(0),
        }
    }

    /// Reserves the next slot with a CAS-increment of `tail`, then writes
    /// it. Returns `false` if the ring is full (tail has lapped head).
    pub fn push(&self, task: Task) -> bool {
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);
            if tail.wrapping_sub(head) >= self.slots.len() as u64 {
                return false;
            }
            if self
                .tail
                .compare_exchange_weak(tail, tail.wrapping_add(1), Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                let idx = (tail & self.mask) as usize;
                // SAFETY: this pusher uniquely owns slot `idx` until the
                // corresponding pop's head CAS succeeds; no other pusher can
                // win the same tail value.
                unsafe { *self.slots[idx].0.get() = Some(task) };
                // Release fence: the write above must be visible to
                // whichever popper's `head` CAS observes this `tail`.
                std::sync::atomic::fence(Ordering::Release);
                return true;
            }
        }
    }

    /// CAS-increments `head` after reading the slot, so a racing popper that
    /// loses the CAS simply retries rather than double-consuming.
    pub fn pop(&self) -> Option<Task> {
        loop {
            let head = self.head.load(Ordering::Relaxed);
            let tail = self.tail.load(Ordering::Acquire);
            if head == tail {
                return None;
            }
            let idx = (head & self.mask) as usize;
            // SAFETY: paired with the pusher's release fence above; by the
            // time `tail` observably advanced past `head`, the slot write
            // already happened.
            let task = unsafe { (*self.slots[idx].0.get()).take() };
            if self
                .head
                .compare_exchange_weak(head, head.wrapping_add(1), Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return task;
            }
            // Lost the race: restore the slot for whichever popper wins and retry.
            if let Some(task) = task {
                unsafe { *self.slots[idx].0.get() = Some(task) };
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Fraction full, in `0..=100`, used by the spawn-relaxation ladder's
    /// "SharedTaskArray < 70% full" check (§4.7).
    pub fn percent_full(&self) -> u32 {
        (self.len() * 100 / self.capacity()) as u32
    }
}
