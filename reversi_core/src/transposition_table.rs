//! Shared proof-number transposition table.
//!
//! Every worker thread can probe and store into the same table while a
//! search is running, so each entry's (pn, dn, result) triple has to stay
//! internally consistent across concurrent readers and a single writer.
//! Rather than pack the whole entry into one atomic word (the approach a
//! plain alpha-beta TT can get away with, since a single `Score` fits in 16
//! bits), entries here sit behind one of a fixed number of striped
//! reader/writer locks, each padded to its own cache line so two stripes
//! never share a cache line and fight over it under contention.
//!
//! Indexing is direct-mapped: `slot = key & (N - 1)`. Multiple contiguous
//! slots share one stripe lock, so a single lock acquisition covers a short
//! run of table entries rather than just one.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use lock_api::RwLock;

use crate::node::INFINITY;
use crate::types::{Depth, Pn, Score, SolveResult};
use crate::util::spinlock::RawSpinRwLock;

/// Number of stripe locks, matching §4.1's design. Clamped down for tables
/// smaller than this many entries (mostly relevant to unit tests).
const MAX_STRIPES: usize = 1024;

/// One slot's worth of proof-number data.
///
/// `key == 0` is the "never written" sentinel; a real position hashing to
/// exactly zero is possible but astronomically unlikely, and tolerating the
/// false negative is cheaper than carrying an extra occupied bit.
#[derive(Clone, Copy, Debug)]
struct TTEntry {
    key: u64,
    pn: Pn,
    dn: Pn,
    result: SolveResult,
    depth: Depth,
    eval_score: Score,
    age: u8,
}

impl Default for TTEntry {
    fn default() -> Self {
        TTEntry {
            key: 0,
            pn: 1,
            dn: 1,
            result: SolveResult::Unknown,
            depth: 0,
            eval_score: 0,
            age: 0,
        }
    }
}

/// Data returned by a successful [`TranspositionTable::probe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TTProbe {
    pub pn: Pn,
    pub dn: Pn,
    pub result: SolveResult,
    pub eval_score: Score,
}

impl TTProbe {
    /// A node may only trust a TT hit as *proven* when it already encodes a
    /// terminal pn/dn pattern: a plain unproven hit is an ordering hint
    /// only (§4.1, §4.6).
    #[inline]
    pub fn is_proven(&self) -> bool {
        self.pn == 0 || self.dn == 0 || (self.pn >= INFINITY && self.dn >= INFINITY)
    }
}

impl From<TTEntry> for TTProbe {
    fn from(e: TTEntry) -> Self {
        TTProbe {
            pn: e.pn,
            dn: e.dn,
            result: e.result,
            eval_score: e.eval_score,
        }
    }
}

/// Plain-atomic counters, relaxed add throughout: they are diagnostics, not
/// part of the correctness argument (§4.1, §7).
#[derive(Default)]
pub struct TTStats {
    pub hits: u64,
    pub stores: u64,
    pub collisions: u64,
}

/// A single stripe lock, padded so its cache line holds nothing else.
#[repr(align(64))]
struct Stripe(RwLock<RawSpinRwLock, ()>);

impl Stripe {
    fn new() -> Stripe {
        Stripe(RwLock::new(()))
    }
}

/// The shared table. One instance per solve, wrapped in `Arc` by the
/// orchestrator and handed to every worker (§4.9, §5).
pub struct TranspositionTable {
    entries: Box<[UnsafeCell<TTEntry>]>,
    stripes: Box<[Stripe]>,
    slot_mask: u64,
    stripe_capacity: usize,
    hits: AtomicU64,
    stores: AtomicU64,
    collisions: AtomicU64,
}

// SAFETY: every access to `entries[i]` happens while holding the read or
// write guard of `stripes[i / stripe_capacity]`, which serializes writers
// against readers and other writers exactly as a per-entry lock would.
unsafe impl Sync for TranspositionTable {}

impl TranspositionTable {
    /// Builds a table sized from a megabyte budget, rounded down to a power
    /// of two entries (§4.1).
    pub fn new(mb_size: usize) -> TranspositionTable {
        let entry_size = size_of::<TTEntry>().max(1);
        let budget_entries = if mb_size == 0 {
            1 << 16
        } else {
            (mb_size * 1024 * 1024) / entry_size
        };
        let entries_len = budget_entries.next_power_of_two().max(MAX_STRIPES);

        let entries = (0..entries_len)
            .map(|_| UnsafeCell::new(TTEntry::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let num_stripes = MAX_STRIPES.min(entries_len);
        let stripes = (0..num_stripes).map(|_| Stripe::new()).collect::<Vec<_>>().into_boxed_slice();

        TranspositionTable {
            entries,
            stripes,
            slot_mask: (entries_len - 1) as u64,
            stripe_capacity: entries_len / num_stripes,
            hits: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            collisions: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    fn slot_of(&self, key: u64) -> usize {
        (key & self.slot_mask) as usize
    }

    #[inline(always)]
    fn stripe_of(&self, slot: usize) -> usize {
        slot / self.stripe_capacity
    }

    /// Hints the CPU to bring `entries[slot_of(key)]` into cache ahead of a
    /// probe. A bare address computation, not a memory access, so it needs
    /// no lock (§4.5 step 1).
    #[inline]
    pub fn prefetch(&self, key: u64) {
        let slot = self.slot_of(key);
        #[cfg(target_arch = "x86_64")]
        unsafe {
            let addr = self.entries[slot].get() as *const i8;
            std::arch::x86_64::_mm_prefetch(addr, std::arch::x86_64::_MM_HINT_T0);
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = slot;
        }
    }

    /// Returns the stored data iff the key matches and it was stored at
    /// `depth` or deeper (§4.1).
    pub fn probe(&self, key: u64, depth: Depth) -> Option<TTProbe> {
        let slot = self.slot_of(key);
        let stripe = &self.stripes[self.stripe_of(slot)];
        let _guard = stripe.0.read();
        // SAFETY: see the `Sync` impl above.
        let entry = unsafe { *self.entries[slot].get() };
        if entry.key == key && entry.depth >= depth {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(entry.into())
        } else {
            if entry.key != 0 && entry.key != key {
                self.collisions.fetch_add(1, Ordering::Relaxed);
            }
            None
        }
    }

    /// Overwrites the slot iff `depth >= stored.depth` (§3, §4.1).
    #[allow(clippy::too_many_arguments)]
    pub fn store(&self, key: u64, depth: Depth, pn: Pn, dn: Pn, result: SolveResult, eval_score: Score) {
        let slot = self.slot_of(key);
        let stripe = &self.stripes[self.stripe_of(slot)];
        let mut _guard = stripe.0.write();
        // SAFETY: see the `Sync` impl above.
        let entry = unsafe { &mut *self.entries[slot].get() };
        if depth >= entry.depth {
            *entry = TTEntry {
                key,
                pn,
                dn,
                result,
                depth,
                eval_score,
                age: entry.age.wrapping_add(1),
            };
            self.stores.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drops every entry back to the empty sentinel. Used between solves in
    /// the idempotence test (§8.5) and the CLI's `--fresh-tt` path.
    pub fn clear(&self) {
        for entry in &self.entries {
            // SAFETY: callers only clear between solves, when no worker
            // thread is running and so no stripe lock is contended.
            unsafe { *entry.get() = TTEntry::default() };
        }
    }

    pub fn stats(&self) -> TTStats {
        TTStats {
            hits: self.hits.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_probe_round_trips() {
        let tt = TranspositionTable::new(1);
        tt.store(0xABCD, 10, 0, INFINITY, SolveResult::Win, 42);
        let probe = tt.probe(0xABCD, 10).expect("entry was just stored");
        assert_eq!(probe.pn, 0);
        assert_eq!(probe.result, SolveResult::Win);
        assert!(probe.is_proven());
    }

    #[test]
    fn probe_at_greater_depth_misses() {
        let tt = TranspositionTable::new(1);
        tt.store(0xABCD, 5, 3, 4, SolveResult::Unknown, 0);
        assert!(tt.probe(0xABCD, 10).is_none());
        assert!(tt.probe(0xABCD, 5).is_some());
    }

    #[test]
    fn shallower_depth_does_not_overwrite_deeper_entry() {
        let tt = TranspositionTable::new(1);
        tt.store(0x1, 10, 1, 1, SolveResult::Unknown, 0);
        tt.store(0x1, 3, 99, 99, SolveResult::Unknown, 0);
        let probe = tt.probe(0x1, 10).unwrap();
        assert_eq!(probe.pn, 1);
    }

    #[test]
    fn mismatched_key_at_same_slot_counts_as_collision() {
        let tt = TranspositionTable::new(1);
        let slot_mask = tt.slot_mask;
        tt.store(1, 1, 1, 1, SolveResult::Unknown, 0);
        // A key that maps to the same slot but differs above the mask.
        let colliding_key = 1 | (slot_mask + 1);
        assert!(tt.probe(colliding_key, 1).is_none());
        assert_eq!(tt.stats().collisions, 1);
    }

    #[test]
    fn clear_resets_every_slot() {
        let tt = TranspositionTable::new(1);
        tt.store(7, 1, 0, INFINITY, SolveResult::Win, 0);
        tt.clear();
        assert!(tt.probe(7, 0).is_none());
    }
}
