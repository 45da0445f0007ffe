use std::hint::spin_loop;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicIsize;
use std::sync::atomic::Ordering;

use lock_api::GuardSend;
use lock_api::RawMutex;
use lock_api::RawRwLock;

/// RawSpinLock is a simple spin lock based on an atomic flag.
///
/// This structure implements the `lock_api::RawMutex` trait
/// and can serve as a basis for higher-level lock wrappers (for example, `lock_api::Mutex`).
pub struct RawSpinLock {
    state: AtomicBool,
}

unsafe impl RawMutex for RawSpinLock {
    // The initial state is false (i.e., the lock is not acquired)
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock {
        state: AtomicBool::new(false),
    };

    // Indicates that the lock guard is Send.
    type GuardMarker = GuardSend;

    /// Acquires the lock.
    ///
    /// First, attempts to change the flag from false to true using compare_exchange.
    /// If it fails, busy-waits (spins) until the flag becomes false.
    #[inline]
    fn lock(&self) {
        // Attempt the Compare-And-Swap (CAS) initially.
        while self
            .state
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // If the attempt fails, spin while the flag remains true.
            while self.state.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    /// Releases the lock.
    ///
    /// Although defined as unsafe, the caller must ensure correct lifetime management
    /// through proper lock guard usage.
    #[inline]
    unsafe fn unlock(&self) {
        self.state.store(false, Ordering::Release);
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Returns true if the lock was successfully acquired, or false if it was already held.
    #[inline]
    fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Checks whether the lock is currently held.
    #[inline]
    fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed)
    }
}

/// RawSpinRwLock is a reader/writer spin lock built on the same CAS-and-spin
/// idiom as `RawSpinLock`. State is a single signed counter: `0` means
/// unlocked, `-1` means write-locked, any positive value is the number of
/// concurrent readers.
///
/// Used to guard individual stripes of the transposition table, where
/// critical sections are a handful of loads/stores and contention is
/// expected to be brief.
pub struct RawSpinRwLock {
    state: AtomicIsize,
}

const WRITER: isize = -1;

unsafe impl RawRwLock for RawSpinRwLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinRwLock {
        state: AtomicIsize::new(0),
    };

    type GuardMarker = GuardSend;

    #[inline]
    fn lock_shared(&self) {
        loop {
            let cur = self.state.load(Ordering::Relaxed);
            if cur != WRITER
                && self
                    .state
                    .compare_exchange_weak(cur, cur + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return;
            }
            spin_loop();
        }
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        let cur = self.state.load(Ordering::Relaxed);
        cur != WRITER
            && self
                .state
                .compare_exchange(cur, cur + 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        self.state.fetch_sub(1, Ordering::Release);
    }

    #[inline]
    fn lock_exclusive(&self) {
        while self
            .state
            .compare_exchange_weak(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spin_loop();
        }
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        self.state
            .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        self.state.store(0, Ordering::Release);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != 0
    }
}
