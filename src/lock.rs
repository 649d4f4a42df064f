//! Cross-core locks
//!
//! [`FilterLock`] needs nothing from the hardware beyond atomic loads and
//! stores. [`SpinLock`] uses a test-and-set. Both implement [`Lock`], so the
//! console and the measurement code do not care which one a board picks.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    task::Poll,
};

use crate::{CoreId, config::MAX_CPU_CORES};

/// A lock that cores take by id
pub trait Lock: Sync {
    /// Spin until `core` holds the lock
    fn lock(&self, core: CoreId);

    /// Release the lock held by `core`
    fn unlock(&self, core: CoreId);

    /// Take the lock, and release it when the guard drops
    fn guard(&self, core: CoreId) -> LockGuard<'_, Self>
    where
        Self: Sized,
    {
        self.lock(core);
        LockGuard { lock: self, core }
    }
}

impl<L: Lock> Lock for &L {
    fn lock(&self, core: CoreId) {
        (**self).lock(core);
    }

    fn unlock(&self, core: CoreId) {
        (**self).unlock(core);
    }
}

/// Releases a [`Lock`] when dropped
pub struct LockGuard<'a, L: Lock> {
    lock: &'a L,
    core: CoreId,
}

impl<L: Lock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock(self.core);
    }
}

/// Peterson's algorithm, generalised to N contenders
///
/// Each contender climbs `contenders - 1` levels. At each level the last one
/// to arrive waits while anyone else is at that level or above. Cores are
/// numbered `0..contenders`.
pub struct FilterLock {
    contenders: usize,
    /// The level each core has reached, 0 meaning not contending
    level: [AtomicUsize; MAX_CPU_CORES],
    /// The last core to arrive at each level
    last_to_enter: [AtomicUsize; MAX_CPU_CORES],
}

impl FilterLock {
    /// Make a lock for cores `0..contenders`
    ///
    /// # Panics
    ///
    /// If `contenders` is zero or more than [`MAX_CPU_CORES`].
    pub const fn new(contenders: usize) -> FilterLock {
        assert!(contenders > 0 && contenders <= MAX_CPU_CORES);
        FilterLock {
            contenders,
            level: [const { AtomicUsize::new(0) }; MAX_CPU_CORES],
            last_to_enter: [const { AtomicUsize::new(0) }; MAX_CPU_CORES],
        }
    }

    /// Start entering the lock as `core`, one poll at a time
    pub fn entry(&self, core: CoreId) -> FilterEntry<'_> {
        debug_assert!(core < self.contenders, "core {} cannot contend", core);
        FilterEntry {
            lock: self,
            core,
            level: 1,
            announced: false,
        }
    }

    /// Is any core other than `core` at level `l` or above?
    fn others_at_or_above(&self, core: CoreId, l: usize) -> bool {
        (0..self.contenders)
            .filter(|&k| k != core)
            .any(|k| self.level[k].load(Ordering::SeqCst) >= l)
    }
}

impl Lock for FilterLock {
    fn lock(&self, core: CoreId) {
        let mut entry = self.entry(core);
        while entry.poll().is_pending() {
            core::hint::spin_loop();
        }
    }

    fn unlock(&self, core: CoreId) {
        self.level[core].store(0, Ordering::SeqCst);
    }
}

/// A core's way into a [`FilterLock`], in progress
pub struct FilterEntry<'a> {
    lock: &'a FilterLock,
    core: CoreId,
    level: usize,
    announced: bool,
}

impl FilterEntry<'_> {
    /// Climb as far as we can without waiting
    ///
    /// Returns `Ready` once we are through the top level and hold the lock.
    pub fn poll(&mut self) -> Poll<()> {
        let lock = self.lock;
        while self.level < lock.contenders {
            let l = self.level;
            if !self.announced {
                lock.level[self.core].store(l, Ordering::SeqCst);
                lock.last_to_enter[l].store(self.core, Ordering::SeqCst);
                self.announced = true;
            }
            if lock.last_to_enter[l].load(Ordering::SeqCst) == self.core
                && lock.others_at_or_above(self.core, l)
            {
                return Poll::Pending;
            }
            self.level += 1;
            self.announced = false;
        }
        Poll::Ready(())
    }
}

/// A test-and-set lock
///
/// Stands in for a hardware binary semaphore. Needs atomic read-modify-write.
pub struct SpinLock {
    held: AtomicBool,
}

impl SpinLock {
    /// Make an unlocked lock
    pub const fn new() -> SpinLock {
        SpinLock {
            held: AtomicBool::new(false),
        }
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        SpinLock::new()
    }
}

impl Lock for SpinLock {
    fn lock(&self, _core: CoreId) {
        while self
            .held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
    }

    fn unlock(&self, _core: CoreId) {
        self.held.store(false, Ordering::Release);
    }
}

/// A fixed set of locks, picked by id
///
/// See [`UART_LOCK`](crate::config::UART_LOCK) and
/// [`MEM_LOCK`](crate::config::MEM_LOCK).
pub struct LockTable<L, const N: usize> {
    locks: [L; N],
}

impl<L: Lock, const N: usize> LockTable<L, N> {
    /// Wrap up an array of locks
    pub const fn new(locks: [L; N]) -> LockTable<L, N> {
        LockTable { locks }
    }

    /// Get lock `id`
    ///
    /// # Panics
    ///
    /// If `id` is not below `N`.
    pub fn get(&self, id: usize) -> &L {
        &self.locks[id]
    }

    /// Take lock `id` as `core`
    pub fn enter(&self, id: usize, core: CoreId) {
        self.get(id).lock(core);
    }

    /// Release lock `id` held by `core`
    pub fn exit(&self, id: usize, core: CoreId) {
        self.get(id).unlock(core);
    }

    /// Take lock `id` as `core` until the guard drops
    pub fn guard(&self, id: usize, core: CoreId) -> LockGuard<'_, L> {
        self.get(id).guard(core)
    }
}


// End of File
