//! Task stacks, and building the first frame a task resumes from

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{Error, TaskEntryFn, TaskParam};

/// A stack, with the given size `LEN` bytes.
///
/// The value of `LEN` must be a multiple of 4, which is checked with an
/// assert.
///
/// We align stacks on 8-byte boundaries, as required by AAPCS.
#[repr(align(8))]
pub struct Stack<const LEN: usize> {
    /// The memory reserved for the stack
    contents: UnsafeCell<[u8; LEN]>,
}

impl<const LEN: usize> Stack<LEN> {
    /// Create a new stack
    pub const fn new() -> Self {
        assert!(LEN.is_multiple_of(4));
        Self {
            contents: UnsafeCell::new([0u8; LEN]),
        }
    }

    /// Get the top of the stack
    pub const fn top(&self) -> *mut u32 {
        // SAFETY: Pointing one past this object is allowed, as this is full
        // descending stack and we never write to the 'top' address - only
        // below it
        unsafe { self.contents.get().add(1) as *mut u32 }
    }
}

/// SAFETY: Our stack object only exposes pointers to itself, so is thread-safe
/// despite containing an `UnsafeCell`.
unsafe impl<const LEN: usize> Sync for Stack<LEN> {}

impl<const LEN: usize> Default for Stack<LEN> {
    fn default() -> Self {
        Stack::new()
    }
}

/// A block of `WORDS` words that task stacks are carved out of
///
/// Stacks are handed out bottom up and never given back, which suits tasks
/// that live forever.
#[repr(C, align(8))]
pub struct StackPool<const WORDS: usize> {
    words: UnsafeCell<[u32; WORDS]>,
    /// Words handed out so far
    used: AtomicUsize,
}

impl<const WORDS: usize> StackPool<WORDS> {
    /// An empty pool
    pub const fn new() -> Self {
        StackPool {
            words: UnsafeCell::new([0; WORDS]),
            used: AtomicUsize::new(0),
        }
    }

    /// Take a stack of at least `depth` words, returning its top
    ///
    /// Depths are rounded up to keep every stack top 8-byte aligned.
    pub fn carve(&self, depth: usize) -> Result<*mut u32, Error> {
        let depth = depth.next_multiple_of(2);
        let start = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(depth).filter(|&end| end <= WORDS)
            })
            .map_err(|_| Error::ResourceExhausted)?;
        // SAFETY: `start + depth <= WORDS`, so this is within, or one past the
        // end of, our array
        Ok(unsafe { (self.words.get() as *mut u32).add(start + depth) })
    }

    /// Words not yet handed out
    pub fn remaining(&self) -> usize {
        WORDS - self.used.load(Ordering::Acquire)
    }
}

/// SAFETY: Each carved region is handed out exactly once, and we only ever
/// give out pointers.
unsafe impl<const WORDS: usize> Sync for StackPool<WORDS> {}

impl<const WORDS: usize> Default for StackPool<WORDS> {
    fn default() -> Self {
        StackPool::new()
    }
}

/// A helper for pushing things into a full-descending Arm EABI stack
pub(crate) struct StackPusher(*mut u32);

impl StackPusher {
    /// Make a new full-descending stack from the given pointer
    ///
    /// It will not write to the given pointer, but it will write immediately
    /// below it - because this is a Full Descending stack.
    ///
    /// # Safety
    ///
    /// There must be enough free space below the given pointer to accept all
    /// the items you are going to push.
    pub(crate) unsafe fn new(stack_top: *mut u32) -> StackPusher {
        StackPusher(stack_top)
    }

    /// Push something onto the stack
    pub(crate) fn push(&mut self, value: u32) {
        // SAFETY: `new` was promised enough room below the top
        unsafe {
            self.0 = self.0.sub(1);
            self.0.write_volatile(value);
        }
    }

    /// Get the current stack pointer
    pub(crate) fn current(&self) -> *mut u32 {
        self.0
    }
}

/// Words [`push_initial_frame`] uses
pub const INITIAL_FRAME_WORDS: usize = 17;

/// The xPSR for a new task: Thumb mode, the only mode on Armv7-M
const DEFAULT_XPSR: u32 = 1 << 24;

/// Return to Thread mode, on the Process Stack, with no FPU state
const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// Lay out the frame the context switch expects to restore a task from
///
/// That is the hardware exception frame (xPSR, PC, LR, R12, R3-R0, with
/// `param` in R0), then the EXC_RETURN value the switch keeps in LR, then R11
/// to R4. Returns the new stack pointer.
///
/// # Safety
///
/// `top` must be the 8-byte aligned top of a stack with at least
/// [`INITIAL_FRAME_WORDS`] free words below it.
pub unsafe fn push_initial_frame(top: *mut u32, entry: TaskEntryFn, param: TaskParam) -> *mut u32 {
    // SAFETY: passed up to our caller
    let mut pusher = unsafe { StackPusher::new(top) };

    // Standard Arm exception frame
    pusher.push(DEFAULT_XPSR);
    // PC
    pusher.push(entry as usize as u32);
    // LR, tasks never return
    pusher.push(0);
    // R12
    pusher.push(0);
    // R3, R2, R1
    pusher.push(0);
    pusher.push(0);
    pusher.push(0);
    // R0
    pusher.push(param as u32);

    // Our copy of LR. Bit 4 is set, so there are no FPU registers to
    // unstack.
    pusher.push(EXC_RETURN_THREAD_PSP);

    // R11 - R4
    for _ in 0..8 {
        pusher.push(0);
    }

    pusher.current()
}


// End of File
