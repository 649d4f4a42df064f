//! The [`Port`] trait, which connects the scheduler to a particular chip
//!
//! The scheduler decides *which* task should run on each core. Actually
//! saving and restoring registers, programming the tick timer, and getting
//! the other cores going is the port's job.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{CoreId, Error, TaskEntryFn, TaskParam};

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m;

/// A saved execution context, as understood by the port
///
/// For the Cortex-M port this is the task's stack pointer.
pub type Context = usize;

/// What the scheduler needs from the hardware
pub trait Port: Sync {
    /// Which core is executing this call?
    fn core_id(&self) -> CoreId;

    /// Frequency of the clock feeding the tick timer, in Hz
    fn timer_frequency(&self) -> u32;

    /// Build the initial context for a new task
    ///
    /// When first switched to, the task must start executing `entry(param)`
    /// on a stack of at least `stack_depth` words.
    fn init_context(
        &self,
        entry: TaskEntryFn,
        param: TaskParam,
        stack_depth: usize,
    ) -> Result<Context, Error>;

    /// Ask for a context switch on the calling core, as soon as possible
    fn request_switch(&self);

    /// Start a secondary core running its tasks, with the tick timer
    /// reloading every `tick_divisor` timer clocks
    fn start_secondary(&self, core: CoreId, tick_divisor: u32);

    /// Start the calling (primary) core running its tasks
    fn start_primary(&self, tick_divisor: u32) -> !;

    /// Called on every turn of a busy-wait loop
    fn spin_hint(&self) {
        core::hint::spin_loop();
    }
}


// End of File
