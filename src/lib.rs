//! # Tandem
//!
//! A small multicore scheduler for timing experiments.
//!
//! Every core runs its own pre-emptive, round-robin [`Scheduler`] instance
//! over a fixed set of tasks. On top of that sits a start barrier: one master
//! core lines up the start of a measured phase across all the cores that have
//! work (see [`sync_master`] and [`sync_slave`]), optionally starting each
//! slave a few ticks late. Results go out through a [`Console`] that cores
//! share under a [`FilterLock`].
//!
//! The hardware is reached through the [`Port`] trait. A Cortex-M port is
//! included for Arm targets.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
mod console;
mod core_block;
mod error;
mod list;
mod lock;
mod measure;
pub mod port;
mod scheduler;
pub mod stack;
mod sync;
mod task;

pub use console::{Console, CycleReport, Level, Line, Sink};
pub use core_block::CoreState;
pub use error::Error;
pub use lock::{FilterEntry, FilterLock, Lock, LockGuard, LockTable, SpinLock};
pub use measure::{CycleCounter, OffsetSchedule};
pub use port::{Context, Port};
pub use scheduler::{Scheduler, SuspendGuard};
pub use sync::{MasterSync, SlaveSync};
pub use task::{TaskEntryFn, TaskHandle, TaskInfo, TaskName, TaskParam, TaskState};

/// Identifies a core, counting from zero
pub type CoreId = usize;

/// The core the caller is running on, or 0 before [`Scheduler::init`]
pub fn current_core() -> CoreId {
    Scheduler::get()
        .map(|scheduler| scheduler.port().core_id())
        .unwrap_or(0)
}

/// Put the calling task to sleep for at least the given number of ticks
///
/// A delay of zero returns at once.
pub fn delay(ticks: u32) {
    if let Some(scheduler) = Scheduler::get() {
        scheduler.delay(scheduler.port().core_id(), ticks);
    }
}

/// Get the current time in ticks, on the calling core
pub fn now() -> u32 {
    match Scheduler::get() {
        Some(scheduler) => scheduler.now(scheduler.port().core_id()),
        None => 0xFFFFFFFF,
    }
}

/// How many tasks the calling core has
pub fn task_count() -> usize {
    Scheduler::get()
        .map(|scheduler| scheduler.task_count(scheduler.port().core_id()))
        .unwrap_or(0)
}

/// How busy the calling core was over the last complete second, in percent
pub fn load_percent() -> u32 {
    Scheduler::get()
        .map(|scheduler| scheduler.load_percent(scheduler.port().core_id()))
        .unwrap_or(0)
}

/// Master side of the start barrier. Call from a task on
/// [`MASTER_CORE`](config::MASTER_CORE).
///
/// Fails before [`Scheduler::init`], or when called on any other core.
pub fn sync_master() -> Result<(), Error> {
    let scheduler = Scheduler::get().ok_or(Error::PreconditionViolated)?;
    scheduler.sync_master(scheduler.port().core_id())
}

/// Slave side of the start barrier, starting `offset` ticks after the others
pub fn sync_slave(offset: u32) -> Result<(), Error> {
    let scheduler = Scheduler::get().ok_or(Error::PreconditionViolated)?;
    scheduler.sync_slave(scheduler.port().core_id(), offset)
}

/// Leave the measured phase, on the calling core
pub fn sync_reset() -> Result<(), Error> {
    let scheduler = Scheduler::get().ok_or(Error::PreconditionViolated)?;
    scheduler.sync_reset(scheduler.port().core_id())
}

/// Run `body` as one measured phase on the calling core. See
/// [`Scheduler::measure`].
pub fn measure<C: CycleCounter>(
    offset: u32,
    counter: &mut C,
    body: impl FnOnce(),
) -> Result<u32, Error> {
    let scheduler = Scheduler::get().ok_or(Error::PreconditionViolated)?;
    scheduler.measure(scheduler.port().core_id(), offset, counter, body)
}

#[cfg(feature = "defmt")]
defmt::timestamp!("{=u32:010}", now());

// End of File
