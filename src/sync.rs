//! The master/slave start barrier
//!
//! One core (the master, [`MASTER_CORE`]) lines up the start of a measured
//! phase with every other core that has work. Each side is a small state
//! machine that only ever busy-polls shared atomics. The tick path moves a
//! core's [`CoreState`] along when that core has set its request flag, see
//! [`advance_barrier`].
//!
//! The waits are written as pollable machines ([`MasterSync`] and
//! [`SlaveSync`]) so they can be single-stepped. [`Scheduler::sync_master`]
//! and friends just spin on them.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::task::Poll;

use crate::{
    CoreId, Error, Scheduler,
    config::{MASTER_CORE, MAX_CPU_CORES},
    core_block::{CoreControlBlock, CoreState},
};

/// Step a core's barrier state, if it asked us to
///
/// Runs at the end of every tick-driven dispatch.
pub(crate) fn advance_barrier(core: CoreId, ccb: &CoreControlBlock) {
    let sync = &ccb.sync;
    if !sync.requested() {
        return;
    }
    let state = sync.state();
    if core == MASTER_CORE {
        sync.set_state(state.master_successor());
        sync.set_requested(false);
    } else if state == CoreState::TimerSet {
        let offset = sync.offset();
        if offset > 0 {
            sync.set_offset(offset - 1);
        } else {
            sync.set_state(CoreState::Running);
            sync.set_requested(false);
        }
    } else {
        debug!(
            "Slave in scheduler sync, core {=usize} state {}",
            core, state
        );
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum MasterStep {
    Arrive,
    AwaitArrival,
    AwaitSlaves,
    AwaitTimerSet,
    AwaitRunning,
    Done,
}

/// The master's side of the barrier, one poll at a time
#[derive(Debug)]
pub struct MasterSync {
    step: MasterStep,
}

impl MasterSync {
    /// A barrier attempt that has not started yet
    pub const fn new() -> MasterSync {
        MasterSync {
            step: MasterStep::Arrive,
        }
    }

    /// Go as far through the protocol as we can without waiting
    ///
    /// Returns `Ready` once the master core is `Running`.
    pub fn poll(&mut self, scheduler: &Scheduler) -> Poll<()> {
        let sync = &scheduler.cores[MASTER_CORE].sync;
        loop {
            match self.step {
                MasterStep::Arrive => {
                    debug!("Master starting synchronization");
                    sync.set_requested(true);
                    self.step = MasterStep::AwaitArrival;
                }
                MasterStep::AwaitArrival => {
                    if sync.state() != CoreState::Waiting {
                        return Poll::Pending;
                    }
                    debug!("Master state changed to waiting");
                    self.step = MasterStep::AwaitSlaves;
                }
                MasterStep::AwaitSlaves => {
                    if !slaves_waiting(scheduler) {
                        return Poll::Pending;
                    }
                    sync.set_requested(true);
                    self.step = MasterStep::AwaitTimerSet;
                }
                MasterStep::AwaitTimerSet => {
                    if sync.state() != CoreState::TimerSet {
                        return Poll::Pending;
                    }
                    debug!("Master state changed to timer_set");
                    sync.set_requested(true);
                    self.step = MasterStep::AwaitRunning;
                }
                MasterStep::AwaitRunning => {
                    if sync.state() != CoreState::Running {
                        return Poll::Pending;
                    }
                    debug!("Master finished synchronization");
                    self.step = MasterStep::Done;
                }
                MasterStep::Done => return Poll::Ready(()),
            }
        }
    }
}

impl Default for MasterSync {
    fn default() -> Self {
        MasterSync::new()
    }
}

/// Is every slave either out of the barrier (`Inactive`) or `Waiting`?
fn slaves_waiting(scheduler: &Scheduler) -> bool {
    (0..MAX_CPU_CORES)
        .filter(|&core| core != MASTER_CORE)
        .all(|core| match scheduler.core_state(core) {
            CoreState::Inactive => true,
            state => state == CoreState::Waiting,
        })
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SlaveStep {
    Arrive,
    AwaitMaster,
    AwaitRunning,
    Done,
}

/// A slave's side of the barrier, one poll at a time
#[derive(Debug)]
pub struct SlaveSync {
    core: CoreId,
    offset: u32,
    step: SlaveStep,
}

impl SlaveSync {
    /// A barrier attempt for slave `core`, which will start `offset` ticks
    /// after the others
    ///
    /// Fails if `core` is out of range or is the master.
    pub fn new(core: CoreId, offset: u32) -> Result<SlaveSync, Error> {
        if core >= MAX_CPU_CORES || core == MASTER_CORE {
            return Err(Error::InvalidCore);
        }
        Ok(SlaveSync {
            core,
            offset,
            step: SlaveStep::Arrive,
        })
    }

    /// Go as far through the protocol as we can without waiting
    ///
    /// Returns `Ready` once this slave core is `Running`.
    pub fn poll(&mut self, scheduler: &Scheduler) -> Poll<()> {
        let cores = &scheduler.cores;
        let sync = &cores[self.core].sync;
        let master = &cores[MASTER_CORE].sync;
        loop {
            match self.step {
                SlaveStep::Arrive => {
                    debug!("Slave starting synchronization, core {=usize}", self.core);
                    sync.set_state(CoreState::Waiting);
                    self.step = SlaveStep::AwaitMaster;
                }
                SlaveStep::AwaitMaster => {
                    if master.state() != CoreState::TimerSet {
                        return Poll::Pending;
                    }
                    sync.set_state(CoreState::TimerSet);
                    debug!("Slave has set timer_set state, core {=usize}", self.core);
                    sync.set_offset(self.offset);
                    sync.set_requested(true);
                    self.step = SlaveStep::AwaitRunning;
                }
                SlaveStep::AwaitRunning => {
                    if sync.state() != CoreState::Running {
                        return Poll::Pending;
                    }
                    debug!("Slave finished synchronization, core {=usize}", self.core);
                    self.step = SlaveStep::Done;
                }
                SlaveStep::Done => return Poll::Ready(()),
            }
        }
    }
}

impl Scheduler {
    /// Master side of the barrier. Call from a task on [`MASTER_CORE`].
    ///
    /// Returns once every active slave has arrived and the master is
    /// `Running`. There is no timeout: if a slave never arrives, this spins
    /// forever. See [`Scheduler::sync_master_within`].
    ///
    /// Fails with [`Error::InvalidCore`] if `core` is not [`MASTER_CORE`].
    pub fn sync_master(&self, core: CoreId) -> Result<(), Error> {
        check_master(core)?;
        let mut barrier = MasterSync::new();
        while barrier.poll(self).is_pending() {
            self.port.spin_hint();
        }
        Ok(())
    }

    /// Like [`Scheduler::sync_master`], but gives up after `timeout` ticks
    ///
    /// On timeout the master's request is withdrawn and it goes back to
    /// `Active`.
    pub fn sync_master_within(&self, core: CoreId, timeout: u32) -> Result<(), Error> {
        check_master(core)?;
        let mut barrier = MasterSync::new();
        let result = self.spin_within(MASTER_CORE, timeout, |s| barrier.poll(s));
        if result.is_err() {
            warn!("Master barrier timed out after {=u32} ticks", timeout);
            abandon(&self.cores[MASTER_CORE]);
        }
        result
    }

    /// Slave side of the barrier. Call from a task on `core`.
    ///
    /// Returns once the master has armed the start and `offset` more ticks
    /// have passed on this core. There is no timeout. See
    /// [`Scheduler::sync_slave_within`].
    pub fn sync_slave(&self, core: CoreId, offset: u32) -> Result<(), Error> {
        let mut barrier = SlaveSync::new(core, offset)?;
        while barrier.poll(self).is_pending() {
            self.port.spin_hint();
        }
        Ok(())
    }

    /// Like [`Scheduler::sync_slave`], but gives up after `timeout` ticks of
    /// this core's clock
    ///
    /// On timeout the slave's request is withdrawn and it goes back to
    /// `Active`.
    pub fn sync_slave_within(
        &self,
        core: CoreId,
        offset: u32,
        timeout: u32,
    ) -> Result<(), Error> {
        let mut barrier = SlaveSync::new(core, offset)?;
        let result = self.spin_within(core, timeout, |s| barrier.poll(s));
        if result.is_err() {
            warn!(
                "Slave barrier timed out on core {=usize} after {=u32} ticks",
                core, timeout
            );
            abandon(&self.cores[core]);
        }
        result
    }

    /// Leave the measured phase and go back to `Active`
    ///
    /// Being anywhere but `Running` here is logged, then ignored.
    pub fn sync_reset(&self, core: CoreId) -> Result<(), Error> {
        let ccb = self.core_block(core)?;
        let state = ccb.sync.state();
        if state != CoreState::Running {
            warn!(
                "Sync reset while not running, core {=usize} state {}",
                core, state
            );
        }
        ccb.sync.set_state(CoreState::Active);
        Ok(())
    }

    fn spin_within(
        &self,
        core: CoreId,
        timeout: u32,
        mut poll: impl FnMut(&Scheduler) -> Poll<()>,
    ) -> Result<(), Error> {
        let start = self.cores[core].now();
        loop {
            if poll(self).is_ready() {
                return Ok(());
            }
            if self.cores[core].now().wrapping_sub(start) >= timeout {
                return Err(Error::Timeout);
            }
            self.port.spin_hint();
        }
    }
}

fn check_master(core: CoreId) -> Result<(), Error> {
    if core != MASTER_CORE {
        warn!("Master barrier called on core {=usize}", core);
        return Err(Error::InvalidCore);
    }
    Ok(())
}

/// Pull a core out of a barrier attempt that will not finish
fn abandon(ccb: &CoreControlBlock) {
    ccb.sync.set_requested(false);
    ccb.sync.set_offset(0);
    if ccb.sync.state() != CoreState::Inactive {
        ccb.sync.set_state(CoreState::Active);
    }
}


// End of File
