//! Timing one measured phase across cores

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{CoreId, Error, Scheduler, config::{MASTER_CORE, SETTLE_TICKS}};

/// A free-running cycle counter, such as the Cortex-M DWT `CYCCNT`
pub trait CycleCounter {
    /// Set the count back to zero
    fn reset(&mut self);

    /// Cycles since the last reset
    fn read(&self) -> u32;
}

/// How a slave's start offset grows over the iterations of an experiment
///
/// Every `interval` iterations the offset goes up by `increment` ticks. An
/// interval of zero keeps the offset where it started.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OffsetSchedule {
    interval: u32,
    increment: u32,
    offset: u32,
    iteration: u32,
}

impl OffsetSchedule {
    /// A schedule at offset zero, before its first iteration
    ///
    /// The offset goes up by `increment` every `interval` iterations.
    pub const fn new(interval: u32, increment: u32) -> OffsetSchedule {
        OffsetSchedule {
            interval,
            increment,
            offset: 0,
            iteration: 0,
        }
    }

    /// The offset to use for this iteration
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// How many iterations have finished
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Finish an iteration
    pub fn advance(&mut self) {
        self.iteration = self.iteration.wrapping_add(1);
        if self.interval != 0 && self.iteration % self.interval == 0 {
            self.offset = self.offset.saturating_add(self.increment);
        }
    }
}

impl Scheduler {
    /// Run `body` as one measured phase on `core` and return its cycle count
    ///
    /// The core meets the others at the barrier (as master on
    /// [`MASTER_CORE`], otherwise as a slave starting `offset` ticks late).
    /// The body runs with this core's interrupts masked. Afterwards the core
    /// leaves the barrier and sleeps for [`SETTLE_TICKS`] so the others can
    /// finish before anyone starts reporting.
    pub fn measure<C, F>(
        &self,
        core: CoreId,
        offset: u32,
        counter: &mut C,
        body: F,
    ) -> Result<u32, Error>
    where
        C: CycleCounter,
        F: FnOnce(),
    {
        if core == MASTER_CORE {
            self.sync_master(core)?;
        } else {
            self.sync_slave(core, offset)?;
        }
        let cycles = critical_section::with(|_cs| {
            counter.reset();
            body();
            counter.read()
        });
        self.sync_reset(core)?;
        self.delay(core, SETTLE_TICKS);
        trace!("core {=usize} measured {=u32} cycles", core, cycles);
        Ok(cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_steps_every_interval() {
        let mut schedule = OffsetSchedule::new(3, 10);
        let mut offsets = Vec::new();
        for _ in 0..7 {
            offsets.push(schedule.offset());
            schedule.advance();
        }
        assert_eq!(offsets, [0, 0, 0, 10, 10, 10, 20]);
        assert_eq!(schedule.iteration(), 7);
    }

    #[test]
    fn zero_interval_never_moves() {
        let mut schedule = OffsetSchedule::new(0, 10);
        for _ in 0..5 {
            schedule.advance();
        }
        assert_eq!(schedule.offset(), 0);
    }
}

// End of File
