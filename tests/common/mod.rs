//! A simulated port, and helpers for driving schedulers by hand

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use tandem::{Context, CoreId, Error, Port, Scheduler, TaskEntryFn, TaskParam};

/// Records context switch requests. Contexts are just counters.
pub struct SimPort {
    next_context: AtomicUsize,
    switch_requests: AtomicUsize,
}

impl SimPort {
    pub const FREQUENCY: u32 = 1_000_000;

    pub fn new() -> SimPort {
        SimPort {
            next_context: AtomicUsize::new(0x1000),
            switch_requests: AtomicUsize::new(0),
        }
    }

    pub fn switch_requests(&self) -> usize {
        self.switch_requests.load(Ordering::SeqCst)
    }
}

impl Port for SimPort {
    fn core_id(&self) -> CoreId {
        0
    }

    fn timer_frequency(&self) -> u32 {
        Self::FREQUENCY
    }

    fn init_context(
        &self,
        _entry: TaskEntryFn,
        _param: TaskParam,
        _stack_depth: usize,
    ) -> Result<Context, Error> {
        Ok(self.next_context.fetch_add(0x100, Ordering::SeqCst))
    }

    fn request_switch(&self) {
        self.switch_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn start_secondary(&self, _core: CoreId, _tick_divisor: u32) {}

    fn start_primary(&self, _tick_divisor: u32) -> ! {
        panic!("cannot run tasks in a simulation");
    }

    fn spin_hint(&self) {
        std::thread::yield_now();
    }
}

/// A fresh, initialised scheduler that lives for the rest of the test run
pub fn scheduler() -> (&'static Scheduler, &'static SimPort) {
    let port: &'static SimPort = Box::leak(Box::new(SimPort::new()));
    let scheduler: &'static Scheduler = Box::leak(Box::new(Scheduler::new(port)));
    scheduler.init();
    (scheduler, port)
}

/// A task body. Simulated tasks never actually run.
pub extern "C" fn task(_param: TaskParam) -> ! {
    loop {
        std::thread::park();
    }
}

/// Give `core` a real task, which brings it into the barrier
pub fn activate(scheduler: &Scheduler, core: CoreId) {
    let name = format!("Core{core}");
    scheduler
        .create_task(core, task, &name, 256, core, 2)
        .expect("room for a task");
}

/// One tick on every core, in order
pub fn tick_all(scheduler: &Scheduler) {
    for core in 0..tandem::config::MAX_CPU_CORES {
        scheduler.tick_isr(core);
    }
}

// End of File
