//! Three tasks that sleep for different numbers of ticks

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use tandem::{Scheduler, TaskParam, port::cortex_m::CortexM};

use tandem_demos as _;

static PORT: CortexM = CortexM::single_core(25_000_000);

static SCHEDULER: Scheduler = Scheduler::new(&PORT);

#[cortex_m_rt::entry]
fn main() -> ! {
    defmt::info!("Hello!");
    SCHEDULER.init();
    for (name, period) in [("rabbits", 5), ("hamsters", 10), ("cats", 3)] {
        SCHEDULER.create_task(0, pet, name, 512, period, 2).unwrap();
    }
    SCHEDULER.start();
}

/// Every pet task says hello, then sleeps for `period` ticks
extern "C" fn pet(period: TaskParam) -> ! {
    loop {
        defmt::info!("Pet! (back in {=usize})", period);
        tandem::delay(period as u32);
    }
}

// End of File
