//! Times a small workload over and over, with a growing start offset
//!
//! QEMU only gives us one core, so the barrier has no slaves to wait for,
//! but the master still goes through every step of it each iteration.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use cortex_m::peripheral::DWT;
use tandem::{
    CycleCounter, CycleReport, Level, OffsetSchedule, Scheduler, TaskParam,
    config::{HEARTBEAT_TASK_NAME, MASTER_CORE, TICK_RATE_HZ},
    port::cortex_m::CortexM,
};

use tandem_demos::CONSOLE;

/// The MPS2 AN385 runs at 25 MHz
const CLOCK_HZ: u32 = 25_000_000;

const ITERATIONS: u32 = 20;

/// Iterations between offset steps
const OFFSET_INTERVAL: u32 = 5;

/// Ticks added to the offset at each step
const OFFSET_STEP: u32 = 2;

static PORT: CortexM = CortexM::single_core(CLOCK_HZ);

static SCHEDULER: Scheduler = Scheduler::new(&PORT);

#[cortex_m_rt::entry]
fn main() -> ! {
    let mut cp = cortex_m::Peripherals::take().unwrap();
    cp.DCB.enable_trace();
    cp.DWT.enable_cycle_counter();
    defmt::info!("Hello!");

    SCHEDULER.init();
    SCHEDULER
        .create_task(MASTER_CORE, measurer, "Core0", 1024, 0, 2)
        .unwrap();
    SCHEDULER
        .create_task(MASTER_CORE, heartbeat, HEARTBEAT_TASK_NAME, 512, 0, 1)
        .unwrap();
    SCHEDULER.start();
}

/// The DWT cycle counter
struct DwtCycles;

impl CycleCounter for DwtCycles {
    fn reset(&mut self) {
        // SAFETY: only the measuring task touches CYCCNT, and the counter
        // was enabled in main
        unsafe { (*DWT::PTR).cyccnt.write(0) }
    }

    fn read(&self) -> u32 {
        DWT::cycle_count()
    }
}

/// What we are timing
fn workload() {
    let mut acc = 0u32;
    for i in 0..1000 {
        acc = acc.wrapping_add(core::hint::black_box(i));
    }
    core::hint::black_box(acc);
}

/// Our measuring task
extern "C" fn measurer(_param: TaskParam) -> ! {
    let mut schedule = OffsetSchedule::new(OFFSET_INTERVAL, OFFSET_STEP);
    let mut counter = DwtCycles;
    let core = tandem::current_core();
    while schedule.iteration() < ITERATIONS {
        match tandem::measure(schedule.offset(), &mut counter, workload) {
            Ok(cycle_count) => {
                let report = CycleReport {
                    label: "sum1000",
                    cores: 1,
                    core,
                    cycle_count,
                    iteration: schedule.iteration(),
                    offset: schedule.offset(),
                };
                CONSOLE.log(core, Level::Info, "measurer", format_args!("{}", report));
            }
            Err(e) => defmt::error!("Measurement failed: {}", e),
        }
        schedule.advance();
    }
    defmt::info!("Done after {=u32} iterations", ITERATIONS);
    semihosting::process::exit(0);
}

/// Reports the core load once a second
extern "C" fn heartbeat(_param: TaskParam) -> ! {
    loop {
        defmt::info!("Load {=u32}%", tandem::load_percent());
        tandem::delay(TICK_RATE_HZ);
    }
}

// End of File
