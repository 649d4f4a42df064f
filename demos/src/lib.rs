//! Common panic/fault handlers and the console for the demos

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

use defmt_semihosting as _;
use tandem::{Console, FilterLock, Level, Sink};

/// Sends console lines out through defmt, so they interleave with the logs
pub struct DefmtSink;

impl Sink for DefmtSink {
    fn write_str(&self, text: &str) {
        defmt::println!("{=str}", text.trim_end());
    }
}

/// The console every demo task prints results through
pub static CONSOLE: Console<DefmtSink, FilterLock> =
    Console::new(DefmtSink, FilterLock::new(1), Level::Info);

/// Called when a panic occurs.
///
/// Logs the panic to defmt and then crashes the CPU.
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::println!("PANIC: {}", defmt::Debug2Format(info));
    cortex_m::asm::udf();
}

/// Called when a HardFault occurs.
///
/// Logs the fault to defmt and then crashes the CPU.
#[cortex_m_rt::exception]
unsafe fn HardFault(info: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::println!("FAULT: {}", defmt::Debug2Format(info));
    cortex_m::asm::udf();
}

// End of File
