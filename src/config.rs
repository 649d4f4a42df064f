//! Compile-time limits and tuning for the scheduler

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::CoreId;

/// How many cores we keep a control block for
pub const MAX_CPU_CORES: usize = 4;

/// How many tasks each core can hold, idle task included
pub const MAX_TASKS_PER_CORE: usize = 8;

/// Scheduler ticks per second
///
/// This is also the length of the CPU load window, in ticks.
pub const TICK_RATE_HZ: u32 = 10_000;

/// Priority of the idle task. Nothing should sit below it.
pub const IDLE_PRIORITY: u8 = 0;

/// Longest task name we keep, in bytes. Longer names are truncated.
pub const MAX_TASK_NAME_LEN: usize = 15;

/// Stack depth (in words) given to each idle task
pub const MINIMAL_STACK_SIZE: usize = 128;

/// Name given to the idle task on every core
pub const IDLE_TASK_NAME: &str = "IDLE";

/// Name of the board heartbeat task.
///
/// Like the idle task, creating it does not make a core take part in the
/// start barrier.
pub const HEARTBEAT_TASK_NAME: &str = "HEARTBEAT";

/// The core that plays master in the start barrier
pub const MASTER_CORE: CoreId = 0;

/// Number of locks in a [`LockTable`](crate::LockTable) built with [`NR_OF_LOCKS`]
pub const NR_OF_LOCKS: usize = 2;

/// Lock id guarding the diagnostic UART
pub const UART_LOCK: usize = 0;

/// Lock id guarding memory shared by co-runner benchmarks
pub const MEM_LOCK: usize = 1;

/// Longest delay, in ticks, a task can ask for
///
/// Release times are compared across the tick counter wrapping, which only
/// works for points less than half the counter range apart. Longer delays
/// are cut down to this.
pub const MAX_DELAY_TICKS: u32 = i32::MAX as u32;

/// Ticks a core sleeps after each measured phase before reporting
pub const SETTLE_TICKS: u32 = 10;

/// Size of the buffer a console line is formatted into
pub const CONSOLE_LINE_LEN: usize = 256;

/// Words of RAM carved up into task stacks by the Cortex-M port
pub const TASK_STACK_POOL_WORDS: usize = 16384;

// End of File
