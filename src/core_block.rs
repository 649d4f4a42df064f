//! Holds the [`CoreControlBlock`] type and the barrier [`CoreState`]
//!
//! Each core owns one control block. The task array and lists inside it are
//! only ever touched by the owning core, under a critical section that keeps
//! that core's own tick interrupt out. The barrier fields and the tick
//! counter are atomics, because other cores poll them.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    cell::RefCell,
    sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering},
};

use critical_section::Mutex;

use crate::{
    config::{MAX_TASKS_PER_CORE, TICK_RATE_HZ},
    list::TaskList,
    task::{TaskControlBlock, TaskState},
};

/// Where a core is in the start barrier
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CoreState {
    /// No work has been given to this core; the barrier ignores it
    Inactive = 0,
    /// The core has a real task, and is not in the barrier
    Active = 1,
    /// Arrived at the barrier
    Waiting = 2,
    /// The master has seen everyone arrive and armed the start
    TimerSet = 3,
    /// Released into the measured phase
    Running = 4,
}

impl CoreState {
    /// The state the master moves to when its dispatch sees a request
    pub const fn master_successor(self) -> CoreState {
        match self {
            CoreState::Inactive => CoreState::Inactive,
            CoreState::Active => CoreState::Waiting,
            CoreState::Waiting => CoreState::TimerSet,
            CoreState::TimerSet => CoreState::Running,
            CoreState::Running => CoreState::Active,
        }
    }

    const fn from_u8(value: u8) -> CoreState {
        match value {
            1 => CoreState::Active,
            2 => CoreState::Waiting,
            3 => CoreState::TimerSet,
            4 => CoreState::Running,
            _ => CoreState::Inactive,
        }
    }
}

/// The barrier fields of a core, shared with every other core
pub(crate) struct SyncFields {
    state: AtomicU8,
    requested: AtomicBool,
    offset: AtomicU32,
}

impl SyncFields {
    const fn new() -> SyncFields {
        SyncFields {
            state: AtomicU8::new(CoreState::Inactive as u8),
            requested: AtomicBool::new(false),
            offset: AtomicU32::new(0),
        }
    }

    pub(crate) fn state(&self) -> CoreState {
        CoreState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: CoreState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Has this core asked its dispatcher to advance the barrier state?
    pub(crate) fn requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub(crate) fn set_requested(&self, requested: bool) {
        self.requested.store(requested, Ordering::SeqCst);
    }

    /// Extra ticks a slave waits in `TimerSet` before it runs
    pub(crate) fn offset(&self) -> u32 {
        self.offset.load(Ordering::SeqCst)
    }

    pub(crate) fn set_offset(&self, offset: u32) {
        self.offset.store(offset, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.set_state(CoreState::Inactive);
        self.set_requested(false);
        self.set_offset(0);
    }
}

/// The per-core state only the owning core touches
pub(crate) struct CoreTasks {
    pub(crate) tasks: [TaskControlBlock; MAX_TASKS_PER_CORE],
    pub(crate) ready: TaskList,
    pub(crate) delayed: TaskList,
    /// The task dispatch picked
    pub(crate) current: Option<usize>,
    /// The task whose context is live on the CPU
    pub(crate) running: Option<usize>,
    pub(crate) idle: Option<usize>,
    pub(crate) task_count: usize,
    /// Idle ticks seen so far in this load window
    pub(crate) idle_ticks: u32,
    /// Ticks seen so far in this load window
    pub(crate) window_ticks: u32,
    /// Idle ticks in the last complete load window
    pub(crate) last_window_idle: u32,
    /// Suspension nesting depth
    pub(crate) suspended: u32,
    pub(crate) scheduler_running: bool,
}

impl CoreTasks {
    const fn new() -> CoreTasks {
        CoreTasks {
            tasks: [const { TaskControlBlock::empty() }; MAX_TASKS_PER_CORE],
            ready: TaskList::new(),
            delayed: TaskList::new(),
            current: None,
            running: None,
            idle: None,
            task_count: 0,
            idle_ticks: 0,
            window_ticks: 0,
            last_window_idle: 0,
            suspended: 0,
            scheduler_running: false,
        }
    }

    /// Fold this tick into the CPU load window
    ///
    /// A window is complete once `TICK_RATE_HZ` ticks have been counted; the
    /// tick that notices this closes it and starts the next.
    pub(crate) fn account_load(&mut self) {
        if self.current.is_some() && self.current == self.idle {
            self.idle_ticks += 1;
        }
        if self.window_ticks >= TICK_RATE_HZ {
            self.window_ticks = 0;
            self.last_window_idle = self.idle_ticks;
            self.idle_ticks = 0;
        } else {
            self.window_ticks += 1;
        }
    }

    /// Move every delayed task whose release time has come to the ready list
    pub(crate) fn release_delayed(&mut self, now: u32) {
        if self.delayed.is_empty() {
            return;
        }
        let mut cursor = self.delayed.head();
        while let Some(idx) = cursor {
            cursor = self.tasks[idx].links.next;
            if tick_reached(now, self.tasks[idx].release_time) {
                self.delayed.remove(&mut self.tasks, idx);
                self.tasks[idx].state = TaskState::Ready;
                self.ready.push_back(&mut self.tasks, idx);
            }
        }
    }

    /// Pick the next current task, round robin
    ///
    /// Starting after the current task, skip candidates only while they have
    /// strictly lower priority than the current task. If we run off the end
    /// of the ready list, or the current task is not in it, take the head.
    ///
    /// Returns `true` if the current task changed.
    pub(crate) fn select_next(&mut self) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let current_priority = self.tasks[current].priority;

        let mut next = if self.tasks[current].state.is_ready() {
            self.tasks[current].links.next
        } else {
            None
        };
        while let Some(candidate) = next {
            if self.tasks[candidate].priority >= current_priority {
                break;
            }
            next = self.tasks[candidate].links.next;
        }

        let Some(chosen) = next.or(self.ready.head()) else {
            return false;
        };

        if self.tasks[current].state == TaskState::Running {
            self.tasks[current].state = TaskState::Ready;
        }
        self.tasks[chosen].state = TaskState::Running;
        self.current = Some(chosen);
        chosen != current
    }

    /// The percentage of the last complete window the core was not idle
    pub(crate) fn load_percent(&self) -> u32 {
        (TICK_RATE_HZ.saturating_sub(self.last_window_idle) * 100) / TICK_RATE_HZ
    }

    pub(crate) fn is_live(&self) -> bool {
        self.suspended == 0
    }
}

/// Is `now` at or past `release`, allowing for the counter wrapping?
pub(crate) fn tick_reached(now: u32, release: u32) -> bool {
    now.wrapping_sub(release) < (1 << 31)
}

/// Everything one core needs to schedule its tasks
pub struct CoreControlBlock {
    pub(crate) tasks: Mutex<RefCell<CoreTasks>>,
    pub(crate) sync: SyncFields,
    /// Monotonic OS tick counter
    pub(crate) ticks: AtomicU32,
    pub(crate) initialized: AtomicBool,
}

impl CoreControlBlock {
    /// A zeroed, uninitialised block
    pub const fn new() -> CoreControlBlock {
        CoreControlBlock {
            tasks: Mutex::new(RefCell::new(CoreTasks::new())),
            sync: SyncFields::new(),
            ticks: AtomicU32::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Mark this block ready for use, with the barrier reset
    pub(crate) fn initialize(&self) {
        self.sync.reset();
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Current OS tick count
    pub(crate) fn now(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Bump the tick counter and return the new value
    ///
    /// Only the owning core's tick interrupt calls this, so a plain load and
    /// store is enough (and works on cores without atomic read-modify-write).
    pub(crate) fn advance_ticks(&self) -> u32 {
        let now = self.ticks.load(Ordering::Relaxed).wrapping_add(1);
        self.ticks.store(now, Ordering::Relaxed);
        now
    }
}

impl Default for CoreControlBlock {
    fn default() -> Self {
        CoreControlBlock::new()
    }
}


// End of File
