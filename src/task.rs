//! Holds the [`TaskControlBlock`] type and the task handle types

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{
    Context, CoreId,
    config::MAX_TASK_NAME_LEN,
    list::{Linked, Links},
};

/// The parameter handed to a task's entry function
pub type TaskParam = usize;

/// The entry function of a task. Tasks never return.
pub type TaskEntryFn = extern "C" fn(TaskParam) -> !;

/// A task name, truncated to [`MAX_TASK_NAME_LEN`] bytes
pub type TaskName = heapless::String<MAX_TASK_NAME_LEN>;

/// Identifies a task: the core it lives on, and its slot on that core
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    core: CoreId,
    slot: usize,
}

impl TaskHandle {
    pub(crate) const fn new(core: CoreId, slot: usize) -> TaskHandle {
        TaskHandle { core, slot }
    }

    /// The core this task is assigned to
    pub const fn core(self) -> CoreId {
        self.core
    }

    /// The task's slot in its core's task array
    pub const fn slot(self) -> usize {
        self.slot
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskHandle {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "C{=usize}T{=usize:03}", self.core, self.slot);
    }
}

impl core::fmt::Display for TaskHandle {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(fmt, "C{}T{:03}", self.core, self.slot)
    }
}

/// Where a task is in its life
///
/// `Ready` and `Running` tasks are in the core's ready list; `Blocked` tasks
/// are in its delayed list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Waiting in the ready list for its turn
    Ready,
    /// Selected as the core's current task
    Running,
    /// Sleeping in the delayed list until its release time
    Blocked,
}

impl TaskState {
    /// The single character used for this state in task listings
    pub const fn as_char(self) -> char {
        match self {
            TaskState::Running => 'X',
            TaskState::Ready => 'R',
            TaskState::Blocked => 'B',
        }
    }

    /// Does a task in this state belong in the ready list?
    pub const fn is_ready(self) -> bool {
        matches!(self, TaskState::Ready | TaskState::Running)
    }
}

/// Per-task bookkeeping
///
/// One of these sits in every slot of a core's task array. Slots are handed
/// out once, at task creation, and never given back.
pub(crate) struct TaskControlBlock {
    /// Opaque saved context, owned by the port's context switch
    pub(crate) context: Context,
    /// Links into the ready or delayed list
    pub(crate) links: Links,
    /// Tick count at which a delayed task becomes ready again
    pub(crate) release_time: u32,
    /// 0 is the lowest priority
    pub(crate) priority: u8,
    pub(crate) state: TaskState,
    /// Stack depth we were asked for, in words
    pub(crate) stack_depth: usize,
    pub(crate) in_use: bool,
    pub(crate) name: TaskName,
}

impl TaskControlBlock {
    /// A free slot
    pub(crate) const fn empty() -> TaskControlBlock {
        TaskControlBlock {
            context: 0,
            links: Links::new(),
            release_time: 0,
            priority: 0,
            state: TaskState::Ready,
            stack_depth: 0,
            in_use: false,
            name: TaskName::new(),
        }
    }

    /// Claim this slot for a new task
    pub(crate) fn claim(
        &mut self,
        name: &str,
        priority: u8,
        stack_depth: usize,
        context: Context,
    ) {
        self.context = context;
        self.links = Links::new();
        self.release_time = 0;
        self.priority = priority;
        self.state = TaskState::Ready;
        self.stack_depth = stack_depth;
        self.in_use = true;
        self.name = truncate_name(name);
    }
}

impl Linked for TaskControlBlock {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

/// Copy as much of `name` as fits, stopping on a char boundary
fn truncate_name(name: &str) -> TaskName {
    let mut short = TaskName::new();
    for c in name.chars() {
        if short.push(c).is_err() {
            break;
        }
    }
    short
}

/// One row of a task listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskInfo {
    /// Which task this is
    pub handle: TaskHandle,
    /// The (possibly truncated) task name
    pub name: TaskName,
    /// The task's priority
    pub priority: u8,
    /// Where the task is right now
    pub state: TaskState,
    /// Stack depth the task was created with, in words
    pub stack_depth: usize,
}

impl core::fmt::Display for TaskInfo {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            fmt,
            "{:<width$} {} {:>3} {:>5} {}",
            self.name.as_str(),
            self.state.as_char(),
            self.priority,
            self.stack_depth,
            self.handle,
            width = MAX_TASK_NAME_LEN
        )
    }
}


// End of File
