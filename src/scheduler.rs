//! Contains the [`Scheduler`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, Ordering};

use crate::{
    Context, CoreId, Error, Port, TaskEntryFn, TaskParam,
    config::{
        HEARTBEAT_TASK_NAME, IDLE_PRIORITY, IDLE_TASK_NAME, MAX_CPU_CORES, MAX_DELAY_TICKS,
        MAX_TASKS_PER_CORE, MINIMAL_STACK_SIZE, TICK_RATE_HZ,
    },
    core_block::{CoreControlBlock, CoreState, CoreTasks},
    task::{TaskHandle, TaskInfo, TaskName, TaskState},
};

/// The location of our one and only running [`Scheduler`] object.
///
/// The free functions and the interrupt handlers use this to find the system
/// state without being handed a reference.
pub(crate) static SCHEDULER_PTR: AtomicPtr<Scheduler> = AtomicPtr::new(core::ptr::null_mut());

/// A pre-emptive, per-core, round-robin scheduler
///
/// Every core runs its own scheduler instance over its own fixed set of
/// tasks. Tasks never move between cores. On each tick the core's timer
/// interrupt calls [`Scheduler::tick_isr`], which advances the clock, wakes
/// sleeping tasks, picks the next task, and moves the start barrier along.
pub struct Scheduler {
    /// One control block per core
    pub(crate) cores: [CoreControlBlock; MAX_CPU_CORES],
    /// How we talk to the hardware
    pub(crate) port: &'static dyn Port,
    /// Timer clocks per scheduler tick, computed at start
    tick_divisor: AtomicU32,
    /// Set once [`Scheduler::prepare_start`] has run
    started: AtomicBool,
}

impl Scheduler {
    /// Build a scheduler with every core inactive and empty
    pub const fn new(port: &'static dyn Port) -> Scheduler {
        Scheduler {
            cores: [const { CoreControlBlock::new() }; MAX_CPU_CORES],
            port,
            tick_divisor: AtomicU32::new(0),
            started: AtomicBool::new(false),
        }
    }

    /// One-time system setup. Call this before anything else.
    ///
    /// Marks every core block initialised, puts every core's barrier state
    /// back to `Inactive`, and makes this the scheduler the free functions
    /// (like [`delay`](crate::delay)) and interrupt handlers use.
    pub fn init(&'static self) {
        for ccb in self.cores.iter() {
            ccb.initialize();
        }
        let self_addr = self as *const Scheduler as *mut Scheduler;
        SCHEDULER_PTR.store(self_addr, Ordering::Release);
        debug!("Scheduler @ {=usize:08x}", self_addr as usize);
    }

    /// Get the global scheduler, if one has been initialised
    pub(crate) fn get() -> Option<&'static Scheduler> {
        let scheduler_ptr = SCHEDULER_PTR.load(Ordering::Acquire);
        if scheduler_ptr.is_null() {
            None
        } else {
            // SAFETY: Only [`Scheduler::init`] writes to [`SCHEDULER_PTR`] and
            // it always stores a pointer to a `'static` scheduler.
            Some(unsafe { &*scheduler_ptr })
        }
    }

    /// The port this scheduler drives
    pub fn port(&self) -> &'static dyn Port {
        self.port
    }

    /// Timer clocks per tick, or zero if we have not started
    pub fn tick_divisor(&self) -> u32 {
        self.tick_divisor.load(Ordering::Relaxed)
    }

    pub(crate) fn core_block(&self, core: CoreId) -> Result<&CoreControlBlock, Error> {
        self.cores.get(core).ok_or(Error::InvalidCore)
    }

    /// Run `f` with exclusive access to a core's task state
    pub(crate) fn with_tasks<R>(
        &self,
        ccb: &CoreControlBlock,
        f: impl FnOnce(&mut CoreTasks) -> R,
    ) -> R {
        critical_section::with(|cs| f(&mut ccb.tasks.borrow_ref_mut(cs)))
    }

    /// Create a task on the given core
    ///
    /// The task goes to the back of the core's ready list. The first task
    /// made on a core becomes its current task. Any task not called
    /// [`IDLE_TASK_NAME`] or [`HEARTBEAT_TASK_NAME`] marks the core
    /// [`CoreState::Active`], so the start barrier will wait for it.
    pub fn create_task(
        &self,
        core: CoreId,
        entry: TaskEntryFn,
        name: &str,
        stack_depth: usize,
        param: TaskParam,
        priority: u8,
    ) -> Result<TaskHandle, Error> {
        let ccb = self.core_block(core)?;
        let handle = self.with_tasks(ccb, |tasks| {
            let Some(slot) = tasks.tasks.iter().position(|tcb| !tcb.in_use) else {
                warn!("No free task slot on core {=usize} for {=str}", core, name);
                return Err(Error::ResourceExhausted);
            };
            let context = self.port.init_context(entry, param, stack_depth)?;
            tasks.tasks[slot].claim(name, priority, stack_depth, context);
            tasks.task_count += 1;
            if tasks.current.is_none() {
                tasks.current = Some(slot);
            }
            tasks.ready.push_back(&mut tasks.tasks, slot);
            Ok(TaskHandle::new(core, slot))
        })?;

        if name != IDLE_TASK_NAME && name != HEARTBEAT_TASK_NAME {
            debug!(
                "Setting state to active core={=usize} task name={=str}",
                core, name
            );
            ccb.sync.set_state(CoreState::Active);
        }
        Ok(handle)
    }

    /// Tick bookkeeping for one core
    ///
    /// Updates the CPU load window, bumps the tick counter, and moves every
    /// delayed task whose release time has come onto the ready list. Does
    /// nothing on an uninitialised or suspended core.
    pub fn on_tick(&self, core: CoreId) {
        let Ok(ccb) = self.core_block(core) else {
            return;
        };
        if !ccb.is_initialized() {
            return;
        }
        self.with_tasks(ccb, |tasks| {
            if !tasks.is_live() {
                return;
            }
            tasks.account_load();
            let now = ccb.advance_ticks();
            tasks.release_delayed(now);
        });
    }

    /// Pick the next task for one core, and step its barrier state
    ///
    /// Returns `true` if the current task changed, i.e. a context switch is
    /// needed. Does nothing on an uninitialised or suspended core.
    pub fn dispatch(&self, core: CoreId) -> bool {
        let Ok(ccb) = self.core_block(core) else {
            return false;
        };
        if !ccb.is_initialized() {
            return false;
        }
        self.with_tasks(ccb, |tasks| {
            if !tasks.is_live() {
                return false;
            }
            let switched = tasks.select_next();
            crate::sync::advance_barrier(core, ccb);
            switched
        })
    }

    /// The tick interrupt for one core: [`Scheduler::on_tick`] then
    /// [`Scheduler::dispatch`], as one step
    ///
    /// Returns `true` if the port should switch context.
    pub fn tick_isr(&self, core: CoreId) -> bool {
        critical_section::with(|_cs| {
            self.on_tick(core);
            self.dispatch(core)
        })
    }

    /// Put the calling task to sleep for `ticks` ticks
    ///
    /// The current task on `core` moves to the delayed list, the next task
    /// is picked, and the port is asked to switch to it. On hardware the call
    /// returns once the release time has passed and the task has been picked
    /// again. A delay of zero does nothing. Delays longer than
    /// [`MAX_DELAY_TICKS`] are cut down to it.
    pub fn delay(&self, core: CoreId, ticks: u32) {
        if ticks == 0 {
            return;
        }
        let ticks = ticks.min(MAX_DELAY_TICKS);
        let Ok(ccb) = self.core_block(core) else {
            return;
        };
        let blocked = self.with_tasks(ccb, |tasks| {
            let Some(current) = tasks.current else {
                return false;
            };
            if !tasks.tasks[current].state.is_ready() {
                return false;
            }
            debug_assert!(tasks.ready.contains(&tasks.tasks, current));
            tasks.tasks[current].release_time = ccb.now().wrapping_add(ticks);
            tasks.ready.remove(&mut tasks.tasks, current);
            tasks.tasks[current].state = TaskState::Blocked;
            tasks.delayed.push_back(&mut tasks.tasks, current);
            if tasks.is_live() {
                tasks.select_next();
            }
            true
        });
        if blocked {
            trace!("core {=usize} delays for {=u32} ticks", core, ticks);
            self.port.request_switch();
        }
    }

    /// Stop scheduling on a core until the guard is dropped
    ///
    /// Guards nest. While any is alive, ticks are not counted and the current
    /// task is not changed.
    pub fn suspend(&self, core: CoreId) -> Result<SuspendGuard<'_>, Error> {
        let ccb = self.core_block(core)?;
        self.with_tasks(ccb, |tasks| tasks.suspended += 1);
        Ok(SuspendGuard {
            scheduler: self,
            core,
        })
    }

    /// The OS tick count of a core
    ///
    /// # Panics
    ///
    /// If `core` is out of range.
    pub fn now(&self, core: CoreId) -> u32 {
        self.cores[core].now()
    }

    /// How many tasks have been created on a core
    ///
    /// # Panics
    ///
    /// If `core` is out of range.
    pub fn task_count(&self, core: CoreId) -> usize {
        self.with_tasks(&self.cores[core], |tasks| tasks.task_count)
    }

    /// Percentage (0 to 100) of the last complete one-second window in which
    /// the core was not running its idle task
    ///
    /// Until the first window completes this reports 100.
    ///
    /// # Panics
    ///
    /// If `core` is out of range.
    pub fn load_percent(&self, core: CoreId) -> u32 {
        self.with_tasks(&self.cores[core], |tasks| tasks.load_percent())
    }

    /// The task dispatch last picked on a core
    ///
    /// # Panics
    ///
    /// If `core` is out of range.
    pub fn current_task(&self, core: CoreId) -> Option<TaskHandle> {
        self.with_tasks(&self.cores[core], |tasks| {
            tasks.current.map(|slot| TaskHandle::new(core, slot))
        })
    }

    /// The state of a task, if the handle refers to one
    pub fn task_state(&self, handle: TaskHandle) -> Option<TaskState> {
        let ccb = self.core_block(handle.core()).ok()?;
        self.with_tasks(ccb, |tasks| {
            let tcb = tasks.tasks.get(handle.slot())?;
            tcb.in_use.then_some(tcb.state)
        })
    }

    /// The (possibly truncated) name of a task, if the handle refers to one
    pub fn task_name(&self, handle: TaskHandle) -> Option<TaskName> {
        let ccb = self.core_block(handle.core()).ok()?;
        self.with_tasks(ccb, |tasks| {
            let tcb = tasks.tasks.get(handle.slot())?;
            tcb.in_use.then(|| tcb.name.clone())
        })
    }

    /// Where a core is in the start barrier
    ///
    /// # Panics
    ///
    /// If `core` is out of range.
    pub fn core_state(&self, core: CoreId) -> CoreState {
        self.cores[core].sync.state()
    }

    /// A core's ready list, head first
    ///
    /// # Panics
    ///
    /// If `core` is out of range.
    pub fn ready_tasks(&self, core: CoreId) -> heapless::Vec<TaskHandle, MAX_TASKS_PER_CORE> {
        self.with_tasks(&self.cores[core], |tasks| {
            tasks
                .ready
                .iter(&tasks.tasks)
                .map(|slot| TaskHandle::new(core, slot))
                .collect()
        })
    }

    /// A core's delayed list, head first
    ///
    /// # Panics
    ///
    /// If `core` is out of range.
    pub fn delayed_tasks(&self, core: CoreId) -> heapless::Vec<TaskHandle, MAX_TASKS_PER_CORE> {
        self.with_tasks(&self.cores[core], |tasks| {
            tasks
                .delayed
                .iter(&tasks.tasks)
                .map(|slot| TaskHandle::new(core, slot))
                .collect()
        })
    }

    /// Every task on a core, in slot order
    ///
    /// # Panics
    ///
    /// If `core` is out of range.
    pub fn task_list(&self, core: CoreId) -> heapless::Vec<TaskInfo, MAX_TASKS_PER_CORE> {
        self.with_tasks(&self.cores[core], |tasks| {
            tasks
                .tasks
                .iter()
                .enumerate()
                .filter(|(_, tcb)| tcb.in_use)
                .map(|(slot, tcb)| TaskInfo {
                    handle: TaskHandle::new(core, slot),
                    name: tcb.name.clone(),
                    priority: tcb.priority,
                    state: tcb.state,
                    stack_depth: tcb.stack_depth,
                })
                .collect()
        })
    }

    /// Swap the saved context of the outgoing task for that of the current one
    ///
    /// The port's context switch calls this with the context it just saved.
    /// It gets back the context to restore. Until a task has run on this
    /// core, `saved` is discarded.
    pub fn switch_context(&self, core: CoreId, saved: Context) -> Context {
        let Ok(ccb) = self.core_block(core) else {
            return saved;
        };
        self.with_tasks(ccb, |tasks| {
            if let Some(running) = tasks.running {
                tasks.tasks[running].context = saved;
            }
            match tasks.current {
                Some(current) => {
                    tasks.running = Some(current);
                    tasks.tasks[current].context
                }
                None => saved,
            }
        })
    }

    /// Everything [`Scheduler::start`] does short of starting the cores
    ///
    /// Adds an idle task at [`IDLE_PRIORITY`] to every core and works out
    /// the tick divisor, which it returns. If any core has no room for its
    /// idle task, nothing is changed and the call can be made again once
    /// the problem is fixed.
    pub fn prepare_start(&self) -> Result<u32, Error> {
        if !self.cores.iter().all(|ccb| ccb.is_initialized()) {
            return Err(Error::PreconditionViolated);
        }
        if let Some(core) = self
            .cores
            .iter()
            .position(|ccb| self.with_tasks(ccb, |tasks| tasks.task_count >= MAX_TASKS_PER_CORE))
        {
            warn!("No room for an idle task on core {=usize}", core);
            return Err(Error::ResourceExhausted);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::PreconditionViolated);
        }

        if let Err(e) = self.create_idle_tasks() {
            // cores that got an idle task keep it, and are skipped next time
            self.started.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let divisor = self.port.timer_frequency() / TICK_RATE_HZ;
        self.tick_divisor.store(divisor, Ordering::Relaxed);
        info!(
            "Tick rate {=u32} Hz, divisor {=u32}",
            TICK_RATE_HZ, divisor
        );
        Ok(divisor)
    }

    /// Give every core that does not have one an idle task
    fn create_idle_tasks(&self) -> Result<(), Error> {
        for (core, ccb) in self.cores.iter().enumerate() {
            if self.with_tasks(ccb, |tasks| tasks.idle.is_some()) {
                continue;
            }
            let idle = self.create_task(
                core,
                idle_task,
                IDLE_TASK_NAME,
                MINIMAL_STACK_SIZE,
                0,
                IDLE_PRIORITY,
            )?;
            self.with_tasks(ccb, |tasks| {
                tasks.idle = Some(idle.slot());
                tasks.scheduler_running = true;
            });
        }
        Ok(())
    }

    /// Start every core. Does not return.
    ///
    /// Secondary cores are started highest first, then the calling core.
    ///
    /// # Panics
    ///
    /// If the scheduler was not initialised, was already started, or a core
    /// has no room for its idle task.
    pub fn start(&'static self) -> ! {
        let divisor = match self.prepare_start() {
            Ok(divisor) => divisor,
            Err(e) => panic!("Cannot start scheduler: {}", e),
        };
        for core in (1..MAX_CPU_CORES).rev() {
            debug!("Starting core {=usize}", core);
            self.port.start_secondary(core, divisor);
        }
        self.port.start_primary(divisor)
    }

    /// Has this core been through [`Scheduler::prepare_start`]?
    pub fn is_running(&self, core: CoreId) -> bool {
        self.core_block(core)
            .map(|ccb| self.with_tasks(ccb, |tasks| tasks.scheduler_running))
            .unwrap_or(false)
    }
}

/// Keeps a core's scheduler suspended while alive
///
/// Made by [`Scheduler::suspend`].
pub struct SuspendGuard<'a> {
    scheduler: &'a Scheduler,
    core: CoreId,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        let ccb = &self.scheduler.cores[self.core];
        self.scheduler
            .with_tasks(ccb, |tasks| tasks.suspended = tasks.suspended.saturating_sub(1));
    }
}

/// The task every core falls back to when nothing else is ready
extern "C" fn idle_task(_param: TaskParam) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::testing::{TestPort, leak_scheduler, worker};

    fn handles(core: CoreId, slots: &[usize]) -> Vec<TaskHandle> {
        slots.iter().map(|&slot| TaskHandle::new(core, slot)).collect()
    }

    #[test]
    fn tasks_join_the_ready_list_in_creation_order() {
        let (scheduler, _) = leak_scheduler();
        for i in 0..5 {
            scheduler.create_task(2, worker, "w", 256, i, 2).unwrap();
        }
        assert_eq!(scheduler.task_count(2), 5);
        assert_eq!(scheduler.ready_tasks(2).as_slice(), handles(2, &[0, 1, 2, 3, 4]));
        assert_eq!(scheduler.current_task(2), Some(TaskHandle::new(2, 0)));
        assert_eq!(scheduler.task_count(1), 0);
    }

    #[test]
    fn full_core_refuses_more_tasks() {
        let (scheduler, _) = leak_scheduler();
        for _ in 0..MAX_TASKS_PER_CORE {
            scheduler.create_task(1, worker, "w", 256, 0, 2).unwrap();
        }
        assert_eq!(
            scheduler.create_task(1, worker, "extra", 256, 0, 2),
            Err(Error::ResourceExhausted)
        );
        assert_eq!(scheduler.task_count(1), MAX_TASKS_PER_CORE);
        assert_eq!(
            scheduler.create_task(MAX_CPU_CORES, worker, "w", 256, 0, 2),
            Err(Error::InvalidCore)
        );
    }

    #[test]
    fn only_real_tasks_activate_a_core() {
        let (scheduler, _) = leak_scheduler();
        scheduler
            .create_task(3, worker, HEARTBEAT_TASK_NAME, 256, 0, 2)
            .unwrap();
        scheduler.create_task(3, worker, IDLE_TASK_NAME, 256, 0, 0).unwrap();
        assert_eq!(scheduler.core_state(3), CoreState::Inactive);
        scheduler.create_task(3, worker, "Core3", 256, 0, 2).unwrap();
        assert_eq!(scheduler.core_state(3), CoreState::Active);
    }

    #[test]
    fn equal_priority_beats_lower_priority_in_list_order() {
        // ready list: low(2), high(4), idle(0)
        let (scheduler, _) = leak_scheduler();
        let low = scheduler.create_task(0, worker, "low", 256, 0, 2).unwrap();
        let high = scheduler.create_task(0, worker, "high", 256, 0, 4).unwrap();
        scheduler.prepare_start().unwrap();

        let picks: Vec<_> = (0..5)
            .map(|_| {
                scheduler.dispatch(0);
                scheduler.current_task(0).unwrap()
            })
            .collect();
        assert_eq!(picks, [high, low, high, low, high]);
    }

    #[test]
    fn higher_priority_first_in_list_keeps_the_core() {
        // ready list: high(4), low(2), idle(0)
        let (scheduler, _) = leak_scheduler();
        let high = scheduler.create_task(0, worker, "high", 256, 0, 4).unwrap();
        scheduler.create_task(0, worker, "low", 256, 0, 2).unwrap();
        scheduler.prepare_start().unwrap();

        for _ in 0..5 {
            scheduler.dispatch(0);
            assert_eq!(scheduler.current_task(0), Some(high));
        }
        assert_eq!(scheduler.task_state(high), Some(TaskState::Running));
    }

    #[test]
    fn delay_zero_is_a_no_op() {
        let (scheduler, port) = leak_scheduler();
        let task = scheduler.create_task(0, worker, "w", 256, 0, 2).unwrap();
        scheduler.prepare_start().unwrap();
        scheduler.delay(0, 0);
        assert_eq!(scheduler.task_state(task), Some(TaskState::Ready));
        assert!(scheduler.ready_tasks(0).contains(&task));
        assert_eq!(scheduler.current_task(0), Some(task));
        assert_eq!(port.switch_requests(), 0);
    }

    #[test]
    fn delayed_task_sleeps_until_its_release_tick() {
        let (scheduler, port) = leak_scheduler();
        let task = scheduler.create_task(0, worker, "w", 256, 0, 2).unwrap();
        scheduler.prepare_start().unwrap();
        for _ in 0..3 {
            scheduler.on_tick(0);
        }
        let start = scheduler.now(0);

        scheduler.delay(0, 5);
        assert_eq!(port.switch_requests(), 1);
        assert_eq!(scheduler.task_state(task), Some(TaskState::Blocked));
        assert_eq!(scheduler.delayed_tasks(0).as_slice(), [task]);
        assert_ne!(scheduler.current_task(0), Some(task));

        while scheduler.now(0) < start + 4 {
            scheduler.tick_isr(0);
            assert_ne!(scheduler.current_task(0), Some(task));
            assert_eq!(scheduler.task_state(task), Some(TaskState::Blocked));
        }
        scheduler.tick_isr(0);
        assert_eq!(scheduler.now(0), start + 5);
        assert!(scheduler.delayed_tasks(0).is_empty());
        assert_eq!(scheduler.current_task(0), Some(task));
    }

    #[test]
    fn idle_core_reports_no_load_after_a_window() {
        let (scheduler, _) = leak_scheduler();
        scheduler.prepare_start().unwrap();
        assert_eq!(scheduler.load_percent(1), 100);
        for _ in 0..=TICK_RATE_HZ {
            scheduler.tick_isr(1);
        }
        assert_eq!(scheduler.load_percent(1), 0);
    }

    #[test]
    fn busy_core_reports_full_load() {
        let (scheduler, _) = leak_scheduler();
        scheduler.create_task(1, worker, "busy", 256, 0, 2).unwrap();
        scheduler.prepare_start().unwrap();
        // no dispatch, so the worker stays current all window
        for _ in 0..=TICK_RATE_HZ {
            scheduler.on_tick(1);
        }
        assert_eq!(scheduler.load_percent(1), 100);
    }

    #[test]
    fn suspended_core_ignores_ticks() {
        let (scheduler, _) = leak_scheduler();
        scheduler.prepare_start().unwrap();
        {
            let _outer = scheduler.suspend(0).unwrap();
            let _inner = scheduler.suspend(0).unwrap();
            scheduler.tick_isr(0);
        }
        assert_eq!(scheduler.now(0), 0);
        scheduler.tick_isr(0);
        assert_eq!(scheduler.now(0), 1);
    }

    #[test]
    fn uninitialised_scheduler_ignores_ticks() {
        let port: &'static TestPort = Box::leak(Box::new(TestPort::new()));
        let scheduler = Scheduler::new(port);
        assert!(!scheduler.tick_isr(0));
        assert_eq!(scheduler.now(0), 0);
        assert_eq!(scheduler.prepare_start(), Err(Error::PreconditionViolated));
    }

    #[test]
    fn full_core_leaves_start_untouched() {
        let (scheduler, _) = leak_scheduler();
        for _ in 0..MAX_TASKS_PER_CORE {
            scheduler.create_task(2, worker, "w", 256, 0, 2).unwrap();
        }
        assert_eq!(scheduler.prepare_start(), Err(Error::ResourceExhausted));
        assert_eq!(scheduler.task_count(0), 0);
        assert_eq!(scheduler.task_count(1), 0);
        assert!(!scheduler.is_running(0));
        assert_eq!(scheduler.tick_divisor(), 0);
        // still not started, so asking again gives the same answer
        assert_eq!(scheduler.prepare_start(), Err(Error::ResourceExhausted));
    }

    #[test]
    fn failed_idle_creation_can_be_retried() {
        let (scheduler, _) = leak_scheduler();
        for _ in 0..MAX_TASKS_PER_CORE {
            scheduler.create_task(3, worker, "w", 256, 0, 2).unwrap();
        }
        assert_eq!(scheduler.create_idle_tasks(), Err(Error::ResourceExhausted));
        assert!(scheduler.is_running(0));
        assert!(!scheduler.is_running(3));
        // a second pass does not give core 0 a second idle task
        assert_eq!(scheduler.create_idle_tasks(), Err(Error::ResourceExhausted));
        assert_eq!(scheduler.task_count(0), 1);
    }

    #[test]
    fn longest_delay_is_capped_at_half_the_counter() {
        let (scheduler, _) = leak_scheduler();
        let sleeper = scheduler.create_task(0, worker, "sleeper", 256, 0, 2).unwrap();
        scheduler.prepare_start().unwrap();
        scheduler.delay(0, u32::MAX / 2 + 1);
        for _ in 0..3 {
            scheduler.tick_isr(0);
            assert_eq!(scheduler.task_state(sleeper), Some(TaskState::Blocked));
        }
        assert_eq!(scheduler.delayed_tasks(0).as_slice(), [sleeper]);
    }

    #[test]
    fn start_only_prepares_once() {
        let (scheduler, _) = leak_scheduler();
        assert_eq!(scheduler.prepare_start(), Ok(TestPort::FREQUENCY / TICK_RATE_HZ));
        assert_eq!(scheduler.tick_divisor(), 1920);
        assert_eq!(scheduler.prepare_start(), Err(Error::PreconditionViolated));
        for core in 0..MAX_CPU_CORES {
            assert!(scheduler.is_running(core));
            let list = scheduler.task_list(core);
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].name.as_str(), IDLE_TASK_NAME);
            assert_eq!(list[0].priority, IDLE_PRIORITY);
            assert_eq!(list[0].stack_depth, MINIMAL_STACK_SIZE);
        }
    }

    #[test]
    fn switch_context_hands_back_the_picked_task() {
        let (scheduler, _) = leak_scheduler();
        scheduler.create_task(0, worker, "a", 256, 0, 2).unwrap();
        scheduler.create_task(0, worker, "b", 256, 0, 2).unwrap();
        let a_ctx = TestPort::FIRST_CONTEXT;
        let b_ctx = TestPort::FIRST_CONTEXT + TestPort::CONTEXT_STRIDE;

        // nothing was running, so what we pass in is thrown away
        assert_eq!(scheduler.switch_context(0, 0xDEAD), a_ctx);
        assert!(scheduler.dispatch(0));
        assert_eq!(scheduler.switch_context(0, 0xA000), b_ctx);
        assert!(scheduler.dispatch(0));
        // a's context is now the one we saved for it
        assert_eq!(scheduler.switch_context(0, 0xB000), 0xA000);
    }

    #[test]
    fn task_listing_shows_state_characters() {
        let (scheduler, _) = leak_scheduler();
        scheduler.create_task(0, worker, "sleeper", 256, 0, 2).unwrap();
        scheduler.prepare_start().unwrap();
        scheduler.dispatch(0);
        scheduler.delay(0, 100);
        let list = scheduler.task_list(0);
        let states: Vec<char> = list.iter().map(|info| info.state.as_char()).collect();
        assert_eq!(states, ['B', 'X']);
        assert!(format!("{}", list[0]).starts_with("sleeper"));
    }
}

// End of File
