//! A [`Port`] for Armv7-M and Armv8-M Mainline cores
//!
//! Each core ticks from its own SysTick and switches tasks in PendSV, both at
//! the lowest priority. Task stacks come from one static pool. Bringing up
//! secondary cores is chip specific, so the board passes in a launcher.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#[cfg(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))]
compile_error!("The Cortex-M port needs Armv7-M or Armv8-M Mainline");

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::peripheral::{SCB, scb::SystemHandler, syst::SystClkSource};

use crate::{
    Context, CoreId, Error, Port, Scheduler, TaskEntryFn, TaskParam,
    config::{MAX_CPU_CORES, TASK_STACK_POOL_WORDS},
    stack::{INITIAL_FRAME_WORDS, Stack, StackPool, push_initial_frame},
};

/// Where every task stack comes from
static STACK_POOL: StackPool<TASK_STACK_POOL_WORDS> = StackPool::new();

/// Somewhere for PendSV to stack the boot context of each core. It is never
/// resumed.
static BOOT_STACKS: [Stack<256>; MAX_CPU_CORES] = [const { Stack::new() }; MAX_CPU_CORES];

/// SysTick clocks per scheduler tick
static TICK_DIVISOR: AtomicU32 = AtomicU32::new(0);

/// Lowest possible exception priority
const LOWEST_PRIORITY: u8 = 0xFF;

/// The Cortex-M port
pub struct CortexM {
    /// SysTick input clock
    clock_hz: u32,
    /// Reads the id of the executing core
    core_id: fn() -> CoreId,
    /// Makes a secondary core call the given function
    launch: fn(CoreId, fn() -> !),
}

impl CortexM {
    /// A port for a multicore chip
    pub const fn new(
        clock_hz: u32,
        core_id: fn() -> CoreId,
        launch: fn(CoreId, fn() -> !),
    ) -> CortexM {
        CortexM {
            clock_hz,
            core_id,
            launch,
        }
    }

    /// A port for a chip with only one core
    ///
    /// Tasks given to other cores never run.
    pub const fn single_core(clock_hz: u32) -> CortexM {
        CortexM::new(clock_hz, primary_only, no_launch)
    }

    /// Words left in the task stack pool
    pub fn stack_remaining(&self) -> usize {
        STACK_POOL.remaining()
    }
}

fn primary_only() -> CoreId {
    0
}

fn no_launch(core: CoreId, _entry: fn() -> !) {
    warn!("Core {=usize} does not exist on this chip", core);
}

impl Port for CortexM {
    fn core_id(&self) -> CoreId {
        (self.core_id)()
    }

    fn timer_frequency(&self) -> u32 {
        self.clock_hz
    }

    fn init_context(
        &self,
        entry: TaskEntryFn,
        param: TaskParam,
        stack_depth: usize,
    ) -> Result<Context, Error> {
        let top = STACK_POOL.carve(stack_depth.max(INITIAL_FRAME_WORDS))?;
        // SAFETY: we just carved at least INITIAL_FRAME_WORDS words below `top`
        let sp = unsafe { push_initial_frame(top, entry, param) };
        debug!(
            "Task frame @ 0x{=usize:08x}, stack top 0x{=usize:08x}",
            sp as usize,
            top as usize
        );
        Ok(sp as Context)
    }

    fn request_switch(&self) {
        SCB::set_pendsv();
        // make sure PendSV fires before we carry on
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }

    fn start_secondary(&self, core: CoreId, tick_divisor: u32) {
        TICK_DIVISOR.store(tick_divisor, Ordering::Release);
        (self.launch)(core, enter_core);
    }

    fn start_primary(&self, tick_divisor: u32) -> ! {
        TICK_DIVISOR.store(tick_divisor, Ordering::Release);
        enter_core()
    }

    fn spin_hint(&self) {
        cortex_m::asm::nop();
    }
}

/// Start ticking and switch into the first task on the calling core
///
/// We should be in Privileged Thread mode on the Main stack.
fn enter_core() -> ! {
    let core = Scheduler::get()
        .map(|scheduler| scheduler.port().core_id())
        .unwrap_or(0);
    info!("Core {=usize} entering scheduler", core);

    // SAFETY: SYST and the SCB handler priorities are banked per core, and
    // nothing else on this core is using them yet.
    let mut p = unsafe { cortex_m::Peripherals::steal() };
    unsafe {
        p.SCB.set_priority(SystemHandler::PendSV, LOWEST_PRIORITY);
        p.SCB.set_priority(SystemHandler::SysTick, LOWEST_PRIORITY);
    }
    p.SYST.set_reload(TICK_DIVISOR.load(Ordering::Acquire).saturating_sub(1));
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.clear_current();
    p.SYST.enable_counter();
    p.SYST.enable_interrupt();

    // PendSV stacks whatever it finds on the PSP, so give it somewhere
    // harmless to put it
    let boot_stack = BOOT_STACKS[core.min(MAX_CPU_CORES - 1)].top();
    // SAFETY: we are on the Main stack, so moving the PSP cannot hurt us
    unsafe {
        cortex_m::register::psp::write(boot_stack as u32);
    }

    // Fire the PendSV exception - the PendSV handler will switch to the task
    // dispatch has picked
    debug!("Hit PendSV");
    SCB::set_pendsv();
    // SAFETY: the scheduler is ready for our interrupts
    unsafe {
        cortex_m::interrupt::enable();
    }
    // flush the pipeline to ensure the PendSV fires before we reach the end of this function
    cortex_m::asm::isb();
    // impossible to get here
    unreachable!();
}

/// SysTick Handler
#[unsafe(no_mangle)]
extern "C" fn SysTick() {
    let Some(scheduler) = Scheduler::get() else {
        return;
    };
    let core = scheduler.port().core_id();
    if scheduler.tick_isr(core) {
        SCB::set_pendsv();
    }
}

/// Called from PendSV with the outgoing task's stack pointer. Returns the
/// incoming task's.
extern "C" fn pendsv_switch(saved: Context) -> Context {
    match Scheduler::get() {
        Some(scheduler) => scheduler.switch_context(scheduler.port().core_id(), saved),
        None => saved,
    }
}

/// PendSV Handler for Armv7-M or Armv8-M Mainline EABI
///
/// This is the task switch code. It is called by hardware when the PendSV bit
/// is set and all other interrupts have finished.
///
/// On entry, we will find that PC, LR, R12, R3, R2, R1 and R0 will have been
/// pushed onto the PSP. We push the rest of the outgoing task's registers
/// there too, let the scheduler swap stack pointers, and pop the incoming
/// task's registers. Exiting from this function will cause the hardware to
/// restore PC, LR, R12, R3, R2, R1, and R0 from the new task's PSP, and so
/// the new task will resume.
///
/// It is a naked function because we do not want the compiler pushing
/// anything else to the stack and re-using registers containing precious task
/// state.
#[cfg(arm_abi = "eabi")]
#[unsafe(no_mangle)]
#[unsafe(naked)]
unsafe extern "C" fn PendSV() {
    core::arch::naked_asm!(r#"
    // r0 = the outgoing task's stack pointer
    mrs      r0, psp

    // Push the additional state into stack at r0
    stmdb    r0!, {{ r4 - r11, lr }}

    // r0 = the incoming task's stack pointer
    bl       {switch}

    // Pop the additional state from it
    ldmia    r0!, {{ r4 - r11, lr }}

    // Set the current task stack pointer
    msr      psp, r0

    // return to the task
    bx       lr
    "#,
    switch = sym pendsv_switch,
    );
}

/// PendSV Handler for Armv7-M or Armv8-M Mainline EABIHF
///
/// As for EABI, except that we inspect LR to see if the outgoing task used
/// the FPU (because LR is set by the hardware on exception entry to tell us
/// the FPU state of the task we interrupted), and if so we also push the high
/// FPU registers. The hardware handled the low ones.
#[cfg(arm_abi = "eabihf")]
#[unsafe(no_mangle)]
#[unsafe(naked)]
unsafe extern "C" fn PendSV() {
    core::arch::naked_asm!(r#"
    // Workaround https://github.com/rust-lang/rust/issues/127269
    .fpu vfpv3

    // r0 = the outgoing task's stack pointer
    mrs      r0, psp

    // Did the task we just interrupted use the FPU? (i.e. is bit 4 clear in LR?)
    tst      lr, #0x10
    it       eq
    vstmdbeq r0!, {{ s16 - s31 }}

    // Push the additional state into stack at r0
    stmdb    r0!, {{ r4 - r11, lr }}

    // r0 = the incoming task's stack pointer
    bl       {switch}

    // Pop the additional state from it
    ldmia    r0!, {{ r4 - r11, lr }}

    // Did the task we are resuming use the FPU?
    tst      lr, #0x10
    it       eq
    vldmiaeq r0!, {{ s16 - s31 }}

    // Set the current task stack pointer
    msr      psp, r0

    // return to the task
    bx       lr
    "#,
    switch = sym pendsv_switch,
    );
}

// End of File
