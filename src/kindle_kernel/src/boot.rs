//! The pre-thread stage
use crate::{
    bootstrap_thread_attr,
    error::BadContextError,
    klock::{assume_cpu_lock, CpuLockGuard},
    transition,
    utils::boot_failure,
    BootPhase, KernelTraits, Subsystems,
};

/// Check that the calling context may enter the boot sequence.
fn expect_boot_context<Traits: KernelTraits>() -> Result<(), BadContextError> {
    if Traits::is_boot_context() && Traits::is_cpu_lock_active() {
        Ok(())
    } else {
        Err(BadContextError::BadContext)
    }
}

/// Execute the pre-thread stage and hand over to the idle context.
///
/// # Safety
///
/// Precondition: CPU Lock active, boot context. Must be called only once.
pub(super) unsafe fn boot<Traits: KernelTraits>() -> ! {
    if let Err(e) = expect_boot_context::<Traits>() {
        boot_failure("entering the boot sequence", e);
    }

    // Safety: CPU Lock is active, and this is the only place that creates
    // a `CpuLockGuard`
    let mut lock = unsafe { assume_cpu_lock::<Traits>() };

    // Safety: CPU Lock active, boot context
    unsafe { pre_thread::<Traits>(&mut lock) };

    transition::enter_idle(lock)
}

/// The steps of the pre-thread stage, in order.
///
/// # Safety
///
/// Precondition: CPU Lock active, boot context
unsafe fn pre_thread<Traits: KernelTraits>(lock: &mut CpuLockGuard<Traits>) {
    let state = Traits::state();

    // Safety: (All of the following port calls) CPU Lock active, boot
    // context, and each is called once in the documented order
    unsafe {
        Traits::thread_init_early();
        state.mark_up(Subsystems::CONTEXT);

        Traits::arch_early_init();
        state.mark_up(Subsystems::ARCH_EARLY);

        Traits::platform_early_init();
        state.mark_up(Subsystems::PLATFORM_EARLY);

        Traits::target_early_init();
        state.mark_up(Subsystems::TARGET_EARLY);
    }

    log::info!("welcome to kindle");

    log::debug!("calling initializers");
    Traits::INITIALIZERS.run();
    state.mark_up(Subsystems::INITIALIZERS);

    if let Err(e) = state.advance(BootPhase::SubsystemBringup) {
        boot_failure("entering subsystem bring-up", e);
    }

    // Safety: See above
    unsafe {
        log::debug!("initializing heap");
        Traits::heap_init();
        state.mark_up(Subsystems::HEAP);

        log::debug!("initializing threads");
        Traits::thread_init();
        state.mark_up(Subsystems::SCHEDULER);

        log::debug!("initializing dpc");
        Traits::dpc_init();
        state.mark_up(Subsystems::DPC);

        log::debug!("initializing timers");
        Traits::timer_init();
        state.mark_up(Subsystems::TIMER);
    }

    log::debug!("creating bootstrap thread");
    let attr = bootstrap_thread_attr::<Traits>();
    // Safety: CPU Lock active, the scheduler is initialized
    let thread = unsafe { Traits::create_thread(&attr) };
    state.bootstrap_thread().replace(&mut **lock, Some(thread));

    // It can't start running until CPU Lock is released
    // Safety: CPU Lock active
    unsafe { Traits::resume_thread(thread) };
}
