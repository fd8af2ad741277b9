//! The transition from the pre-thread stage to the threaded stage
use crate::{klock::CpuLockGuard, utils::boot_failure, BootPhase, KernelTraits};

/// Release CPU Lock and turn the current context into the idle context.
///
/// Consuming `lock` guarantees that CPU Lock is released exactly once, and
/// only after every pre-thread step has returned.
pub(super) fn enter_idle<Traits: KernelTraits>(lock: CpuLockGuard<Traits>) -> ! {
    let state = Traits::state();

    if let Err(e) = state.advance(BootPhase::ThreadedInit) {
        boot_failure("entering the threaded stage", e);
    }

    log::debug!(
        "enabling interrupts, bootstrap thread = {:?}",
        state.bootstrap_thread().read(&*lock)
    );
    lock.unlock();

    // The bootstrap thread may be running from now on

    if let Err(e) = state.advance(BootPhase::Idle) {
        boot_failure("entering the idle stage", e);
    }

    log::debug!("becoming the idle thread");
    // Safety: CPU Lock inactive, boot context
    unsafe { Traits::become_idle() }
}
