//! The bootstrap thread
use crate::{utils::boot_failure, BootPhase, KernelTraits, PortThreading, Subsystems};

/// The name of the bootstrap thread.
pub const BOOTSTRAP_THREAD_NAME: &str = "bootstrap";

/// The entry point of a thread. Receives [`ThreadAttr::entry_param`] and
/// returns an exit code.
pub type ThreadEntry = fn(usize) -> i32;

/// Describes a thread to be created by
/// [`PortThreading::create_thread`](crate::PortThreading::create_thread).
#[derive(Clone, Copy, Debug)]
pub struct ThreadAttr {
    pub name: &'static str,
    pub entry_point: ThreadEntry,
    /// The parameter passed to `entry_point`. `0` means "no parameter".
    pub entry_param: usize,
    pub priority: usize,
    pub stack_size: usize,
}

impl ThreadAttr {
    /// Construct a `ThreadAttr` with the port's default priority and stack
    /// size and no parameter.
    pub fn with_defaults<Traits: PortThreading>(name: &'static str, entry_point: ThreadEntry) -> Self {
        Self {
            name,
            entry_point,
            entry_param: 0,
            priority: Traits::PRIORITY_DEFAULT,
            stack_size: Traits::STACK_DEFAULT_SIZE,
        }
    }

    pub const fn param(self, entry_param: usize) -> Self {
        Self {
            entry_param,
            ..self
        }
    }

    pub const fn priority(self, priority: usize) -> Self {
        Self { priority, ..self }
    }

    pub const fn stack_size(self, stack_size: usize) -> Self {
        Self { stack_size, ..self }
    }
}

/// Get the attributes of the bootstrap thread: the fixed name
/// [`BOOTSTRAP_THREAD_NAME`], the default priority, the default stack size,
/// and no parameter.
pub fn bootstrap_thread_attr<Traits: KernelTraits>() -> ThreadAttr {
    ThreadAttr::with_defaults::<Traits>(BOOTSTRAP_THREAD_NAME, bootstrap_main::<Traits>)
}

/// The body of the bootstrap thread. Runs the full initialization passes and
/// the application, and then exits with code `0`.
fn bootstrap_main<Traits: KernelTraits>(_: usize) -> i32 {
    log::debug!("top of bootstrap thread");

    let state = Traits::state();

    // The pre-thread stage must be complete. This thread can only be started
    // after it schedules us.
    if state.phase() < BootPhase::ThreadedInit {
        boot_failure("bootstrap thread started early", state.phase());
    }
    let missing = Subsystems::PRE_THREAD - state.subsystems();
    if !missing.is_empty() {
        boot_failure("pre-thread stage incomplete", missing);
    }

    log::debug!("initializing arch");
    // Safety: Called once, from the bootstrap thread
    unsafe { Traits::arch_init() };
    state.mark_up(Subsystems::ARCH);

    log::debug!("initializing platform");
    // Safety: ditto
    unsafe { Traits::platform_init() };
    state.mark_up(Subsystems::PLATFORM);

    log::debug!("initializing target");
    // Safety: ditto
    unsafe { Traits::target_init() };
    state.mark_up(Subsystems::TARGET);

    log::debug!("calling app_init");
    Traits::app_init();
    state.mark_up(Subsystems::APPLICATION);

    log::info!("boot complete");
    0
}
