#![doc = include_str!("./lib.md")]
#![cfg_attr(not(test), no_std)] // Link `std` only when building a test (`cfg(test)`)
#![deny(unsafe_op_in_unsafe_fn)]
use core::fmt;

pub mod utils;
mod boot;
mod bootstrap;
mod cfg;
mod error;
mod klock;
mod startup;
mod state;
mod transition;


pub use self::{bootstrap::*, error::*, startup::*, state::*};

/// Represents a complete system type: a port plus the kernel configuration
/// produced by [`build!`].
pub trait KernelTraits:
    PortThreading + PortInterrupts + PortPlatform + PortSubsystems + Application + KernelCfg
{
}

impl<
        T: PortThreading + PortInterrupts + PortPlatform + PortSubsystems + Application + KernelCfg,
    > KernelTraits for T
{
}

/// Implemented by a port. This trait contains items related to the execution
/// contexts the kernel hands work to.
///
/// # Safety
///
/// Implementing a port is inherently unsafe because it's responsible for
/// establishing the execution environment. The methods are only meant to be
/// called by the kernel.
pub unsafe trait PortThreading: Sized + 'static {
    /// Identifies a thread created by [`Self::create_thread`].
    type ThreadId: Copy + Send + Sync + fmt::Debug + 'static;

    /// The default stack size for threads.
    const STACK_DEFAULT_SIZE: usize = 8192;

    /// The default run priority for threads.
    const PRIORITY_DEFAULT: usize = 16;

    /// Establish the minimal per-context bookkeeping so that "the current
    /// execution context" can be referred to by any later code.
    ///
    /// Precondition: CPU Lock active, boot context
    unsafe fn thread_init_early();

    /// Initialize the scheduler.
    ///
    /// Precondition: CPU Lock active, boot context, the heap is available
    unsafe fn thread_init();

    /// Create a thread described by `attr`. The new thread does not become
    /// eligible to run until it's passed to [`Self::resume_thread`].
    ///
    /// Precondition: CPU Lock active, the scheduler is initialized
    unsafe fn create_thread(attr: &ThreadAttr) -> Self::ThreadId;

    /// Mark the specified thread as runnable. If CPU Lock is active, the
    /// thread must not start running until CPU Lock is deactivated.
    unsafe fn resume_thread(thread: Self::ThreadId);

    /// Convert the current (boot) context into the idle context. This method
    /// never returns.
    ///
    /// Precondition: CPU Lock inactive, boot context
    unsafe fn become_idle() -> !;

    /// Return a flag indicating whether the current context is the boot
    /// context, i.e., the context the port's startup stub called
    /// [`PortToKernel::boot`] from.
    fn is_boot_context() -> bool;
}

/// Implemented by a port. This trait contains items related to masking
/// interrupts.
///
/// The boot context starts with all kernel-managed interrupts masked (this
/// state is called *CPU Lock*). The kernel releases CPU Lock exactly once, at
/// the end of the pre-thread stage.
///
/// # Safety
///
/// These methods are only meant to be called by the kernel.
pub unsafe trait PortInterrupts {
    /// Re-enable kernel-managed interrupts, thus deactivating the CPU Lock
    /// state. Preemption becomes possible after this call.
    ///
    /// Precondition: CPU Lock active
    unsafe fn leave_cpu_lock();

    /// Return a flag indicating whether a CPU Lock state is active.
    fn is_cpu_lock_active() -> bool;
}

/// Implemented by a platform. The early variants run in the boot context
/// with CPU Lock active; the others run in the bootstrap thread and may
/// allocate, block, and use scheduler services.
///
/// Every method is expected to either complete or halt the system by itself.
///
/// # Safety
///
/// These methods are only meant to be called by the kernel.
pub unsafe trait PortPlatform {
    /// Architecture-level early setup (caches, address translation, ...).
    unsafe fn arch_early_init() {}

    /// Platform early setup. May depend on the architecture state.
    unsafe fn platform_early_init() {}

    /// Target early setup. May depend on the platform identification.
    unsafe fn target_early_init() {}

    /// Full architecture initialization.
    unsafe fn arch_init() {}

    /// Full platform initialization.
    unsafe fn platform_init() {}

    /// Full target initialization.
    unsafe fn target_init() {}
}

/// Implemented by a port. Brings up the kernel subsystems whose internals are
/// outside the scope of this crate.
///
/// # Safety
///
/// These methods are only meant to be called by the kernel, in the order
/// `heap_init`, ([`PortThreading::thread_init`]), `dpc_init`, `timer_init`.
pub unsafe trait PortSubsystems {
    /// Bring up the kernel heap.
    unsafe fn heap_init();

    /// Initialize the deferred-work queue.
    unsafe fn dpc_init();

    /// Initialize the kernel timers. Timers may post deferred work.
    unsafe fn timer_init();
}

/// The application layer.
pub trait Application {
    /// The application entry point. Called once by the bootstrap thread
    /// after the full initialization passes.
    fn app_init();
}

/// Associates a system type with kernel-private data. Use [`build!`] to
/// implement.
///
/// # Safety
///
/// This is only intended to be implemented by `build!`.
pub unsafe trait KernelCfg: PortThreading {
    /// The static initializers, called in table order during the
    /// pre-thread stage.
    const INITIALIZERS: InitializerTable;

    /// Access the kernel's global state.
    fn state() -> &'static State<Self>;
}

/// Methods intended to be called by a port.
pub trait PortToKernel {
    /// Bring up the kernel subsystems, schedule the bootstrap thread, and
    /// turn the current context into the idle context.
    ///
    /// Should be called exactly once by the port's startup stub.
    ///
    /// # Safety
    ///
    /// Precondition: CPU Lock active, boot context
    unsafe fn boot() -> !;
}

impl<Traits: KernelTraits> PortToKernel for Traits {
    unsafe fn boot() -> ! {
        // Safety: The precondition is forwarded to the caller
        unsafe { boot::boot::<Traits>() }
    }
}
