#![doc = include_str!("./lib.md")]
#![deny(unsafe_op_in_unsafe_fn)]
use kindle_kernel::{KernelTraits, PortThreading, PortToKernel, ResultCode, ThreadAttr};
use once_cell::sync::OnceCell;
use spin::Mutex as SpinMutex;
use std::{
    any::Any,
    cell::Cell,
    panic,
    sync::mpsc,
    thread,
    time::Duration,
};

mod dpc;
mod sched;
mod timer;

pub use self::sched::ThreadState;

/// Used by `use_port!`
#[doc(hidden)]
pub extern crate kindle_kernel;
/// Used by `use_port!`
#[doc(hidden)]
pub extern crate env_logger;

/// The default stack size for threads created by the port.
pub const STACK_DEFAULT_SIZE: usize = 64 * 1024;

/// The default priority for threads created by the port. Host threads don't
/// have priorities, so this is only informational.
pub const PRIORITY_DEFAULT: usize = 16;

/// Implemented on a system type by [`use_port!`].
///
/// # Safety
///
/// Only meant to be implemented by [`use_port!`].
#[doc(hidden)]
pub unsafe trait PortInstance:
    KernelTraits + PortThreading<ThreadId = ThreadId> + PortToKernel
{
    fn port_state() -> &'static State;
}

/// Identifies a thread managed by the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(usize);

macro_rules! define_port_error {
    (
        $( #[doc = $doc:literal] )*
        pub enum $Name:ident
    ) => {
        $( #[doc = $doc] )*
        ///
        /// `BadObjectState`: The required subsystem isn't initialized yet, or
        /// it has already been shut down.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $Name {
            BadObjectState,
        }

        impl From<$Name> for ResultCode {
            #[inline]
            fn from(x: $Name) -> Self {
                match x {
                    $Name::BadObjectState => Self::BadObjectState,
                }
            }
        }
    };
}

define_port_error! {
    /// Error type for [`spawn_thread`].
    pub enum SpawnThreadError
}

define_port_error! {
    /// Error type for [`dpc_queue`].
    pub enum QueueDpcError
}

define_port_error! {
    /// Error type for [`set_timeout`].
    pub enum SetTimeoutError
}

/// Reported to [`State::port_boot`].
enum Event {
    Shutdown,
    Panicked(Box<dyn Any + Send>),
}

/// The role of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadRole {
    Unknown,
    /// The thread running the pre-thread stage.
    Boot,
    /// The boot thread after it became the idle context.
    Idle,
    /// The backing thread for a thread created by the kernel or the
    /// application, or the deferred-work worker.
    Thread,
}

thread_local! {
    /// The current thread's role. It's automatically assigned after the
    /// creation of a thread managed by the port.
    static THREAD_ROLE: Cell<ThreadRole> = Cell::new(ThreadRole::Unknown);
}

fn thread_role() -> ThreadRole {
    THREAD_ROLE.with(|role| role.get())
}

/// The internal state of the port.
///
/// # Safety
///
/// For the safety information of this type's methods, see the documentation of
/// the corresponding trait methods of `Port*`.
#[doc(hidden)]
pub struct State {
    /// This field is only accessed for short periods and never across a
    /// blocking call, so `SpinMutex` is sufficient.
    sched: SpinMutex<sched::SchedState>,
    events: SpinMutex<Option<mpsc::Sender<Event>>>,
    dpc: OnceCell<dpc::DpcQueue>,
    timer: OnceCell<timer::Timer>,
}

#[allow(clippy::missing_safety_doc)]
impl State {
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {
            sched: SpinMutex::new(sched::SchedState::new()),
            events: SpinMutex::new(None),
            dpc: OnceCell::new(),
            timer: OnceCell::new(),
        }
    }

    /// Boot the kernel in a new thread.
    ///
    /// Returns when the shutdown initiated by [`shutdown`] completes. A panic
    /// in any thread managed by the port is propagated to the caller.
    pub fn port_boot<Traits: PortInstance>(&'static self) {
        let (events_send, events_recv) = mpsc::channel();
        *self.events.lock() = Some(events_send);

        // Create the boot thread, where the pre-thread stage of the kernel
        // runs. It becomes the idle context and never exits normally.
        log::trace!("starting the boot thread");
        let boot_thread = thread::Builder::new()
            .name("boot".into())
            .spawn(move || {
                THREAD_ROLE.with(|role| role.set(ThreadRole::Boot));

                // Safety: We are a port, so it's okay to call this
                let result = panic::catch_unwind(|| unsafe {
                    <Traits as PortToKernel>::boot();
                });

                if let Err(e) = result {
                    self.post_event(Event::Panicked(e));
                }
            });
        if let Err(e) = boot_thread {
            panic!("failed to start the boot thread: {e}");
        }

        // Wait until shutdown is requested. `self.events` holds a sender, so
        // `recv` can't fail.
        let event = events_recv.recv();

        *self.events.lock() = None;

        // The timer posts to the deferred-work queue, so stop it first
        if let Some(timer) = self.timer.get() {
            timer.stop();
        }
        if let Some(dpc) = self.dpc.get() {
            dpc.stop();
        }

        match event {
            Ok(Event::Shutdown) | Err(mpsc::RecvError) => {
                log::trace!("shutdown complete");
            }
            // Propagate any panic that occured in a managed thread
            Ok(Event::Panicked(e)) => panic::resume_unwind(e),
        }
    }

    fn post_event(&self, event: Event) {
        if let Some(events) = &*self.events.lock() {
            // The receiver outlives the sender
            let _ = events.send(event);
        }
    }

    pub unsafe fn thread_init_early<Traits: PortInstance>(&self) {
        log::trace!("thread_init_early");
        assert_eq!(thread_role(), ThreadRole::Boot);

        let mut sched = self.sched.lock();
        assert!(sched.cpu_lock);
        sched.context_up = true;
    }

    pub unsafe fn heap_init<Traits: PortInstance>(&self) {
        // The host's global allocator is always available
        log::trace!("heap_init");
        let mut sched = self.sched.lock();
        assert!(sched.context_up);
        sched.heap_up = true;
    }

    pub unsafe fn thread_init<Traits: PortInstance>(&self) {
        log::trace!("thread_init");
        let mut sched = self.sched.lock();
        assert!(sched.heap_up, "the heap must be initialized first");
        sched.init_threads();
    }

    pub unsafe fn dpc_init<Traits: PortInstance>(&'static self) {
        log::trace!("dpc_init");
        assert!(self.dpc.get().is_none());
        self.dpc.get_or_init(|| dpc::DpcQueue::start(self));
    }

    pub unsafe fn timer_init<Traits: PortInstance>(&'static self) {
        log::trace!("timer_init");
        assert!(self.timer.get().is_none());
        let dpc = match self.dpc.get() {
            Some(dpc) => dpc,
            None => panic!("the deferred-work queue must be initialized first"),
        };
        self.timer.get_or_init(|| timer::Timer::start(dpc));
    }

    fn create(&self, attr: &ThreadAttr) -> Result<ThreadId, SpawnThreadError> {
        let index = self
            .sched
            .lock()
            .create(*attr)
            .map_err(|_| SpawnThreadError::BadObjectState)?;
        log::trace!("created thread {index} ({:?})", attr.name);
        Ok(ThreadId(index))
    }

    pub unsafe fn create_thread<Traits: PortInstance>(&self, attr: &ThreadAttr) -> ThreadId {
        match self.create(attr) {
            Ok(thread) => thread,
            Err(e) => panic!("create_thread failed: {e:?}"),
        }
    }

    /// Make the thread runnable. It starts running immediately unless CPU Lock
    /// is active.
    fn resume(&'static self, thread: ThreadId) {
        let mut sched = self.sched.lock();
        if let Err(e) = sched.resume(thread.0) {
            panic!("resume_thread({thread:?}) failed: {e:?}");
        }
        let cpu_lock = sched.cpu_lock;
        drop(sched);

        if !cpu_lock {
            self.dispatch();
        }
    }

    pub unsafe fn resume_thread<Traits: PortInstance>(&'static self, thread: ThreadId) {
        log::trace!("resume_thread({thread:?})");
        self.resume(thread);
    }

    /// Start a host thread for every ready thread.
    fn dispatch(&'static self) {
        let ready = self.sched.lock().take_ready();

        for (index, attr) in ready {
            let id = ThreadId(index);
            log::debug!("thread {id:?} ({:?}) is now running", attr.name);

            let result = thread::Builder::new()
                .name(attr.name.to_owned())
                .stack_size(attr.stack_size)
                .spawn(move || {
                    THREAD_ROLE.with(|role| role.set(ThreadRole::Thread));

                    match panic::catch_unwind(|| (attr.entry_point)(attr.entry_param)) {
                        Ok(code) => {
                            log::debug!("thread {id:?} ({:?}) exited with {code}", attr.name);
                            // The entry has returned, so the thread is `Running`
                            let _ = self.sched.lock().exit(index, code);
                        }
                        Err(e) => self.post_event(Event::Panicked(e)),
                    }
                });

            if let Err(e) = result {
                panic!("failed to start a host thread for {id:?}: {e}");
            }
        }
    }

    pub unsafe fn leave_cpu_lock<Traits: PortInstance>(&'static self) {
        log::trace!("leave_cpu_lock");

        let mut sched = self.sched.lock();
        assert!(sched.cpu_lock);
        sched.cpu_lock = false;
        drop(sched);

        // Threads made ready while CPU Lock was active can start now
        self.dispatch();
    }

    pub unsafe fn become_idle<Traits: PortInstance>(&self) -> ! {
        log::trace!("become_idle");
        assert_eq!(thread_role(), ThreadRole::Boot);
        assert!(!self.is_cpu_lock_active::<Traits>());

        THREAD_ROLE.with(|role| role.set(ThreadRole::Idle));

        // Idle until the process exits
        loop {
            thread::park();
        }
    }

    pub fn is_boot_context<Traits: PortInstance>(&self) -> bool {
        thread_role() == ThreadRole::Boot
    }

    pub fn is_cpu_lock_active<Traits: PortInstance>(&self) -> bool {
        self.sched.lock().cpu_lock
    }
}

/// Initiate graceful shutdown.
///
/// [`State::port_boot`] stops the timer and the deferred-work queue and
/// returns. Threads still running are abandoned.
///
/// Note: There is no safe way to restart the simulated system without
/// restarting an entire process.
pub fn shutdown<Traits: PortInstance>() {
    log::trace!("shutdown");
    Traits::port_state().post_event(Event::Shutdown);
}

/// Create a thread and make it runnable.
///
/// If CPU Lock is active (i.e., this is called during the pre-thread stage),
/// the thread starts running after CPU Lock is released.
pub fn spawn_thread<Traits: PortInstance>(attr: &ThreadAttr) -> Result<ThreadId, SpawnThreadError> {
    let state = Traits::port_state();
    let thread = state.create(attr)?;
    state.resume(thread);
    Ok(thread)
}

/// Get the state of a thread. Returns `None` if `thread` is unknown.
pub fn thread_state<Traits: PortInstance>(thread: ThreadId) -> Option<ThreadState> {
    Traits::port_state().sched.lock().thread_state(thread.0)
}

/// Get the bootstrap thread's ID. Returns `None` if it hasn't been created.
pub fn bootstrap_thread<Traits: PortInstance>() -> Option<ThreadId> {
    let sched = Traits::port_state().sched.lock();
    // The first thread created after `thread_init` is the bootstrap thread
    sched.thread_state(0).map(|_| ThreadId(0))
}

/// Queue `func(param)` to run on the deferred-work worker.
pub fn dpc_queue<Traits: PortInstance>(func: fn(usize), param: usize) -> Result<(), QueueDpcError> {
    let dpc = Traits::port_state()
        .dpc
        .get()
        .ok_or(QueueDpcError::BadObjectState)?;
    dpc.queue(func, param)
        .map_err(|dpc::StoppedError| QueueDpcError::BadObjectState)
}

/// Queue `callback(param)` to run on the deferred-work worker after `delay`
/// elapses.
pub fn set_timeout<Traits: PortInstance>(
    delay: Duration,
    callback: fn(usize),
    param: usize,
) -> Result<(), SetTimeoutError> {
    let timer = Traits::port_state()
        .timer
        .get()
        .ok_or(SetTimeoutError::BadObjectState)?;
    timer
        .set_timeout(delay, callback, param)
        .map_err(|timer::StoppedError| SetTimeoutError::BadObjectState)
}

#[macro_export]
macro_rules! use_port {
    (unsafe $vis:vis struct $SystemTraits:ident) => {
        $vis struct $SystemTraits;

        mod port_std_impl {
            use super::$SystemTraits;
            use $crate::kindle_kernel::{
                PortInterrupts, PortSubsystems, PortThreading, ThreadAttr,
            };
            use $crate::{PortInstance, State, ThreadId};

            pub(super) static PORT_STATE: State = State::new();

            unsafe impl PortInstance for $SystemTraits {
                #[inline]
                fn port_state() -> &'static State {
                    &PORT_STATE
                }
            }

            // Assume `$SystemTraits: KernelTraits`
            unsafe impl PortThreading for $SystemTraits {
                type ThreadId = ThreadId;

                const STACK_DEFAULT_SIZE: usize = $crate::STACK_DEFAULT_SIZE;
                const PRIORITY_DEFAULT: usize = $crate::PRIORITY_DEFAULT;

                unsafe fn thread_init_early() {
                    unsafe { PORT_STATE.thread_init_early::<Self>() }
                }

                unsafe fn thread_init() {
                    unsafe { PORT_STATE.thread_init::<Self>() }
                }

                unsafe fn create_thread(attr: &ThreadAttr) -> ThreadId {
                    unsafe { PORT_STATE.create_thread::<Self>(attr) }
                }

                unsafe fn resume_thread(thread: ThreadId) {
                    unsafe { PORT_STATE.resume_thread::<Self>(thread) }
                }

                unsafe fn become_idle() -> ! {
                    unsafe { PORT_STATE.become_idle::<Self>() }
                }

                fn is_boot_context() -> bool {
                    PORT_STATE.is_boot_context::<Self>()
                }
            }

            unsafe impl PortInterrupts for $SystemTraits {
                unsafe fn leave_cpu_lock() {
                    unsafe { PORT_STATE.leave_cpu_lock::<Self>() }
                }

                fn is_cpu_lock_active() -> bool {
                    PORT_STATE.is_cpu_lock_active::<Self>()
                }
            }

            unsafe impl PortSubsystems for $SystemTraits {
                unsafe fn heap_init() {
                    unsafe { PORT_STATE.heap_init::<Self>() }
                }

                unsafe fn dpc_init() {
                    unsafe { PORT_STATE.dpc_init::<Self>() }
                }

                unsafe fn timer_init() {
                    unsafe { PORT_STATE.timer_init::<Self>() }
                }
            }
        }

        #[allow(dead_code)]
        fn main() {
            $crate::env_logger::init();

            port_std_impl::PORT_STATE.port_boot::<$SystemTraits>();
        }
    };
}
