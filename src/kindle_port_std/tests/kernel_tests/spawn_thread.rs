//! Creates additional threads through the port.
use kindle_kernel::{Application, PortInterrupts, PortPlatform, ThreadAttr};
use kindle_port_std::{
    dpc_queue, set_timeout, spawn_thread, thread_state, QueueDpcError, SetTimeoutError,
    SpawnThreadError, ThreadId, ThreadState,
};
use std::{sync::Mutex, time::Duration};

use crate::{KernelTestUtil, SeqTracker};

kindle_port_std::use_port!(unsafe struct SystemTraits);
kindle_kernel::build!(SystemTraits, initializers: [too_early]);

static SEQ: SeqTracker = SeqTracker::new();
static TEST_UTIL: KernelTestUtil = KernelTestUtil::new();
static WORKER: Mutex<Option<ThreadId>> = Mutex::new(None);

fn worker_attr() -> ThreadAttr {
    ThreadAttr::with_defaults::<SystemTraits>("worker", worker).param(5)
}

/// None of the port services are available to static initializers.
fn too_early() {
    assert_eq!(
        spawn_thread::<SystemTraits>(&worker_attr()),
        Err(SpawnThreadError::BadObjectState)
    );
    assert_eq!(
        dpc_queue::<SystemTraits>(|_| {}, 0),
        Err(QueueDpcError::BadObjectState)
    );
    assert_eq!(
        set_timeout::<SystemTraits>(Duration::ZERO, |_| {}, 0),
        Err(SetTimeoutError::BadObjectState)
    );
    SEQ.expect_and_replace(0, 1);
}

unsafe impl PortPlatform for SystemTraits {}

impl Application for SystemTraits {
    fn app_init() {
        let mut worker = WORKER.lock().unwrap();
        SEQ.expect_and_replace(1, 2);
        *worker = Some(spawn_thread::<SystemTraits>(&worker_attr()).unwrap());
    }
}

fn worker(param: usize) -> i32 {
    assert_eq!(param, 5);
    assert_eq!(std::thread::current().name(), Some("worker"));
    assert!(!<SystemTraits as PortInterrupts>::is_cpu_lock_active());

    // Wait until `app_init` records our ID
    let id = WORKER.lock().unwrap().unwrap();
    assert_eq!(thread_state::<SystemTraits>(id), Some(ThreadState::Running));
    SEQ.expect_and_replace(2, 3);

    dpc_queue::<SystemTraits>(check_exit, 0).unwrap();
    3
}

fn check_exit(_: usize) {
    let id = WORKER.lock().unwrap().unwrap();
    while thread_state::<SystemTraits>(id) == Some(ThreadState::Running) {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(thread_state::<SystemTraits>(id), Some(ThreadState::Exited(3)));
    SEQ.expect_and_replace(3, 4);
    TEST_UTIL.success::<SystemTraits>();
}

#[test]
fn run() {
    TEST_UTIL.run(|| {
        port_std_impl::PORT_STATE.port_boot::<SystemTraits>();
    });
    assert_eq!(SEQ.get(), 4);
}
