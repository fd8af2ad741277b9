//! Checks the order of the whole boot sequence and the context each step
//! runs in.
use kindle_kernel::{
    Application, BootPhase, KernelCfg, PortInterrupts, PortPlatform, PortThreading, Subsystems,
    BOOTSTRAP_THREAD_NAME,
};
use kindle_port_std::ThreadState;

use crate::{KernelTestUtil, SeqTracker};

kindle_port_std::use_port!(unsafe struct SystemTraits);
kindle_kernel::build!(SystemTraits, initializers: [first_initializer, second_initializer]);

static SEQ: SeqTracker = SeqTracker::new();
static TEST_UTIL: KernelTestUtil = KernelTestUtil::new();

fn state() -> &'static kindle_kernel::State<SystemTraits> {
    <SystemTraits as KernelCfg>::state()
}

fn assert_pre_thread() {
    assert!(<SystemTraits as PortThreading>::is_boot_context());
    assert!(<SystemTraits as PortInterrupts>::is_cpu_lock_active());
    assert_eq!(state().phase(), BootPhase::PreThread);
}

fn assert_threaded() {
    assert!(!<SystemTraits as PortThreading>::is_boot_context());
    assert!(!<SystemTraits as PortInterrupts>::is_cpu_lock_active());
    assert!(state().phase() >= BootPhase::ThreadedInit);
    assert!(state().subsystems().contains(Subsystems::PRE_THREAD));
    assert_eq!(std::thread::current().name(), Some(BOOTSTRAP_THREAD_NAME));
}

fn first_initializer() {
    assert_pre_thread();
    assert!(state().subsystems().contains(
        Subsystems::CONTEXT
            | Subsystems::ARCH_EARLY
            | Subsystems::PLATFORM_EARLY
            | Subsystems::TARGET_EARLY
    ));
    assert!(!state().subsystems().contains(Subsystems::HEAP));
    SEQ.expect_and_replace(3, 4);
}

fn second_initializer() {
    assert_pre_thread();
    SEQ.expect_and_replace(4, 5);
}

unsafe impl PortPlatform for SystemTraits {
    unsafe fn arch_early_init() {
        assert_pre_thread();
        SEQ.expect_and_replace(0, 1);
    }

    unsafe fn platform_early_init() {
        assert_pre_thread();
        SEQ.expect_and_replace(1, 2);
    }

    unsafe fn target_early_init() {
        assert_pre_thread();
        SEQ.expect_and_replace(2, 3);
    }

    unsafe fn arch_init() {
        assert_threaded();
        SEQ.expect_and_replace(5, 6);
    }

    unsafe fn platform_init() {
        assert_threaded();
        SEQ.expect_and_replace(6, 7);
    }

    unsafe fn target_init() {
        assert_threaded();
        assert!(state().subsystems().contains(Subsystems::ARCH | Subsystems::PLATFORM));
        SEQ.expect_and_replace(7, 8);
    }
}

impl Application for SystemTraits {
    fn app_init() {
        assert_threaded();
        SEQ.expect_and_replace(8, 9);

        let bootstrap = kindle_port_std::bootstrap_thread::<SystemTraits>().unwrap();
        assert_eq!(
            kindle_port_std::thread_state::<SystemTraits>(bootstrap),
            Some(ThreadState::Running)
        );

        TEST_UTIL.success::<SystemTraits>();
    }
}

#[test]
fn run() {
    TEST_UTIL.run(|| {
        port_std_impl::PORT_STATE.port_boot::<SystemTraits>();
    });
    assert_eq!(SEQ.get(), 9);
}
