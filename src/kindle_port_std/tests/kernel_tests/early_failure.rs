//! A failing early step halts the boot sequence with interrupts masked.
use kindle_kernel::{Application, BootPhase, KernelCfg, PortInterrupts, PortPlatform, Subsystems};

use crate::SeqTracker;

kindle_port_std::use_port!(unsafe struct SystemTraits);
kindle_kernel::build!(SystemTraits, initializers: [never_called]);

static SEQ: SeqTracker = SeqTracker::new();

fn never_called() {
    SEQ.expect_and_replace(100, 101);
}

unsafe impl PortPlatform for SystemTraits {
    unsafe fn platform_early_init() {
        SEQ.expect_and_replace(0, 1);
    }

    unsafe fn target_early_init() {
        SEQ.expect_and_replace(1, 2);
        panic!("unknown target");
    }
}

impl Application for SystemTraits {
    fn app_init() {
        unreachable!();
    }
}

#[test]
fn run() {
    let _ = env_logger::builder().is_test(true).try_init();

    let result = std::panic::catch_unwind(|| {
        port_std_impl::PORT_STATE.port_boot::<SystemTraits>();
    });
    let payload = result.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"unknown target"));

    assert_eq!(SEQ.get(), 2);
    assert!(<SystemTraits as PortInterrupts>::is_cpu_lock_active());

    let state = <SystemTraits as KernelCfg>::state();
    assert_eq!(state.phase(), BootPhase::PreThread);
    assert!(state.subsystems().contains(Subsystems::PLATFORM_EARLY));
    assert!(!state.subsystems().contains(Subsystems::TARGET_EARLY));
    assert!(!state.subsystems().contains(Subsystems::INITIALIZERS));
}
