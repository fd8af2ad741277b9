//! Posts deferred work and timeouts from the application.
use kindle_kernel::{Application, PortInterrupts, PortPlatform};
use kindle_port_std::{dpc_queue, set_timeout};
use std::time::Duration;

use crate::{KernelTestUtil, SeqTracker};

kindle_port_std::use_port!(unsafe struct SystemTraits);
kindle_kernel::build!(SystemTraits, initializers: []);

static SEQ: SeqTracker = SeqTracker::new();
static TEST_UTIL: KernelTestUtil = KernelTestUtil::new();

unsafe impl PortPlatform for SystemTraits {}

impl Application for SystemTraits {
    fn app_init() {
        SEQ.expect_and_replace(0, 1);
        dpc_queue::<SystemTraits>(on_dpc, 42).unwrap();
    }
}

fn on_dpc(param: usize) {
    assert_eq!(param, 42);
    assert!(!<SystemTraits as PortInterrupts>::is_cpu_lock_active());
    SEQ.expect_and_replace(1, 2);

    // Registered out of order
    set_timeout::<SystemTraits>(Duration::from_millis(60), on_timeout, 2).unwrap();
    set_timeout::<SystemTraits>(Duration::from_millis(10), on_timeout, 1).unwrap();
}

fn on_timeout(param: usize) {
    match param {
        1 => SEQ.expect_and_replace(2, 3),
        2 => {
            SEQ.expect_and_replace(3, 4);
            TEST_UTIL.success::<SystemTraits>();
        }
        _ => unreachable!(),
    }
}

#[test]
fn run() {
    TEST_UTIL.run(|| {
        port_std_impl::PORT_STATE.port_boot::<SystemTraits>();
    });
    assert_eq!(SEQ.get(), 4);
}
