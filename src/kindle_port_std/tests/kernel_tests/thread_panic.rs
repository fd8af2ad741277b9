//! A panic in the bootstrap thread is propagated out of `port_boot`.
use kindle_kernel::{Application, PortPlatform};

kindle_port_std::use_port!(unsafe struct SystemTraits);
kindle_kernel::build!(SystemTraits, initializers: []);

unsafe impl PortPlatform for SystemTraits {}

impl Application for SystemTraits {
    fn app_init() {
        panic!("application failed");
    }
}

#[test]
#[should_panic(expected = "application failed")]
fn run() {
    let _ = env_logger::builder().is_test(true).try_init();
    port_std_impl::PORT_STATE.port_boot::<SystemTraits>();
}
