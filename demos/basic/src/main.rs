use kindle_kernel::{Application, PortPlatform};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

kindle_port_std::use_port!(unsafe struct SystemTraits);

kindle_kernel::build!(SystemTraits, initializers: [register_console, register_rng]);

static RNG_SEED: AtomicUsize = AtomicUsize::new(0);

fn register_console() {
    log::info!("console registered");
}

fn register_rng() {
    RNG_SEED.store(0x2545_f491, Ordering::Relaxed);
    log::info!("rng seeded");
}

unsafe impl PortPlatform for SystemTraits {
    unsafe fn arch_init() {
        log::info!("arch_init");
    }

    unsafe fn platform_init() {
        log::info!("platform_init");
    }

    unsafe fn target_init() {
        log::info!("target_init");
    }
}

impl Application for SystemTraits {
    fn app_init() {
        log::info!("app_init: seed = {:#x}", RNG_SEED.load(Ordering::Relaxed));

        kindle_port_std::dpc_queue::<SystemTraits>(deferred, 1).unwrap();
        kindle_port_std::set_timeout::<SystemTraits>(Duration::from_millis(100), timeout, 2)
            .unwrap();
    }
}

fn deferred(param: usize) {
    log::info!("deferred work ({param})");
}

fn timeout(param: usize) {
    log::info!("timeout ({param}), shutting down");
    kindle_port_std::shutdown::<SystemTraits>();
}
