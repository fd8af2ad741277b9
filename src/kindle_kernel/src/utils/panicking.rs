use core::fmt;

/// Report an unrecoverable boot failure and halt.
///
/// The boot sequence has no recovery path, so this panics, which is the
/// fatal behavior the platform defines. CPU Lock is left active.
#[cold]
#[track_caller]
pub(crate) fn boot_failure(what: &str, cause: impl fmt::Debug) -> ! {
    log::error!("boot failure: {what}: {cause:?}");
    panic!("boot failure: {what}: {cause:?}");
}
