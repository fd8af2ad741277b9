/// Implement [`KernelCfg`](crate::KernelCfg) on a system type.
///
/// The macro defines the kernel's global state as a `static` item and binds
/// the static initializer table. The listed items must be paths to `fn()`
/// items. They are called in the listed order during the pre-thread stage.
/// The list may be empty.
///
/// ```rust,ignore
/// kindle_kernel::build!(SystemTraits, initializers: [register_console]);
/// ```
#[macro_export]
macro_rules! build {
    ( $Traits:ty, initializers: [ $( $init:path ),* $(,)? ] $(,)? ) => {
        const _: () = {
            static KERNEL_STATE: $crate::State<$Traits> = $crate::State::new();

            unsafe impl $crate::KernelCfg for $Traits {
                const INITIALIZERS: $crate::InitializerTable =
                    $crate::initializers![ $( $init ),* ];

                #[inline(always)]
                fn state() -> &'static $crate::State<Self> {
                    &KERNEL_STATE
                }
            }
        };
    };
}
