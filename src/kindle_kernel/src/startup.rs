//! Static initializers
use core::fmt;

use crate::utils::Init;

/// A static initializer: a routine run once during the pre-thread stage,
/// after the early architecture, platform, and target setup and before the
/// heap is brought up.
///
/// Static initializers usually register process-wide state consumed by later
/// phases. They run with CPU Lock active and must not assume anything that
/// the heap or the scheduler provides.
#[derive(Clone, Copy)]
pub struct Initializer {
    start: fn(),
    name: &'static str,
}

impl Initializer {
    /// Construct an `Initializer` with an anonymous name.
    pub const fn new(start: fn()) -> Self {
        Self {
            start,
            name: "<anonymous>",
        }
    }

    /// Construct an `Initializer` with the name shown in diagnostics.
    pub const fn with_name(start: fn(), name: &'static str) -> Self {
        Self { start, name }
    }

    /// Get the name shown in diagnostics.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Call the routine.
    #[inline]
    pub fn call(&self) {
        (self.start)()
    }
}

impl fmt::Debug for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Initializer").field(&self.name).finish()
    }
}

/// An ordered table of [`Initializer`]s. Use [`initializers!`] to construct.
///
/// The table may be empty.
#[derive(Clone, Copy)]
pub struct InitializerTable {
    entries: &'static [Initializer],
}

impl Init for InitializerTable {
    const INIT: Self = Self::new(&[]);
}

impl fmt::Debug for InitializerTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.entries).finish()
    }
}

impl InitializerTable {
    pub const fn new(entries: &'static [Initializer]) -> Self {
        Self { entries }
    }

    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Initializer> {
        self.entries.iter()
    }

    /// Call every initializer exactly once, in table order.
    ///
    /// A panicking initializer is not caught. The remaining entries don't run.
    pub fn run(&self) {
        run_initializers(self.entries);
    }
}

pub(crate) fn run_initializers(entries: &[Initializer]) {
    for initializer in entries {
        log::trace!("calling initializer `{}`", initializer.name);
        initializer.call();
    }
}

/// Construct an [`InitializerTable`] from a list of paths to `fn()` items.
/// The names shown in diagnostics are derived from the paths.
///
/// ```
/// fn register_console() {}
/// fn register_rng() {}
///
/// const INITIALIZERS: kindle_kernel::InitializerTable =
///     kindle_kernel::initializers![register_console, register_rng];
///
/// assert_eq!(INITIALIZERS.len(), 2);
/// assert_eq!(INITIALIZERS.iter().next().unwrap().name(), "register_console");
/// ```
#[macro_export]
macro_rules! initializers {
    ( $( $start:path ),* $(,)? ) => {{
        const ENTRIES: &[$crate::Initializer] = &[
            $( $crate::Initializer::with_name($start, ::core::stringify!($start)), )*
        ];
        $crate::InitializerTable::new(ENTRIES)
    }};
}
