//! Global boot state
use core::{
    fmt,
    sync::atomic::{AtomicU32, AtomicU8, Ordering},
};

use crate::{error::BadPhaseError, klock::CpuLockCell, utils::Init, PortThreading};

/// The phase of the boot process.
///
/// The phase only moves forward, one step at a time, and is never revisited.
///
/// <center>
///
#[doc = svgbobdoc::transform!(
/// ```svgbob
///   .-----------.  initializers  .------------------.
///   | PreThread |--------------->| SubsystemBringup |
///   '-----------'      done      '------------------'
///                                          |
///                                          | bootstrap thread
///                                          | scheduled
///                                          v
///       .------.   become_idle   .--------------.
///       | Idle |<----------------| ThreadedInit |
///       '------'                 '--------------'
/// ```
)]
///
/// </center>
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum BootPhase {
    /// The boot context is establishing the minimal execution environment and
    /// running the static initializers. CPU Lock is active.
    PreThread = 0,
    /// The heap, the scheduler, the deferred-work queue, and the timers are
    /// being brought up. CPU Lock is active.
    SubsystemBringup = 1,
    /// The bootstrap thread is scheduled, and CPU Lock is being released. From
    /// this point on, the bootstrap thread may run concurrently.
    ThreadedInit = 2,
    /// The boot context has become the idle context.
    Idle = 3,
}

impl BootPhase {
    fn from_u8(x: u8) -> Self {
        match x {
            0 => Self::PreThread,
            1 => Self::SubsystemBringup,
            2 => Self::ThreadedInit,
            3 => Self::Idle,
            _ => unreachable!(),
        }
    }

    /// Get the phase that immediately follows `self`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::PreThread => Some(Self::SubsystemBringup),
            Self::SubsystemBringup => Some(Self::ThreadedInit),
            Self::ThreadedInit => Some(Self::Idle),
            Self::Idle => None,
        }
    }
}

bitflags::bitflags! {
    /// The set of initialization steps that have completed.
    pub struct Subsystems: u32 {
        /// Per-context bookkeeping (`thread_init_early`)
        const CONTEXT = 1 << 0;
        /// `arch_early_init`
        const ARCH_EARLY = 1 << 1;
        /// `platform_early_init`
        const PLATFORM_EARLY = 1 << 2;
        /// `target_early_init`
        const TARGET_EARLY = 1 << 3;
        /// The static initializers
        const INITIALIZERS = 1 << 4;
        const HEAP = 1 << 5;
        const SCHEDULER = 1 << 6;
        const DPC = 1 << 7;
        const TIMER = 1 << 8;
        /// `arch_init`
        const ARCH = 1 << 9;
        /// `platform_init`
        const PLATFORM = 1 << 10;
        /// `target_init`
        const TARGET = 1 << 11;
        /// `app_init` has returned
        const APPLICATION = 1 << 12;

        /// Everything the pre-thread stage brings up
        const PRE_THREAD = Self::CONTEXT.bits
            | Self::ARCH_EARLY.bits
            | Self::PLATFORM_EARLY.bits
            | Self::TARGET_EARLY.bits
            | Self::INITIALIZERS.bits
            | Self::HEAP.bits
            | Self::SCHEDULER.bits
            | Self::DPC.bits
            | Self::TIMER.bits;
    }
}

/// Global kernel state.
pub struct State<Traits: PortThreading> {
    phase: AtomicU8,
    subsystems: AtomicU32,
    /// The bootstrap thread. Written once by the pre-thread stage.
    bootstrap_thread: CpuLockCell<Traits, Option<Traits::ThreadId>>,
}

impl<Traits: PortThreading> Init for State<Traits> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();
}

impl<Traits: PortThreading> fmt::Debug for State<Traits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("State")
            .field("phase", &self.phase())
            .field("subsystems", &self.subsystems())
            .field("bootstrap_thread", &self.bootstrap_thread)
            .finish()
    }
}

impl<Traits: PortThreading> State<Traits> {
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(BootPhase::PreThread as u8),
            subsystems: AtomicU32::new(0),
            bootstrap_thread: CpuLockCell::new(None),
        }
    }

    /// Get the current boot phase.
    pub fn phase(&self) -> BootPhase {
        BootPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Move to the phase `next`, which must immediately follow the current
    /// one.
    pub fn advance(&self, next: BootPhase) -> Result<(), BadPhaseError> {
        let current = self.phase();
        if current.next() != Some(next) {
            return Err(BadPhaseError::BadObjectState);
        }

        self.phase
            .compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .map(drop)
            .map_err(|_| BadPhaseError::BadObjectState)
    }

    /// Get the set of initialization steps that have completed.
    pub fn subsystems(&self) -> Subsystems {
        Subsystems::from_bits_truncate(self.subsystems.load(Ordering::Acquire))
    }

    /// Record the completion of initialization steps.
    pub(crate) fn mark_up(&self, subsystems: Subsystems) {
        log::trace!("up: {subsystems:?}");
        self.subsystems
            .fetch_or(subsystems.bits(), Ordering::AcqRel);
    }

    pub(crate) fn bootstrap_thread(&self) -> &CpuLockCell<Traits, Option<Traits::ThreadId>> {
        &self.bootstrap_thread
    }
}
