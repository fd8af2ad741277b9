//! Boot-stage locking mechanism
//!
//! The pre-thread stage owns all kernel state because it runs with CPU Lock
//! active in the only existing context. [`CpuLockGuard`] is the proof of that
//! ownership; [`CpuLockCell`]s can only be accessed through it.
use core::{fmt, ops};
use tokenlock::UnsyncTokenLock;

use crate::{utils::Init, PortInterrupts};

pub(super) struct CpuLockTag<Traits>(Traits);

/// The key that "unlocks" [`CpuLockCell`].
pub(super) type CpuLockToken<Traits> = tokenlock::UnsyncSingletonToken<CpuLockTag<Traits>>;

/// The keyhole type for [`UnsyncTokenLock`] that can be "unlocked" by
/// [`CpuLockToken`].
pub(super) type CpuLockKeyhole<Traits> = tokenlock::SingletonTokenId<CpuLockTag<Traits>>;

/// Cell type that can be accessed by [`CpuLockToken`] (which can be obtained
/// by [`assume_cpu_lock`]).
pub(super) struct CpuLockCell<Traits, T: ?Sized>(UnsyncTokenLock<T, CpuLockKeyhole<Traits>>);

impl<Traits, T> CpuLockCell<Traits, T> {
    pub(super) const fn new(x: T) -> Self {
        Self(UnsyncTokenLock::new(CpuLockKeyhole::INIT, x))
    }
}

impl<Traits, T: ?Sized> fmt::Debug for CpuLockCell<Traits, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // The contents can't be read without the token
        f.write_str("CpuLockCell(< locked >)")
    }
}

impl<Traits, T> ops::Deref for CpuLockCell<Traits, T> {
    type Target = UnsyncTokenLock<T, CpuLockKeyhole<Traits>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Assume a CPU Lock state and get `CpuLockGuard`.
///
/// # Safety
///
/// The system must be really in a CPU Lock state. There must be no instances of
/// `CpuLockGuard` existing at the point of the call.
pub(super) unsafe fn assume_cpu_lock<Traits: PortInterrupts>() -> CpuLockGuard<Traits> {
    debug_assert!(Traits::is_cpu_lock_active());

    CpuLockGuard {
        // Safety: There are no other instances of `CpuLockToken`; this is
        //         upheld by the caller.
        token: unsafe { CpuLockToken::new_unchecked() },
    }
}

/// Guard for a CPU Lock state.
///
/// [`CpuLockToken`] can be borrowed from this type.
///
/// Unlike an RAII guard, dropping this type does *not* release CPU Lock. A
/// panicking bring-up step drops the guard during unwinding, and interrupts
/// must stay masked in that case. The only way to release CPU Lock is
/// [`Self::unlock`].
pub(super) struct CpuLockGuard<Traits: PortInterrupts> {
    token: CpuLockToken<Traits>,
}

impl<Traits: PortInterrupts> CpuLockGuard<Traits> {
    /// Release CPU Lock, consuming the guard.
    pub(super) fn unlock(self) {
        // Safety: CPU Lock is currently active, and it's us (the kernel) who
        // are currently controlling the CPU Lock state
        unsafe {
            Traits::leave_cpu_lock();
        }
    }
}

impl<Traits: PortInterrupts> ops::Deref for CpuLockGuard<Traits> {
    type Target = CpuLockToken<Traits>;
    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

impl<Traits: PortInterrupts> ops::DerefMut for CpuLockGuard<Traits> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.token
    }
}
