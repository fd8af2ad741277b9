//! Utility
//!
//! **This module is exempt from the API stability guarantee** unless specified
//! otherwise.
#![allow(clippy::declare_interior_mutable_const)]
mod panicking;
pub(crate) use self::panicking::*;

/// Trait for types having a constant default value. This is essentially a
/// constant version of `Default`.
pub trait Init {
    /// The default value.
    const INIT: Self;
}

impl<Tag: ?Sized> Init for tokenlock::SingletonTokenId<Tag> {
    const INIT: Self = Self::new();
}
