//! Identity keys for shared objects.
//!
//! Sources are matched by identity, never by value: two items with equal
//! content are still two distinct sources. An [`IdentityKey`] is derived from
//! the address of a shared allocation, so it stays stable (and unique) for as
//! long as any handle to that allocation is alive.

use std::fmt;
use std::rc::Rc;

/// Opaque identity of a shared allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(usize);

impl IdentityKey {
    /// Key for the allocation behind `rc`.
    #[must_use]
    pub fn of_rc<T: ?Sized>(rc: &Rc<T>) -> Self {
        Self(Rc::as_ptr(rc).cast::<()>() as usize)
    }

    /// Raw key value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKey({:#x})", self.0)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// Types whose values can be told apart by identity.
///
/// Implemented for `Rc<T>` and for every shared handle in this crate. Handles
/// that are clones of each other report the same key.
pub trait Identity {
    /// The identity of the object this value refers to.
    fn identity(&self) -> IdentityKey;
}

impl<T: ?Sized> Identity for Rc<T> {
    fn identity(&self) -> IdentityKey {
        IdentityKey::of_rc(self)
    }
}

impl<T: Identity + ?Sized> Identity for &T {
    fn identity(&self) -> IdentityKey {
        (**self).identity()
    }
}
