//! Listener registration and RAII unsubscription.
//!
//! Every observable in this crate keeps its listeners in a [`Listeners`]
//! list: an ordered `Vec` of `Weak` references. The strong reference lives in
//! the [`Subscription`] handed back to the caller, so dropping the
//! subscription is all it takes to unsubscribe. Dead entries are pruned
//! lazily at the start of each fan-out.
//!
//! # Invariants
//!
//! 1. Listeners are notified in registration order.
//! 2. No interior borrow is held while a listener runs, so listeners may
//!    freely subscribe, unsubscribe, or mutate the observable they listen to.
//! 3. A listener whose subscription is dropped during a fan-out does not
//!    receive the remainder of that fan-out.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// RAII guard for a registered listener.
///
/// The listener stays registered exactly as long as this guard is alive.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn Any>,
}

impl Subscription {
    /// Wrap any value whose lifetime should bound a registration.
    pub fn new(guard: impl Any) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }

    /// Combine several subscriptions into one guard.
    pub fn merge(subscriptions: Vec<Subscription>) -> Self {
        Self::new(subscriptions)
    }

    /// Unsubscribe now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Ordered listener list shared by every observable type.
pub(crate) struct Listeners<L: ?Sized> {
    slots: RefCell<Vec<Weak<L>>>,
}

impl<L: ?Sized + 'static> Listeners<L> {
    pub(crate) fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
        }
    }

    /// Register `listener`; it stays registered while the returned guard lives.
    pub(crate) fn add(&self, listener: Rc<L>) -> Subscription {
        self.slots.borrow_mut().push(Rc::downgrade(&listener));
        Subscription::new(listener)
    }

    /// Number of live listeners.
    pub(crate) fn len(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }

    /// Call `f` for every live listener, in registration order.
    pub(crate) fn notify(&self, mut f: impl FnMut(&L)) {
        let snapshot: Vec<Weak<L>> = {
            let mut slots = self.slots.borrow_mut();
            slots.retain(|slot| slot.strong_count() > 0);
            slots.clone()
        };
        for slot in snapshot {
            if let Some(listener) = slot.upgrade() {
                f(&listener);
            }
        }
    }
}
