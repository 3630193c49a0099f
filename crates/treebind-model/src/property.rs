//! Observable single values.
//!
//! A [`Property<T>`] is a shared, version-tracked cell that notifies
//! subscribers with a [`PropertyChangeEvent`] carrying both the old and the
//! new value.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per `set` that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current one is a no-op (no version bump,
//!    no notifications).
//! 4. The new value is stored before any subscriber runs, so `get()` inside a
//!    callback observes the new value.
//! 5. Clones share state; equality between handles is identity.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::identity::{Identity, IdentityKey};
use crate::subscription::{Listeners, Subscription};

/// Old and new value of a property change.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyChangeEvent<T> {
    pub old_value: T,
    pub new_value: T,
}

impl<T> PropertyChangeEvent<T> {
    #[must_use]
    pub fn new(old_value: T, new_value: T) -> Self {
        Self {
            old_value,
            new_value,
        }
    }
}

impl<T: fmt::Display> fmt::Display for PropertyChangeEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.old_value, self.new_value)
    }
}

type ChangeHandler<T> = dyn Fn(&PropertyChangeEvent<T>);

struct PropertyInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    handlers: Listeners<ChangeHandler<T>>,
}

/// Shared observable value.
pub struct Property<T> {
    inner: Rc<PropertyInner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Property<T> {
    /// Create a property holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(PropertyInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                handlers: Listeners::new(),
            }),
        }
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` calls [`Property::set`] on this property.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value, notifying subscribers if it changed.
    pub fn set(&self, value: T) {
        let old = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            std::mem::replace(&mut *current, value.clone())
        };
        self.inner.version.set(self.inner.version.get() + 1);
        let event = PropertyChangeEvent::new(old, value);
        self.inner.handlers.notify(|handler| handler(&event));
    }

    /// Number of value changes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self, handler: impl Fn(&PropertyChangeEvent<T>) + 'static) -> Subscription {
        self.inner.handlers.add(Rc::new(handler))
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.len()
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Identity for Property<T> {
    fn identity(&self) -> IdentityKey {
        IdentityKey::of_rc(&self.inner)
    }
}

impl<T> PartialEq for Property<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for Property<T> {}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set() {
        let p = Property::new(1);
        p.set(2);
        assert_eq!(p.get(), 2);
        assert_eq!(p.version(), 1);
    }

    #[test]
    fn equal_set_is_noop() {
        let p = Property::new(String::from("a"));
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _sub = p.subscribe(move |_| f.set(f.get() + 1));

        p.set(String::from("a"));
        assert_eq!(p.version(), 0);
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn event_carries_old_and_new() {
        let p = Property::new(10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = p.subscribe(move |e| s.borrow_mut().push(e.clone()));

        p.set(20);
        p.set(30);
        assert_eq!(
            *seen.borrow(),
            vec![PropertyChangeEvent::new(10, 20), PropertyChangeEvent::new(20, 30)]
        );
    }

    #[test]
    fn handler_sees_new_value() {
        let p = Property::new(0);
        let observed = Rc::new(Cell::new(-1));
        let (o, handle) = (Rc::clone(&observed), p.clone());
        let _sub = p.subscribe(move |_| o.set(handle.get()));

        p.set(7);
        assert_eq!(observed.get(), 7);
    }

    #[test]
    fn handler_may_set_again() {
        let p = Property::new(0);
        let handle = p.clone();
        let _sub = p.subscribe(move |e| {
            if e.new_value < 3 {
                handle.set(e.new_value + 1);
            }
        });

        p.set(1);
        assert_eq!(p.get(), 3);
        assert_eq!(p.version(), 3);
    }

    #[test]
    fn dropping_subscription_stops_events() {
        let p = Property::new(0);
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let sub = p.subscribe(move |_| f.set(f.get() + 1));
        p.set(1);
        drop(sub);
        p.set(2);
        assert_eq!(fired.get(), 1);
        assert_eq!(p.subscriber_count(), 0);
    }

    #[test]
    fn clones_share_identity() {
        let p = Property::new(1);
        let q = p.clone();
        assert_eq!(p, q);
        assert_eq!(p.identity(), q.identity());
        assert_ne!(p, Property::new(1));
    }

    #[test]
    fn display_event() {
        assert_eq!(PropertyChangeEvent::new(1, 2).to_string(), "1 -> 2");
    }
}
