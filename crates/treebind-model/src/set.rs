//! Unordered observable collection.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::collection::{
    ClosureListener, CollectionItemEvent, CollectionListener, ObservableCollection, dispatch,
};
use crate::identity::{Identity, IdentityKey};
use crate::subscription::{Listeners, Subscription};

struct SetInner<T> {
    items: RefCell<Vec<T>>,
    listeners: Listeners<dyn CollectionListener<T>>,
}

/// Shared observable set.
///
/// Membership uses `PartialEq`. Iteration follows insertion order, but events
/// carry no index: consumers must not rely on positions.
pub struct ObservableSet<T> {
    inner: Rc<SetInner<T>>,
}

impl<T> Clone for ObservableSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> ObservableSet<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SetInner {
                items: RefCell::new(Vec::new()),
                listeners: Listeners::new(),
            }),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.inner.items.borrow().contains(item)
    }

    /// Snapshot of the members.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    /// Insert `item`; returns `false` (and emits nothing) if already present.
    pub fn add(&self, item: T) -> bool {
        {
            let mut items = self.inner.items.borrow_mut();
            if items.contains(&item) {
                return false;
            }
            items.push(item.clone());
        }
        self.fire(CollectionItemEvent::added(item, None));
        true
    }

    /// Insert every element of `items`.
    pub fn add_all(&self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.add(item);
        }
    }

    /// Remove `item`; returns `false` if it was not a member.
    pub fn remove(&self, item: &T) -> bool {
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            match items.iter().position(|i| i == item) {
                Some(index) => items.remove(index),
                None => return false,
            }
        };
        self.fire(CollectionItemEvent::removed(removed, None));
        true
    }

    /// Remove every member, most recently inserted first.
    pub fn clear(&self) {
        loop {
            let last = self.inner.items.borrow_mut().pop();
            match last {
                Some(item) => self.fire(CollectionItemEvent::removed(item, None)),
                None => break,
            }
        }
    }

    pub fn add_listener(&self, listener: Rc<dyn CollectionListener<T>>) -> Subscription {
        self.inner.listeners.add(listener)
    }

    pub fn subscribe(&self, f: impl Fn(&CollectionItemEvent<T>) + 'static) -> Subscription {
        self.add_listener(Rc::new(ClosureListener(f)))
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn fire(&self, event: CollectionItemEvent<T>) {
        trace!(kind = %event.kind, "set changed");
        self.inner
            .listeners
            .notify(|listener| dispatch(listener, &event));
    }
}

impl<T: Clone + PartialEq + 'static> Default for ObservableSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq + 'static> FromIterator<T> for ObservableSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let set = Self::new();
        set.add_all(iter);
        set
    }
}

impl<T: Clone + PartialEq + 'static> ObservableCollection<T> for ObservableSet<T> {
    fn items(&self) -> Vec<T> {
        ObservableSet::items(self)
    }

    fn len(&self) -> usize {
        ObservableSet::len(self)
    }

    fn is_ordered(&self) -> bool {
        false
    }

    fn add(&self, item: T) -> bool {
        ObservableSet::add(self, item)
    }

    fn remove(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        ObservableSet::remove(self, item)
    }

    fn clear(&self) {
        ObservableSet::clear(self);
    }

    fn add_listener(&self, listener: Rc<dyn CollectionListener<T>>) -> Subscription {
        ObservableSet::add_listener(self, listener)
    }
}

impl<T> Identity for ObservableSet<T> {
    fn identity(&self) -> IdentityKey {
        IdentityKey::of_rc(&self.inner)
    }
}

impl<T> PartialEq for ObservableSet<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for ObservableSet<T> {}

impl<T: fmt::Debug> fmt::Debug for ObservableSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.items.borrow().iter()).finish()
    }
}
