//! Ordered observable collection.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::collection::{
    ClosureListener, CollectionItemEvent, CollectionListener, ObservableCollection, dispatch,
};
use crate::identity::{Identity, IdentityKey};
use crate::subscription::{Listeners, Subscription};

struct ListInner<T> {
    items: RefCell<Vec<T>>,
    listeners: Listeners<dyn CollectionListener<T>>,
}

/// Shared, ordered, observable list.
///
/// Every mutation emits one event per element with the element's index.
/// Clones share state. Index arguments follow `Vec` semantics and panic when
/// out of bounds.
pub struct ObservableList<T> {
    inner: Rc<ListInner<T>>,
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> ObservableList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a list with initial contents. No events are emitted.
    #[must_use]
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(ListInner {
                items: RefCell::new(items),
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
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Snapshot of the contents.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    /// Borrow the contents without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` mutates this list.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.items.borrow())
    }

    /// Append `item`.
    pub fn add(&self, item: T) {
        let index = self.len();
        self.insert(index, item);
    }

    /// Insert `item` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&self, index: usize, item: T) {
        self.inner.items.borrow_mut().insert(index, item.clone());
        self.fire(CollectionItemEvent::added(item, Some(index)));
    }

    /// Remove and return the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove_at(&self, index: usize) -> T {
        let item = self.inner.items.borrow_mut().remove(index);
        self.fire(CollectionItemEvent::removed(item.clone(), Some(index)));
        item
    }

    /// Replace the element at `index`, emitting a remove then an add.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn set(&self, index: usize, item: T) -> T {
        let old = self.remove_at(index);
        self.insert(index, item);
        old
    }

    /// Remove every element, last to first.
    pub fn clear(&self) {
        while let Some(last) = self.len().checked_sub(1) {
            self.remove_at(last);
        }
    }

    /// Register a structural listener.
    pub fn add_listener(&self, listener: Rc<dyn CollectionListener<T>>) -> Subscription {
        self.inner.listeners.add(listener)
    }

    /// Register a closure receiving every event.
    pub fn subscribe(&self, f: impl Fn(&CollectionItemEvent<T>) + 'static) -> Subscription {
        self.add_listener(Rc::new(ClosureListener(f)))
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn fire(&self, event: CollectionItemEvent<T>) {
        trace!(kind = %event.kind, index = ?event.index, "list changed");
        self.inner
            .listeners
            .notify(|listener| dispatch(listener, &event));
    }
}

impl<T: Clone + PartialEq + 'static> ObservableList<T> {
    #[must_use]
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.inner.items.borrow().iter().position(|i| i == item)
    }

    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Remove the first element equal to `item`.
    pub fn remove(&self, item: &T) -> bool {
        match self.index_of(item) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }
}

impl<T: Clone + 'static> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> From<Vec<T>> for ObservableList<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T: Clone + 'static> ObservableCollection<T> for ObservableList<T> {
    fn items(&self) -> Vec<T> {
        ObservableList::items(self)
    }

    fn len(&self) -> usize {
        ObservableList::len(self)
    }

    fn is_ordered(&self) -> bool {
        true
    }

    fn add(&self, item: T) -> bool {
        ObservableList::add(self, item);
        true
    }

    fn remove(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        ObservableList::remove(self, item)
    }

    fn clear(&self) {
        ObservableList::clear(self);
    }

    fn add_listener(&self, listener: Rc<dyn CollectionListener<T>>) -> Subscription {
        ObservableList::add_listener(self, listener)
    }
}

impl<T> Identity for ObservableList<T> {
    fn identity(&self) -> IdentityKey {
        IdentityKey::of_rc(&self.inner)
    }
}

impl<T> PartialEq for ObservableList<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for ObservableList<T> {}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.items.borrow().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + 'static>(
        list: &ObservableList<T>,
    ) -> (Rc<RefCell<Vec<CollectionItemEvent<T>>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = list.subscribe(move |e| l.borrow_mut().push(e.clone()));
        (log, sub)
    }

    #[test]
    fn insert_reports_index() {
        let list = ObservableList::from_vec(vec!['a', 'c']);
        let (log, _sub) = recorder(&list);

        list.insert(1, 'b');
        assert_eq!(list.items(), vec!['a', 'b', 'c']);
        assert_eq!(*log.borrow(), vec![CollectionItemEvent::added('b', Some(1))]);
    }

    #[test]
    fn clear_removes_last_to_first() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        let (log, _sub) = recorder(&list);

        list.clear();
        assert!(list.is_empty());
        assert_eq!(
            *log.borrow(),
            vec![
                CollectionItemEvent::removed(3, Some(2)),
                CollectionItemEvent::removed(2, Some(1)),
                CollectionItemEvent::removed(1, Some(0)),
            ]
        );
    }

    #[test]
    fn set_is_remove_then_add() {
        let list = ObservableList::from_vec(vec![1, 2]);
        let (log, _sub) = recorder(&list);

        assert_eq!(list.set(0, 9), 1);
        assert_eq!(list.items(), vec![9, 2]);
        assert_eq!(
            *log.borrow(),
            vec![
                CollectionItemEvent::removed(1, Some(0)),
                CollectionItemEvent::added(9, Some(0)),
            ]
        );
    }

    #[test]
    fn remove_by_value() {
        let list = ObservableList::from_vec(vec!["x", "y"]);
        assert!(list.remove(&"y"));
        assert!(!list.remove(&"z"));
        assert_eq!(list.items(), vec!["x"]);
    }

    #[test]
    fn listener_reads_post_change_contents() {
        let list = ObservableList::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (s, handle) = (Rc::clone(&seen), list.clone());
        let _sub = list.subscribe(move |_| s.borrow_mut().push(handle.len()));

        list.add(1);
        list.add(2);
        list.remove_at(0);
        assert_eq!(*seen.borrow(), vec![1, 2, 1]);
    }

    #[test]
    fn listener_may_mutate_list() {
        let list = ObservableList::new();
        let handle = list.clone();
        let _sub = list.subscribe(move |e| {
            if let Some(&v) = e.new_item.as_ref() {
                if v < 3 {
                    handle.add(v + 1);
                }
            }
        });

        list.add(0);
        assert_eq!(list.items(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn dropped_listener_stops() {
        let list = ObservableList::new();
        let (log, sub) = recorder(&list);
        list.add(1);
        drop(sub);
        list.add(2);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(list.listener_count(), 0);
    }

    #[test]
    #[should_panic]
    fn insert_out_of_bounds_panics() {
        let list: ObservableList<i32> = ObservableList::new();
        list.insert(1, 0);
    }
}
