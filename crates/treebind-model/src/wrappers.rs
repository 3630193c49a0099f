//! Bidirectional collection adapters.
//!
//! [`ObservableListWrapper`] and [`ObservableSetWrapper`] present a source
//! collection of `A` as a collection of `B`, using a pair of element mapping
//! functions. They keep no copy of the target contents: reads map the source
//! through `to_target`, and writes map through `to_source` and mutate the
//! source.
//!
//! # Invariants
//!
//! 1. The target always equals `source.map(to_target)`, index for index when
//!    ordered, after every mutation through either side.
//! 2. A target listener is registered as a translating listener on the
//!    source's own listener list. Notification order across the two sides is
//!    therefore plain registration order, whichever side a mutation enters
//!    through.
//! 3. The adapter installs no listener of its own, so it never re-enters
//!    itself.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Non-inverse mappers | `to_target(to_source(b)) != b` | Target shows `to_target(to_source(b))` |
//! | Index out of bounds | Bad index | Panics, like `Vec` |
//! | Mapper panics | Caller bug | Propagates to the mutating or reading call |

use std::fmt;
use std::rc::Rc;

use crate::collection::{
    ClosureListener, CollectionItemEvent, CollectionListener, ObservableCollection, dispatch,
};
use crate::list::ObservableList;
use crate::set::ObservableSet;
use crate::subscription::Subscription;

type MapFn<X, Y> = Rc<dyn Fn(&X) -> Y>;

/// Forwards source events to a target listener, translated through `to_target`.
struct Translating<A, B> {
    listener: Rc<dyn CollectionListener<B>>,
    to_target: MapFn<A, B>,
}

impl<A, B> CollectionListener<A> for Translating<A, B> {
    fn on_item_added(&self, event: &CollectionItemEvent<A>) {
        dispatch(&*self.listener, &event.map(|a| (self.to_target)(a)));
    }

    fn on_item_removed(&self, event: &CollectionItemEvent<A>) {
        dispatch(&*self.listener, &event.map(|a| (self.to_target)(a)));
    }
}

/// Ordered view of an [`ObservableList<A>`] as a list of `B`.
pub struct ObservableListWrapper<A, B> {
    source: ObservableList<A>,
    to_target: MapFn<A, B>,
    to_source: MapFn<B, A>,
}

impl<A, B> Clone for ObservableListWrapper<A, B> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            to_target: Rc::clone(&self.to_target),
            to_source: Rc::clone(&self.to_source),
        }
    }
}

impl<A: Clone + 'static, B: Clone + 'static> ObservableListWrapper<A, B> {
    pub fn new(
        source: ObservableList<A>,
        to_target: impl Fn(&A) -> B + 'static,
        to_source: impl Fn(&B) -> A + 'static,
    ) -> Self {
        Self {
            source,
            to_target: Rc::new(to_target),
            to_source: Rc::new(to_source),
        }
    }

    /// The backing source list.
    #[must_use]
    pub fn source(&self) -> &ObservableList<A> {
        &self.source
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<B> {
        self.source.get(index).map(|a| (self.to_target)(&a))
    }

    #[must_use]
    pub fn items(&self) -> Vec<B> {
        self.source
            .with(|items| items.iter().map(|a| (self.to_target)(a)).collect())
    }

    pub fn add(&self, item: B) {
        self.source.add((self.to_source)(&item));
    }

    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&self, index: usize, item: B) {
        self.source.insert(index, (self.to_source)(&item));
    }

    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove_at(&self, index: usize) -> B {
        (self.to_target)(&self.source.remove_at(index))
    }

    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn set(&self, index: usize, item: B) -> B {
        (self.to_target)(&self.source.set(index, (self.to_source)(&item)))
    }

    pub fn clear(&self) {
        self.source.clear();
    }

    pub fn add_listener(&self, listener: Rc<dyn CollectionListener<B>>) -> Subscription {
        self.source.add_listener(Rc::new(Translating {
            listener,
            to_target: Rc::clone(&self.to_target),
        }))
    }

    pub fn subscribe(&self, f: impl Fn(&CollectionItemEvent<B>) + 'static) -> Subscription {
        self.add_listener(Rc::new(ClosureListener(f)))
    }
}

impl<A: Clone + 'static, B: Clone + PartialEq + 'static> ObservableListWrapper<A, B> {
    #[must_use]
    pub fn index_of(&self, item: &B) -> Option<usize> {
        self.source
            .with(|items| items.iter().position(|a| (self.to_target)(a) == *item))
    }

    /// Remove the first element whose mapped value equals `item`.
    pub fn remove(&self, item: &B) -> bool {
        match self.index_of(item) {
            Some(index) => {
                self.source.remove_at(index);
                true
            }
            None => false,
        }
    }
}

impl<A: Clone + 'static, B: Clone + 'static> ObservableCollection<B>
    for ObservableListWrapper<A, B>
{
    fn items(&self) -> Vec<B> {
        ObservableListWrapper::items(self)
    }

    fn len(&self) -> usize {
        ObservableListWrapper::len(self)
    }

    fn is_ordered(&self) -> bool {
        true
    }

    fn add(&self, item: B) -> bool {
        ObservableListWrapper::add(self, item);
        true
    }

    fn remove(&self, item: &B) -> bool
    where
        B: PartialEq,
    {
        ObservableListWrapper::remove(self, item)
    }

    fn clear(&self) {
        ObservableListWrapper::clear(self);
    }

    fn add_listener(&self, listener: Rc<dyn CollectionListener<B>>) -> Subscription {
        ObservableListWrapper::add_listener(self, listener)
    }
}

impl<A, B: fmt::Debug + Clone + 'static> fmt::Debug for ObservableListWrapper<A, B>
where
    A: Clone + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items()).finish()
    }
}

/// Unordered view of an [`ObservableSet<A>`] as a set of `B`.
pub struct ObservableSetWrapper<A, B> {
    source: ObservableSet<A>,
    to_target: MapFn<A, B>,
    to_source: MapFn<B, A>,
}

impl<A, B> Clone for ObservableSetWrapper<A, B> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            to_target: Rc::clone(&self.to_target),
            to_source: Rc::clone(&self.to_source),
        }
    }
}

impl<A: Clone + PartialEq + 'static, B: Clone + 'static> ObservableSetWrapper<A, B> {
    pub fn new(
        source: ObservableSet<A>,
        to_target: impl Fn(&A) -> B + 'static,
        to_source: impl Fn(&B) -> A + 'static,
    ) -> Self {
        Self {
            source,
            to_target: Rc::new(to_target),
            to_source: Rc::new(to_source),
        }
    }

    #[must_use]
    pub fn source(&self) -> &ObservableSet<A> {
        &self.source
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    #[must_use]
    pub fn items(&self) -> Vec<B> {
        self.source
            .items()
            .iter()
            .map(|a| (self.to_target)(a))
            .collect()
    }

    /// Insert `item` into the source as `to_source(item)`.
    pub fn add(&self, item: B) -> bool {
        self.source.add((self.to_source)(&item))
    }

    /// Remove `to_source(item)` from the source.
    pub fn remove(&self, item: &B) -> bool {
        self.source.remove(&(self.to_source)(item))
    }

    #[must_use]
    pub fn contains(&self, item: &B) -> bool {
        self.source.contains(&(self.to_source)(item))
    }

    pub fn clear(&self) {
        self.source.clear();
    }

    pub fn add_listener(&self, listener: Rc<dyn CollectionListener<B>>) -> Subscription {
        self.source.add_listener(Rc::new(Translating {
            listener,
            to_target: Rc::clone(&self.to_target),
        }))
    }

    pub fn subscribe(&self, f: impl Fn(&CollectionItemEvent<B>) + 'static) -> Subscription {
        self.add_listener(Rc::new(ClosureListener(f)))
    }
}

impl<A: Clone + PartialEq + 'static, B: Clone + 'static> ObservableCollection<B>
    for ObservableSetWrapper<A, B>
{
    fn items(&self) -> Vec<B> {
        ObservableSetWrapper::items(self)
    }

    fn len(&self) -> usize {
        ObservableSetWrapper::len(self)
    }

    fn is_ordered(&self) -> bool {
        false
    }

    fn add(&self, item: B) -> bool {
        ObservableSetWrapper::add(self, item)
    }

    fn remove(&self, item: &B) -> bool
    where
        B: PartialEq,
    {
        ObservableSetWrapper::remove(self, item)
    }

    fn clear(&self) {
        ObservableSetWrapper::clear(self);
    }

    fn add_listener(&self, listener: Rc<dyn CollectionListener<B>>) -> Subscription {
        ObservableSetWrapper::add_listener(self, listener)
    }
}

impl<A: Clone + PartialEq + 'static, B: fmt::Debug + Clone + 'static> fmt::Debug
    for ObservableSetWrapper<A, B>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.items()).finish()
    }
}
