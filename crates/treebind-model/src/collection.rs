//! Structural events and the observable-collection capability.
//!
//! Every observable collection reports structural changes as a stream of
//! [`CollectionItemEvent`]s: one event per added or removed element. Ordered
//! collections report the element's index; unordered ones report `None`
//! (displayed as `-1`).
//!
//! Events are delivered after the collection has been mutated, so a listener
//! reading the collection observes the post-change contents.

use std::fmt;
use std::rc::Rc;

use crate::subscription::Subscription;

/// Kind of structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    Add,
    Remove,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
        })
    }
}

/// A single structural change.
///
/// `new_item` is set for [`EventKind::Add`], `old_item` for
/// [`EventKind::Remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectionItemEvent<T> {
    pub old_item: Option<T>,
    pub new_item: Option<T>,
    pub index: Option<usize>,
    pub kind: EventKind,
}

impl<T> CollectionItemEvent<T> {
    /// An add event for `item`.
    #[must_use]
    pub fn added(item: T, index: Option<usize>) -> Self {
        Self {
            old_item: None,
            new_item: Some(item),
            index,
            kind: EventKind::Add,
        }
    }

    /// A remove event for `item`.
    #[must_use]
    pub fn removed(item: T, index: Option<usize>) -> Self {
        Self {
            old_item: Some(item),
            new_item: None,
            index,
            kind: EventKind::Remove,
        }
    }

    /// The element the event is about: the added item for adds, the removed
    /// item for removes.
    #[must_use]
    pub fn item(&self) -> Option<&T> {
        match self.kind {
            EventKind::Add => self.new_item.as_ref(),
            EventKind::Remove => self.old_item.as_ref(),
        }
    }

    /// Translate the event's items with `f`, keeping index and kind.
    #[must_use]
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> CollectionItemEvent<U> {
        CollectionItemEvent {
            old_item: self.old_item.as_ref().map(&f),
            new_item: self.new_item.as_ref().map(&f),
            index: self.index,
            kind: self.kind,
        }
    }
}

impl<T: fmt::Debug> fmt::Display for CollectionItemEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = self.index.map_or(-1, |i| i as i64);
        write!(
            f,
            "{} {:?} -> {:?} @ {}",
            self.kind, self.old_item, self.new_item, index
        )
    }
}

/// Receives structural events from an observable collection.
pub trait CollectionListener<T> {
    fn on_item_added(&self, event: &CollectionItemEvent<T>);
    fn on_item_removed(&self, event: &CollectionItemEvent<T>);
}

/// Dispatch an event to the callback matching its kind.
pub(crate) fn dispatch<T>(listener: &dyn CollectionListener<T>, event: &CollectionItemEvent<T>) {
    match event.kind {
        EventKind::Add => listener.on_item_added(event),
        EventKind::Remove => listener.on_item_removed(event),
    }
}

/// A [`CollectionListener`] backed by a single closure receiving every event.
pub struct ClosureListener<F>(pub F);

impl<T, F: Fn(&CollectionItemEvent<T>)> CollectionListener<T> for ClosureListener<F> {
    fn on_item_added(&self, event: &CollectionItemEvent<T>) {
        (self.0)(event);
    }

    fn on_item_removed(&self, event: &CollectionItemEvent<T>) {
        (self.0)(event);
    }
}

/// Capability shared by all observable collections and adapters.
///
/// This is the surface the mapping engine consumes: current contents,
/// ordering, and structural listeners.
pub trait ObservableCollection<T> {
    /// Snapshot of the current contents, in iteration order.
    fn items(&self) -> Vec<T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether events carry indices.
    fn is_ordered(&self) -> bool;

    /// Append (or insert, for sets) an element. Returns `false` if a set
    /// already contained it.
    fn add(&self, item: T) -> bool;

    /// Remove the first element equal to `item`. Returns whether one was
    /// found.
    fn remove(&self, item: &T) -> bool
    where
        T: PartialEq;

    /// Remove every element, one event per element.
    fn clear(&self);

    /// Register a structural listener.
    fn add_listener(&self, listener: Rc<dyn CollectionListener<T>>) -> Subscription;
}
