//! Per-tree registry of attached mappers.
//!
//! A [`MappingContext`] maps source identities to the findable mapper
//! currently bound to them, and fans lifecycle events out to
//! [`MappingContextListener`]s. One context is shared by every mapper of a
//! tree; several roots may share one context explicitly.
//!
//! # Invariants
//!
//! 1. A source identity maps to at most one mapper at a time.
//! 2. Registry bookkeeping completes before any listener runs, so a panicking
//!    listener cannot leave a half-applied entry behind.
//! 3. Listeners are notified in registration order, exactly once per
//!    successful register or unregister.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Duplicate source | Two findable mappers for one source | `register` returns `DuplicateSource` |
//! | Unknown entry | Unregister of a mapper not in the registry | `unregister` returns `NotRegistered` |
//! | Lookup miss | Unknown or non-findable source | `find` returns `None` |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::trace;
use treebind_model::{Identity, IdentityKey};

use crate::error::{MappingError, Result};
use crate::mapper::MapperRef;

/// Receives mapper registration events from a [`MappingContext`].
pub trait MappingContextListener {
    fn on_mapper_registered(&self, mapper: &MapperRef);
    fn on_mapper_unregistered(&self, mapper: &MapperRef);
}

/// Handle returned by [`MappingContext::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct ContextInner {
    mappers: RefCell<AHashMap<IdentityKey, MapperRef>>,
    listeners: RefCell<Vec<(ListenerId, Rc<dyn MappingContextListener>)>>,
    next_listener: Cell<u64>,
}

/// Shared registry for one mapper tree. Clones share state.
#[derive(Clone, Default)]
pub struct MappingContext {
    inner: Rc<ContextInner>,
}

impl MappingContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The mapper registered for `source`, if any.
    #[must_use]
    pub fn find<K: Identity + ?Sized>(&self, source: &K) -> Option<MapperRef> {
        self.find_by_key(source.identity())
    }

    #[must_use]
    pub fn find_by_key(&self, key: IdentityKey) -> Option<MapperRef> {
        self.inner.mappers.borrow().get(&key).cloned()
    }

    #[must_use]
    pub fn contains<K: Identity + ?Sized>(&self, source: &K) -> bool {
        self.inner.mappers.borrow().contains_key(&source.identity())
    }

    /// Number of registered mappers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.mappers.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.mappers.borrow().is_empty()
    }

    /// Snapshot of the registered mappers, in no particular order.
    #[must_use]
    pub fn mappers(&self) -> Vec<MapperRef> {
        self.inner.mappers.borrow().values().cloned().collect()
    }

    pub fn add_listener(&self, listener: Rc<dyn MappingContextListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Remove a listener; returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Whether two handles refer to the same context.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn register(&self, mapper: &MapperRef) -> Result<()> {
        let key = mapper.source_key();
        {
            let mut mappers = self.inner.mappers.borrow_mut();
            if let Some(existing) = mappers.get(&key) {
                return Err(MappingError::DuplicateSource {
                    key,
                    existing: existing.id(),
                    incoming: mapper.id(),
                });
            }
            mappers.insert(key, mapper.clone());
        }
        trace!(mapper = %mapper.id(), source = %key, "mapper registered");
        self.notify(|listener| listener.on_mapper_registered(mapper));
        Ok(())
    }

    pub(crate) fn unregister(&self, mapper: &MapperRef) -> Result<()> {
        let key = mapper.source_key();
        let removed = {
            let mut mappers = self.inner.mappers.borrow_mut();
            match mappers.get(&key) {
                Some(existing) if existing.id() == mapper.id() => mappers.remove(&key),
                _ => None,
            }
        };
        if removed.is_none() {
            return Err(MappingError::NotRegistered {
                key,
                mapper: mapper.id(),
            });
        }
        trace!(mapper = %mapper.id(), source = %key, "mapper unregistered");
        self.notify(|listener| listener.on_mapper_unregistered(mapper));
        Ok(())
    }

    fn notify(&self, mut f: impl FnMut(&dyn MappingContextListener)) {
        let snapshot: Vec<(ListenerId, Rc<dyn MappingContextListener>)> =
            self.inner.listeners.borrow().clone();
        for (id, listener) in snapshot {
            let still_registered = self
                .inner
                .listeners
                .borrow()
                .iter()
                .any(|(existing, _)| *existing == id);
            if still_registered {
                f(&*listener);
            }
        }
    }
}

impl fmt::Debug for MappingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingContext")
            .field("mappers", &self.inner.mappers.borrow().len())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}
