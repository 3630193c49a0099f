#![forbid(unsafe_code)]

//! Observable model primitives for treebind.
//!
//! This crate provides the change-notifying building blocks the mapping
//! engine consumes:
//!
//! - [`Property`]: a shared observable value reporting `(old, new)` changes.
//! - [`ObservableList`] / [`ObservableSet`]: shared collections emitting one
//!   [`CollectionItemEvent`] per added or removed element.
//! - [`ObservableListWrapper`] / [`ObservableSetWrapper`]: bidirectional
//!   adapters presenting a collection of `A` as a collection of `B`.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Identity`]: identity keys for shared objects.
//!
//! # Architecture
//!
//! All handles are `Rc`-based and single-threaded. Listeners are stored as
//! `Weak` references in registration order; the strong reference lives in
//! the returned [`Subscription`].
//!
//! # Invariants
//!
//! 1. Listeners are notified in registration order.
//! 2. Events are delivered after the mutation is applied.
//! 3. No interior borrow is held while a listener runs; nested mutations from
//!    a listener are processed depth-first before the outer fan-out resumes.

pub mod collection;
pub mod identity;
pub mod list;
pub mod property;
pub mod set;
pub mod subscription;
pub mod wrappers;

pub use collection::{
    ClosureListener, CollectionItemEvent, CollectionListener, EventKind, ObservableCollection,
};
pub use identity::{Identity, IdentityKey};
pub use list::ObservableList;
pub use property::{Property, PropertyChangeEvent};
pub use set::ObservableSet;
pub use subscription::Subscription;
pub use wrappers::{ObservableListWrapper, ObservableSetWrapper};
