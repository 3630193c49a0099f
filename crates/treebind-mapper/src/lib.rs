#![forbid(unsafe_code)]

//! Tree synchronization engine for treebind.
//!
//! A [`Mapper`] binds one source object to one target object and owns child
//! mappers through roles. Attaching a root mapper attaches the whole tree
//! against a shared [`MappingContext`], which indexes every findable mapper
//! by the identity of its source. Detaching the root tears the tree down in
//! reverse order and leaves every role's target side empty.
//!
//! # Architecture
//!
//! - [`mapper`]: the [`Mapper`] handle, its lifecycle state machine, and the
//!   type-erased [`MapperRef`].
//! - [`context`]: the per-tree registry and its listener fan-out.
//! - [`roles`]: child containers and synchronizers declared on a mapper.
//! - [`error`]: [`MappingError`], returned by every fallible transition.
//!
//! Everything is single-threaded and `Rc`-based. Parents hold children
//! strongly; children point back weakly.
//!
//! # Invariants
//!
//! 1. Attach is pre-order (parent registers before its children), detach is
//!    post-order (children unregister before their parent).
//! 2. Roles attach in declaration order and detach in reverse.
//! 3. A source identity maps to at most one findable mapper per context.
//! 4. A mapper belongs to at most one role at a time.

pub mod context;
pub mod error;
pub mod mapper;
pub mod roles;

pub use context::{ListenerId, MappingContext, MappingContextListener};
pub use error::{MappingError, Result};
pub use mapper::{Mapper, MapperId, MapperRef, MapperState};
pub use roles::{ChildList, ChildSet, ObservableRole, RoleKind, SimpleRole, SingleChildRole};
