//! Child-ownership roles.
//!
//! A role is a named slot on a mapper that owns child mappers (or, for
//! property syncs, live subscriptions). Roles attach in declaration order
//! when the owner attaches and detach in reverse order when it detaches.
//!
//! | Role | Children come from | Target side |
//! |------|--------------------|-------------|
//! | [`ChildList`] | Explicit calls | none |
//! | [`ChildSet`] | Explicit calls | none |
//! | [`SimpleRole`] | An accessor, on [`SimpleRole::refresh`] | `ObservableList` |
//! | [`ObservableRole`] | An observable collection, live | `ObservableList` |
//! | [`SingleChildRole`] | A `Property<Option<_>>`, live | `Property<Option<_>>` |
//! | property sync | none | A bound `Property` |
//!
//! Every role with a target side owns that target: it is cleared when the
//! role attaches and emptied again when it detaches.

mod children;
mod container;
mod observable;
mod property;
mod simple;
mod single;

use std::rc::{Rc, Weak};

use tracing::debug_span;

pub use container::{ChildList, ChildSet};
pub use observable::ObservableRole;
pub use simple::SimpleRole;
pub use single::SingleChildRole;

use crate::context::MappingContext;
use crate::error::{MappingError, Result};
use crate::mapper::{MapperNode, MapperRef, MapperState};

/// The kind of a declared role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    ChildList,
    ChildSet,
    Simple,
    Observable,
    Single,
    Property,
}

/// Attach/detach behavior of one role.
pub(crate) trait RoleDriver {
    fn attach(&self, ctx: &MappingContext) -> Result<()>;
    fn detach(&self) -> Result<()>;
}

#[derive(Clone)]
pub(crate) struct Role {
    kind: RoleKind,
    driver: Rc<dyn RoleDriver>,
}

impl Role {
    pub(crate) fn new(kind: RoleKind, driver: Rc<dyn RoleDriver>) -> Self {
        Self { kind, driver }
    }

    pub(crate) fn kind(&self) -> RoleKind {
        self.kind
    }

    pub(crate) fn attach(&self, ctx: &MappingContext) -> Result<()> {
        let _span = debug_span!("role.attach", kind = ?self.kind).entered();
        self.driver.attach(ctx)
    }

    pub(crate) fn detach(&self) -> Result<()> {
        let _span = debug_span!("role.detach", kind = ?self.kind).entered();
        self.driver.detach()
    }
}

/// Take ownership of `child` on behalf of `owner`.
///
/// The child must be detached, unowned, and not an ancestor of the owner.
pub(crate) fn adopt(owner: &Weak<dyn MapperNode>, child: &MapperRef) -> Result<()> {
    if child.parent().is_some() {
        return Err(MappingError::AlreadyOwned { mapper: child.id() });
    }
    let state = child.state();
    if state != MapperState::Detached {
        return Err(MappingError::invalid_state(
            child.id(),
            MapperState::Detached,
            state,
        ));
    }
    let mut cursor = owner.upgrade().map(MapperRef);
    while let Some(node) = cursor {
        if node.id() == child.id() {
            return Err(MappingError::Cycle { mapper: child.id() });
        }
        cursor = node.parent();
    }
    child.set_parent(Some(owner.clone()));
    Ok(())
}

/// Whether `owner` is tearing down its roles.
pub(crate) fn owner_detaching(owner: &Weak<dyn MapperNode>) -> bool {
    owner
        .upgrade()
        .is_some_and(|node| node.state() == MapperState::Detaching)
}

/// Refuse new children while `owner` is detaching. They would outlive it.
pub(crate) fn ensure_accepting(owner: &Weak<dyn MapperNode>) -> Result<()> {
    match owner.upgrade() {
        Some(node) if node.state() == MapperState::Detaching => Err(MappingError::invalid_state(
            node.id(),
            MapperState::Attached,
            MapperState::Detaching,
        )),
        _ => Ok(()),
    }
}

/// Drop ownership of `child`.
pub(crate) fn release(child: &MapperRef) {
    child.set_parent(None);
}

/// Keep the first error of a multi-step teardown.
pub(crate) fn first_error(results: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    let mut first = Ok(());
    for result in results {
        if first.is_ok() {
            first = result;
        }
    }
    first
}
