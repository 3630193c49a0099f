//! Explicitly managed child containers.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::warn;
use treebind_model::Identity;

use super::{Role, RoleDriver, RoleKind, adopt, ensure_accepting, first_error, release};
use crate::context::MappingContext;
use crate::error::Result;
use crate::mapper::{Mapper, MapperNode, MapperRef, MapperState};

struct ContainerState {
    owner: Weak<dyn MapperNode>,
    children: RefCell<Vec<MapperRef>>,
    context: RefCell<Option<MappingContext>>,
}

impl ContainerState {
    fn new(owner: Weak<dyn MapperNode>) -> Self {
        Self {
            owner,
            children: RefCell::new(Vec::new()),
            context: RefCell::new(None),
        }
    }

    fn child_at(&self, index: usize) -> Option<MapperRef> {
        self.children.borrow().get(index).cloned()
    }

    fn position(&self, child: &MapperRef) -> Option<usize> {
        self.children.borrow().iter().position(|c| c == child)
    }

    fn insert(&self, index: usize, child: MapperRef) -> Result<()> {
        ensure_accepting(&self.owner)?;
        adopt(&self.owner, &child)?;
        self.children.borrow_mut().insert(index, child.clone());
        let ctx = self.context.borrow().clone();
        if let Some(ctx) = ctx {
            if let Err(err) = child.attach(&ctx) {
                if let Some(index) = self.position(&child) {
                    self.children.borrow_mut().remove(index);
                }
                release(&child);
                return Err(err);
            }
        }
        Ok(())
    }

    fn remove_at(&self, index: usize) -> Result<MapperRef> {
        let child = self.children.borrow_mut().remove(index);
        let attached = self.context.borrow().is_some();
        let result = if attached { child.detach() } else { Ok(()) };
        release(&child);
        result.map(|()| child)
    }

    fn len(&self) -> usize {
        self.children.borrow().len()
    }

    fn clear(&self) -> Result<()> {
        let mut results = Vec::new();
        while let Some(last) = self.len().checked_sub(1) {
            results.push(self.remove_at(last).map(drop));
        }
        first_error(results)
    }
}

impl RoleDriver for ContainerState {
    fn attach(&self, ctx: &MappingContext) -> Result<()> {
        *self.context.borrow_mut() = Some(ctx.clone());
        let mut attached = 0;
        while let Some(child) = self.child_at(attached) {
            // Added by a sibling's hook during this loop, already attached.
            if child.state() != MapperState::Detached {
                attached += 1;
                continue;
            }
            if let Err(err) = child.attach(ctx) {
                let undone = (0..attached)
                    .rev()
                    .filter_map(|index| self.child_at(index))
                    .map(|child| child.detach());
                if let Err(undo) = first_error(undone) {
                    warn!(error = %undo, "child detach failed during container rollback");
                }
                self.context.borrow_mut().take();
                return Err(err);
            }
            attached += 1;
        }
        Ok(())
    }

    fn detach(&self) -> Result<()> {
        let result = self.clear();
        self.context.borrow_mut().take();
        result
    }
}

/// An ordered container of child mappers managed by explicit calls.
///
/// While the owner is attached, added children attach immediately and
/// removed children detach immediately. Detaching the owner empties the list;
/// adding while the owner is detaching fails with
/// [`MappingError::InvalidState`](crate::MappingError::InvalidState).
#[derive(Clone)]
pub struct ChildList {
    state: Rc<ContainerState>,
}

impl ChildList {
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.children.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<MapperRef> {
        self.state.child_at(index)
    }

    #[must_use]
    pub fn items(&self) -> Vec<MapperRef> {
        self.state.children.borrow().clone()
    }

    #[must_use]
    pub fn contains(&self, child: &MapperRef) -> bool {
        self.state.position(child).is_some()
    }

    pub fn add(&self, child: impl Into<MapperRef>) -> Result<()> {
        self.insert(self.len(), child)
    }

    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&self, index: usize, child: impl Into<MapperRef>) -> Result<()> {
        self.state.insert(index, child.into())
    }

    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove_at(&self, index: usize) -> Result<MapperRef> {
        self.state.remove_at(index)
    }

    /// Remove `child` if present. Returns whether it was a member.
    pub fn remove(&self, child: &MapperRef) -> Result<bool> {
        match self.state.position(child) {
            Some(index) => self.state.remove_at(index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Remove every child, last to first.
    pub fn clear(&self) -> Result<()> {
        self.state.clear()
    }
}

/// An unordered container of distinct child mappers.
///
/// Iteration follows insertion order; [`ChildSet::clear`] removes the newest
/// member first.
#[derive(Clone)]
pub struct ChildSet {
    state: Rc<ContainerState>,
}

impl ChildSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.children.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn items(&self) -> Vec<MapperRef> {
        self.state.children.borrow().clone()
    }

    #[must_use]
    pub fn contains(&self, child: &MapperRef) -> bool {
        self.state.position(child).is_some()
    }

    /// Add `child`. Returns `false` if it is already a member.
    pub fn add(&self, child: impl Into<MapperRef>) -> Result<bool> {
        let child = child.into();
        if self.contains(&child) {
            return Ok(false);
        }
        let end = self.len();
        self.state.insert(end, child).map(|()| true)
    }

    /// Remove `child`. Returns `false` if it was not a member.
    pub fn remove(&self, child: &MapperRef) -> Result<bool> {
        match self.state.position(child) {
            Some(index) => self.state.remove_at(index).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.state.clear()
    }
}

impl<S: Identity + 'static, T: 'static> Mapper<S, T> {
    /// Declare an ordered child container.
    pub fn create_child_list(&self) -> ChildList {
        let state = Rc::new(ContainerState::new(self.owner_weak()));
        self.add_role(Role::new(RoleKind::ChildList, state.clone()));
        ChildList { state }
    }

    /// Declare an unordered child container.
    pub fn create_child_set(&self) -> ChildSet {
        let state = Rc::new(ContainerState::new(self.owner_weak()));
        self.add_role(Role::new(RoleKind::ChildSet, state.clone()));
        ChildSet { state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MappingError;

    fn node() -> Mapper<Rc<()>, ()> {
        Mapper::new(Rc::new(()), ())
    }

    #[test]
    fn children_follow_owner_lifecycle() {
        let root = node();
        let list = root.create_child_list();
        let child = node();
        list.add(&child).unwrap();
        assert_eq!(child.state(), MapperState::Detached);
        assert!(child.parent().unwrap().is(&root));

        root.attach_root().unwrap();
        assert!(child.is_attached());
        assert!(root.descendant_mapper(child.source()).unwrap().is(&child));

        root.detach_root().unwrap();
        assert_eq!(child.state(), MapperState::Detached);
        assert!(child.parent().is_none());
        assert!(list.is_empty());
    }

    #[test]
    fn add_while_attached_attaches_immediately() {
        let root = node();
        let list = root.create_child_list();
        root.attach_root().unwrap();

        let child = node();
        list.add(&child).unwrap();
        assert!(child.is_attached());
        assert!(root.context().unwrap().contains(child.source()));

        let removed = list.remove_at(0).unwrap();
        assert!(removed.is(&child));
        assert_eq!(child.state(), MapperState::Detached);
        assert!(!root.context().unwrap().contains(child.source()));
    }

    #[test]
    fn owned_child_cannot_be_added_twice() {
        let a = node();
        let b = node();
        let child = node();
        a.create_child_list().add(&child).unwrap();
        assert_eq!(
            b.create_child_list().add(&child),
            Err(MappingError::AlreadyOwned { mapper: child.id() })
        );
    }

    #[test]
    fn ancestor_cannot_become_child() {
        let root = node();
        let mid = node();
        let list = root.create_child_list();
        list.add(&mid).unwrap();
        assert_eq!(
            list.add(&root),
            Err(MappingError::Cycle { mapper: root.id() })
        );
        let root_ref = root.erased();
        let err = mid.create_child_set().add(root_ref).unwrap_err();
        assert_eq!(err, MappingError::Cycle { mapper: root.id() });
    }

    #[test]
    fn attached_child_cannot_be_adopted() {
        let other = node();
        other.attach_root().unwrap();
        let root = node();
        let err = root.create_child_list().add(&other).unwrap_err();
        assert!(matches!(err, MappingError::InvalidState { .. }));
        assert!(other.parent().is_none());
    }

    #[test]
    fn failed_attach_rolls_back_membership() {
        let ctx = MappingContext::new();
        let shared = Rc::new(());
        let squatter = Mapper::new(Rc::clone(&shared), ());
        squatter.attach_root_with(&ctx).unwrap();

        let root = node();
        let list = root.create_child_list();
        root.attach_root_with(&ctx).unwrap();
        let child = Mapper::new(shared, ());
        assert!(matches!(
            list.add(&child),
            Err(MappingError::DuplicateSource { .. })
        ));
        assert!(list.is_empty());
        assert!(child.parent().is_none());
        assert_eq!(child.state(), MapperState::Detached);
    }

    #[test]
    fn set_ignores_duplicates_and_clears_newest_first() {
        let root = node();
        let set = root.create_child_set();
        let a = node();
        let b = node();
        assert_eq!(set.add(&a), Ok(true));
        assert_eq!(set.add(&b), Ok(true));
        assert_eq!(set.add(&a), Ok(false));
        assert_eq!(set.len(), 2);

        root.attach_root().unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));
        for m in [&a, &b] {
            let order = Rc::clone(&order);
            let id = m.id();
            m.on_detach(move || order.borrow_mut().push(id));
        }
        set.clear().unwrap();
        assert_eq!(*order.borrow(), vec![b.id(), a.id()]);
        assert!(!a.is_attached() && !b.is_attached());
    }

    #[test]
    fn sibling_failure_rolls_back_earlier_children() {
        let ctx = MappingContext::new();
        let shared = Rc::new(());
        Mapper::new(Rc::clone(&shared), ())
            .attach_root_with(&ctx)
            .unwrap();

        let root = node();
        let list = root.create_child_list();
        let first = node();
        let clash = Mapper::new(shared, ());
        list.add(&first).unwrap();
        list.add(&clash).unwrap();

        assert!(root.attach_root_with(&ctx).is_err());
        assert_eq!(root.state(), MapperState::Detached);
        assert_eq!(first.state(), MapperState::Detached);
        assert!(!ctx.contains(first.source()));
        assert!(!ctx.contains(root.source()));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn add_from_detach_hook_is_rejected() {
        let root = node();
        let set = root.create_child_set();
        let first = node();
        let late = node();
        set.add(&first).unwrap();
        root.attach_root().unwrap();
        let ctx = root.context().unwrap();

        let outcome = Rc::new(RefCell::new(None));
        {
            let (set, late, outcome) = (set.clone(), late.clone(), Rc::clone(&outcome));
            first.on_detach(move || *outcome.borrow_mut() = Some(set.add(&late)));
        }
        root.detach_root().unwrap();

        assert_eq!(
            *outcome.borrow(),
            Some(Err(MappingError::InvalidState {
                mapper: root.id(),
                expected: MapperState::Attached,
                actual: MapperState::Detaching,
            }))
        );
        assert_eq!(late.state(), MapperState::Detached);
        assert!(late.parent().is_none());
        assert!(set.is_empty());
        assert!(ctx.is_empty());
    }

    #[test]
    fn detached_owner_still_accepts_members() {
        let root = node();
        let list = root.create_child_list();
        root.attach_root().unwrap();
        root.detach_root().unwrap();
        list.add(&node()).unwrap();
        assert_eq!(list.len(), 1);
    }
}
