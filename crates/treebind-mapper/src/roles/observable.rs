//! Collection-driven child role kept live through listener events.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};
use treebind_model::{
    CollectionItemEvent, CollectionListener, Identity, ObservableCollection, ObservableList,
    ObservableListWrapper, Subscription,
};

use super::children::MappedChildren;
use super::{Role, RoleDriver, RoleKind};
use crate::context::MappingContext;
use crate::error::Result;
use crate::mapper::Mapper;

struct ObservableRoleState<SE, TE> {
    this: Weak<Self>,
    source: Rc<dyn ObservableCollection<SE>>,
    children: MappedChildren<SE, TE>,
    context: RefCell<Option<MappingContext>>,
    subscription: RefCell<Option<Subscription>>,
}

impl<SE: Identity + 'static, TE: Clone + 'static> ObservableRoleState<SE, TE> {
    fn populate(&self, ctx: &MappingContext) -> Result<()> {
        for (index, item) in self.source.items().iter().enumerate() {
            self.children.insert(index, item, ctx)?;
        }
        Ok(())
    }

    fn on_added(&self, event: &CollectionItemEvent<SE>) {
        let Some(item) = event.new_item.as_ref() else {
            return;
        };
        let Some(ctx) = self.context.borrow().clone() else {
            return;
        };
        if self.children.owner_detaching() {
            trace!("owner detaching, added item ignored");
            return;
        }
        let index = event.index.unwrap_or_else(|| self.children.len());
        if let Err(err) = self.children.insert(index, item, &ctx) {
            panic!("observable role could not attach a child for an added item: {err}");
        }
    }

    fn on_removed(&self, event: &CollectionItemEvent<SE>) {
        if self.context.borrow().is_none() {
            return;
        }
        let index = match (event.index, event.old_item.as_ref()) {
            (Some(index), _) => Some(index),
            (None, Some(item)) => self.children.position_from(item.identity(), 0),
            (None, None) => None,
        };
        let Some(index) = index else {
            warn!(event = %event.kind, "removed item has no mapped child");
            return;
        };
        if let Err(err) = self.children.remove(index) {
            panic!("observable role could not detach a child for a removed item: {err}");
        }
    }
}

struct RoleListener<SE, TE> {
    role: Weak<ObservableRoleState<SE, TE>>,
}

impl<SE: Identity + 'static, TE: Clone + 'static> CollectionListener<SE> for RoleListener<SE, TE> {
    fn on_item_added(&self, event: &CollectionItemEvent<SE>) {
        if let Some(role) = self.role.upgrade() {
            role.on_added(event);
        }
    }

    fn on_item_removed(&self, event: &CollectionItemEvent<SE>) {
        if let Some(role) = self.role.upgrade() {
            role.on_removed(event);
        }
    }
}

impl<SE: Identity + 'static, TE: Clone + 'static> RoleDriver for ObservableRoleState<SE, TE> {
    fn attach(&self, ctx: &MappingContext) -> Result<()> {
        self.children.target().clear();
        *self.context.borrow_mut() = Some(ctx.clone());
        if let Err(err) = self.populate(ctx) {
            if let Err(cleanup) = self.children.clear() {
                warn!(error = %cleanup, "cleanup after failed observable role attach");
            }
            self.context.borrow_mut().take();
            return Err(err);
        }
        let listener = Rc::new(RoleListener {
            role: self.this.clone(),
        });
        *self.subscription.borrow_mut() = Some(self.source.add_listener(listener));
        Ok(())
    }

    fn detach(&self) -> Result<()> {
        self.subscription.borrow_mut().take();
        let result = self.children.clear();
        self.context.borrow_mut().take();
        result
    }
}

/// A child role that tracks an observable collection.
///
/// On attach the role creates one child per element and subscribes to the
/// collection; afterwards every add or remove event adds or removes the
/// matching child and target entry. The subscription exists exactly while
/// the role is attached.
///
/// # Panics
///
/// Event handlers cannot return errors. An element whose child fails to
/// attach (for example because its source is already mapped elsewhere in the
/// tree) panics inside the collection mutation that reported it.
pub struct ObservableRole<SE, TE> {
    state: Rc<ObservableRoleState<SE, TE>>,
}

impl<SE, TE> Clone for ObservableRole<SE, TE> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<SE: Identity + 'static, TE: Clone + 'static> ObservableRole<SE, TE> {
    #[must_use]
    pub fn children(&self) -> Vec<Mapper<SE, TE>> {
        self.state.children.mappers()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn target(&self) -> &ObservableList<TE> {
        self.state.children.target()
    }

    /// Whether the role currently listens to its source.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state.subscription.borrow().is_some()
    }
}

impl<S: Identity + 'static, T: 'static> Mapper<S, T> {
    /// Declare a role whose children track `source` live.
    pub fn create_observable_role<SE, TE>(
        &self,
        source: impl ObservableCollection<SE> + 'static,
        target: ObservableList<TE>,
        factory: impl Fn(&SE) -> Mapper<SE, TE> + 'static,
    ) -> ObservableRole<SE, TE>
    where
        SE: Identity + 'static,
        TE: Clone + 'static,
    {
        let source: Rc<dyn ObservableCollection<SE>> = Rc::new(source);
        let owner = self.owner_weak();
        let state = Rc::new_cyclic(|this| ObservableRoleState {
            this: this.clone(),
            source,
            children: MappedChildren::new(owner, target, Box::new(factory)),
            context: RefCell::new(None),
            subscription: RefCell::new(None),
        });
        self.add_role(Role::new(RoleKind::Observable, state.clone()));
        ObservableRole { state }
    }

    /// Declare an observable role over a list whose elements are converted
    /// to child sources by `to_child` and back by `to_element`.
    pub fn create_mapped_role<A, SE, TE>(
        &self,
        source: ObservableList<A>,
        to_child: impl Fn(&A) -> SE + 'static,
        to_element: impl Fn(&SE) -> A + 'static,
        target: ObservableList<TE>,
        factory: impl Fn(&SE) -> Mapper<SE, TE> + 'static,
    ) -> ObservableRole<SE, TE>
    where
        A: Clone + 'static,
        SE: Identity + Clone + 'static,
        TE: Clone + 'static,
    {
        let adapter = ObservableListWrapper::new(source, to_child, to_element);
        self.create_observable_role(adapter, target, factory)
    }
}
