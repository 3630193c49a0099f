//! Role owning at most one child, driven by an optional-valued property.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;
use treebind_model::{Identity, Property, Subscription};

use super::{Role, RoleDriver, RoleKind, adopt, ensure_accepting, owner_detaching, release};
use crate::context::MappingContext;
use crate::error::Result;
use crate::mapper::{Mapper, MapperNode};

struct SingleRoleState<SE, TE> {
    this: Weak<Self>,
    owner: Weak<dyn MapperNode>,
    source: Property<Option<SE>>,
    target: Property<Option<TE>>,
    factory: Box<dyn Fn(&SE) -> Mapper<SE, TE>>,
    child: RefCell<Option<Mapper<SE, TE>>>,
    context: RefCell<Option<MappingContext>>,
    subscription: RefCell<Option<Subscription>>,
}

impl<SE, TE> SingleRoleState<SE, TE>
where
    SE: Identity + Clone + PartialEq + 'static,
    TE: Clone + PartialEq + 'static,
{
    fn drop_child(&self) -> Result<()> {
        let old = self.child.borrow_mut().take();
        let Some(old) = old else {
            return Ok(());
        };
        let node = old.erased();
        let result = node.detach();
        release(&node);
        self.target.set(None);
        trace!(child = %node.id(), "single child dropped");
        result
    }

    /// Replace the child. The old child is fully detached first.
    fn replace(&self, source: Option<&SE>, ctx: &MappingContext) -> Result<()> {
        self.drop_child()?;
        let Some(source) = source else {
            return Ok(());
        };
        ensure_accepting(&self.owner)?;
        let child = (self.factory)(source);
        let node = child.erased();
        adopt(&self.owner, &node)?;
        if let Err(err) = node.attach(ctx) {
            release(&node);
            return Err(err);
        }
        *self.child.borrow_mut() = Some(child.clone());
        self.target.set(Some(child.target().clone()));
        trace!(child = %node.id(), "single child attached");
        Ok(())
    }
}

impl<SE, TE> RoleDriver for SingleRoleState<SE, TE>
where
    SE: Identity + Clone + PartialEq + 'static,
    TE: Clone + PartialEq + 'static,
{
    fn attach(&self, ctx: &MappingContext) -> Result<()> {
        self.target.set(None);
        *self.context.borrow_mut() = Some(ctx.clone());
        if let Err(err) = self.replace(self.source.get().as_ref(), ctx) {
            self.context.borrow_mut().take();
            return Err(err);
        }
        let role = self.this.clone();
        let subscription = self.source.subscribe(move |event| {
            let Some(role) = role.upgrade() else {
                return;
            };
            let Some(ctx) = role.context.borrow().clone() else {
                return;
            };
            if owner_detaching(&role.owner) {
                return;
            }
            if let Err(err) = role.replace(event.new_value.as_ref(), &ctx) {
                panic!("single child role could not replace its child: {err}");
            }
        });
        *self.subscription.borrow_mut() = Some(subscription);
        Ok(())
    }

    fn detach(&self) -> Result<()> {
        self.subscription.borrow_mut().take();
        let result = self.drop_child();
        self.context.borrow_mut().take();
        result
    }
}

/// A role holding zero or one child, mirroring an optional source property
/// into an optional target property.
///
/// # Panics
///
/// A source change whose new child fails to attach panics inside the
/// property's `set`.
pub struct SingleChildRole<SE, TE> {
    state: Rc<SingleRoleState<SE, TE>>,
}

impl<SE, TE> Clone for SingleChildRole<SE, TE> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<SE, TE> SingleChildRole<SE, TE> {
    #[must_use]
    pub fn child(&self) -> Option<Mapper<SE, TE>> {
        self.state.child.borrow().clone()
    }

    #[must_use]
    pub fn target(&self) -> &Property<Option<TE>> {
        &self.state.target
    }
}

impl<S: Identity + 'static, T: 'static> Mapper<S, T> {
    /// Declare a single-child role mirroring `source` into `target`.
    pub fn create_single_child_role<SE, TE>(
        &self,
        source: Property<Option<SE>>,
        target: Property<Option<TE>>,
        factory: impl Fn(&SE) -> Mapper<SE, TE> + 'static,
    ) -> SingleChildRole<SE, TE>
    where
        SE: Identity + Clone + PartialEq + 'static,
        TE: Clone + PartialEq + 'static,
    {
        let owner = self.owner_weak();
        let state = Rc::new_cyclic(|this| SingleRoleState {
            this: this.clone(),
            owner,
            source,
            target,
            factory: Box::new(factory),
            child: RefCell::new(None),
            context: RefCell::new(None),
            subscription: RefCell::new(None),
        });
        self.add_role(Role::new(RoleKind::Single, state.clone()));
        SingleChildRole { state }
    }
}
