//! Accessor-driven child role reconciled on demand.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};
use treebind_model::{Identity, IdentityKey, ObservableList};

use super::children::MappedChildren;
use super::{Role, RoleDriver, RoleKind};
use crate::context::MappingContext;
use crate::error::Result;
use crate::mapper::Mapper;

struct SimpleRoleState<SE, TE> {
    source: Box<dyn Fn() -> Vec<SE>>,
    children: MappedChildren<SE, TE>,
    context: RefCell<Option<MappingContext>>,
}

impl<SE: Identity + 'static, TE: Clone + 'static> SimpleRoleState<SE, TE> {
    /// Bring children and target in line with the accessor's current output.
    ///
    /// Children whose source is still present keep their mapper; they are
    /// moved rather than reattached.
    fn reconcile(&self, ctx: &MappingContext) -> Result<()> {
        let desired = (self.source)();
        let keys: Vec<IdentityKey> = desired.iter().map(Identity::identity).collect();

        let mut index = self.children.len();
        while index > 0 {
            index -= 1;
            let stale = self
                .children
                .key_at(index)
                .is_some_and(|key| !keys.contains(&key));
            if stale {
                self.children.remove(index)?;
            }
        }

        for (position, (source, key)) in desired.iter().zip(&keys).enumerate() {
            match self.children.position_from(*key, position) {
                Some(current) if current == position => {}
                Some(current) => self.children.move_to(current, position),
                None => self.children.insert(position, source, ctx)?,
            }
        }

        while self.children.len() > desired.len() {
            self.children.remove(self.children.len() - 1)?;
        }
        Ok(())
    }
}

impl<SE: Identity + 'static, TE: Clone + 'static> RoleDriver for SimpleRoleState<SE, TE> {
    fn attach(&self, ctx: &MappingContext) -> Result<()> {
        self.children.target().clear();
        *self.context.borrow_mut() = Some(ctx.clone());
        if let Err(err) = self.reconcile(ctx) {
            if let Err(cleanup) = self.children.clear() {
                warn!(error = %cleanup, "cleanup after failed simple role attach");
            }
            self.context.borrow_mut().take();
            return Err(err);
        }
        Ok(())
    }

    fn detach(&self) -> Result<()> {
        let result = self.children.clear();
        self.context.borrow_mut().take();
        result
    }
}

/// A child role whose membership is read from an accessor.
///
/// The role does not observe its source; call [`SimpleRole::refresh`] after
/// the source changes. Each child's target occupies the same index in the
/// target list as the child in the role.
pub struct SimpleRole<SE, TE> {
    state: Rc<SimpleRoleState<SE, TE>>,
}

impl<SE, TE> Clone for SimpleRole<SE, TE> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<SE: Identity + 'static, TE: Clone + 'static> SimpleRole<SE, TE> {
    /// Re-read the accessor and reconcile. Does nothing unless the owner is
    /// attached or attaching.
    pub fn refresh(&self) -> Result<()> {
        let ctx = self.state.context.borrow().clone();
        let Some(ctx) = ctx else {
            return Ok(());
        };
        if self.state.children.owner_detaching() {
            return Ok(());
        }
        self.state.reconcile(&ctx)?;
        debug!(children = self.state.children.len(), "simple role refreshed");
        Ok(())
    }

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
}

impl<S: Identity + 'static, T: 'static> Mapper<S, T> {
    /// Declare a role whose children mirror `source()` on each refresh.
    pub fn create_simple_role<SE, TE>(
        &self,
        source: impl Fn() -> Vec<SE> + 'static,
        target: ObservableList<TE>,
        factory: impl Fn(&SE) -> Mapper<SE, TE> + 'static,
    ) -> SimpleRole<SE, TE>
    where
        SE: Identity + 'static,
        TE: Clone + 'static,
    {
        let state = Rc::new(SimpleRoleState {
            source: Box::new(source),
            children: MappedChildren::new(self.owner_weak(), target, Box::new(factory)),
            context: RefCell::new(None),
        });
        self.add_role(Role::new(RoleKind::Simple, state.clone()));
        SimpleRole { state }
    }
}
