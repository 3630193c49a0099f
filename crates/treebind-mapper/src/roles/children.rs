//! Child mappers mirrored index-for-index into a target list.

use std::cell::RefCell;
use std::rc::Weak;

use tracing::trace;
use treebind_model::{Identity, IdentityKey, ObservableList};

use super::{adopt, ensure_accepting, first_error, owner_detaching, release};
use crate::context::MappingContext;
use crate::error::Result;
use crate::mapper::{Mapper, MapperNode};

pub(crate) type Factory<SE, TE> = Box<dyn Fn(&SE) -> Mapper<SE, TE>>;

/// Children of a collection role and the target list holding their targets.
///
/// `mappers[i].target()` is always `target[i]`.
pub(crate) struct MappedChildren<SE, TE> {
    owner: Weak<dyn MapperNode>,
    target: ObservableList<TE>,
    factory: Factory<SE, TE>,
    mappers: RefCell<Vec<Mapper<SE, TE>>>,
}

impl<SE: Identity + 'static, TE: Clone + 'static> MappedChildren<SE, TE> {
    pub(crate) fn new(
        owner: Weak<dyn MapperNode>,
        target: ObservableList<TE>,
        factory: Factory<SE, TE>,
    ) -> Self {
        Self {
            owner,
            target,
            factory,
            mappers: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn target(&self) -> &ObservableList<TE> {
        &self.target
    }

    pub(crate) fn len(&self) -> usize {
        self.mappers.borrow().len()
    }

    pub(crate) fn mappers(&self) -> Vec<Mapper<SE, TE>> {
        self.mappers.borrow().clone()
    }

    pub(crate) fn owner_detaching(&self) -> bool {
        owner_detaching(&self.owner)
    }

    pub(crate) fn key_at(&self, index: usize) -> Option<IdentityKey> {
        self.mappers
            .borrow()
            .get(index)
            .map(|m| m.source().identity())
    }

    /// First child at or after `from` whose source has identity `key`.
    pub(crate) fn position_from(&self, key: IdentityKey, from: usize) -> Option<usize> {
        self.mappers
            .borrow()
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, m)| m.source().identity() == key)
            .map(|(index, _)| index)
    }

    /// Create, adopt, and attach a child for `source`, then publish its target.
    pub(crate) fn insert(&self, index: usize, source: &SE, ctx: &MappingContext) -> Result<()> {
        ensure_accepting(&self.owner)?;
        let child = (self.factory)(source);
        let node = child.erased();
        adopt(&self.owner, &node)?;
        self.mappers.borrow_mut().insert(index, child.clone());
        if let Err(err) = node.attach(ctx) {
            self.mappers.borrow_mut().remove(index);
            release(&node);
            return Err(err);
        }
        trace!(child = %node.id(), index, "child inserted");
        self.target.insert(index, child.target().clone());
        Ok(())
    }

    /// Detach and release the child at `index`, then drop its target.
    pub(crate) fn remove(&self, index: usize) -> Result<()> {
        let child = self.mappers.borrow_mut().remove(index);
        let node = child.erased();
        let result = node.detach();
        release(&node);
        self.target.remove_at(index);
        trace!(child = %node.id(), index, "child removed");
        result
    }

    /// Move an attached child without reattaching it.
    pub(crate) fn move_to(&self, from: usize, to: usize) {
        {
            let mut mappers = self.mappers.borrow_mut();
            let child = mappers.remove(from);
            mappers.insert(to, child);
        }
        let target = self.target.remove_at(from);
        self.target.insert(to, target);
    }

    /// Remove every child, last to first.
    pub(crate) fn clear(&self) -> Result<()> {
        let mut results = Vec::new();
        while let Some(last) = self.len().checked_sub(1) {
            results.push(self.remove(last));
        }
        first_error(results)
    }
}
