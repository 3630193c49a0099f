//! Property synchronizations scoped to a mapper's attached lifetime.
//!
//! # Invariants
//!
//! 1. A sync holds its subscriptions exactly while the owning mapper is
//!    attached; detaching drops them and later source changes are ignored.
//! 2. Every attach writes the current source value into the target before
//!    subscribing.
//! 3. Two-way syncs use a shared re-entrancy guard, so a change bounces back
//!    at most once.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use treebind_model::{Identity, Property, Subscription};

use super::{Role, RoleDriver, RoleKind};
use crate::context::MappingContext;
use crate::error::Result;
use crate::mapper::Mapper;

struct PropertySync {
    install: Box<dyn Fn() -> Subscription>,
    active: RefCell<Option<Subscription>>,
}

impl RoleDriver for PropertySync {
    fn attach(&self, _ctx: &MappingContext) -> Result<()> {
        *self.active.borrow_mut() = Some((self.install)());
        Ok(())
    }

    fn detach(&self) -> Result<()> {
        self.active.borrow_mut().take();
        Ok(())
    }
}

impl<S: Identity + 'static, T: 'static> Mapper<S, T> {
    fn add_property_sync(&self, install: impl Fn() -> Subscription + 'static) {
        let sync = PropertySync {
            install: Box::new(install),
            active: RefCell::new(None),
        };
        self.add_role(Role::new(RoleKind::Property, Rc::new(sync)));
    }

    /// Copy `source` into `target` whenever it changes while attached.
    pub fn sync_one_way<V: Clone + PartialEq + 'static>(
        &self,
        source: &Property<V>,
        target: &Property<V>,
    ) {
        self.sync_mapped(source, target, V::clone);
    }

    /// Write `map(source)` into `target` whenever `source` changes while
    /// attached.
    pub fn sync_mapped<A, B>(
        &self,
        source: &Property<A>,
        target: &Property<B>,
        map: impl Fn(&A) -> B + 'static,
    ) where
        A: Clone + PartialEq + 'static,
        B: Clone + PartialEq + 'static,
    {
        let source = source.clone();
        let target = target.clone();
        let map = Rc::new(map);
        self.add_property_sync(move || {
            target.set(source.with(|value| map(value)));
            let target = target.clone();
            let map = Rc::clone(&map);
            source.subscribe(move |event| target.set(map(&event.new_value)))
        });
    }

    /// Keep `a` and `b` equal while attached. `b` takes `a`'s value on
    /// attach.
    pub fn sync_two_way<V: Clone + PartialEq + 'static>(&self, a: &Property<V>, b: &Property<V>) {
        let a = a.clone();
        let b = b.clone();
        self.add_property_sync(move || {
            b.set(a.get());
            let syncing = Rc::new(Cell::new(false));

            let b_clone = b.clone();
            let guard_ab = Rc::clone(&syncing);
            let sub_ab = a.subscribe(move |event| {
                if !guard_ab.get() {
                    guard_ab.set(true);
                    b_clone.set(event.new_value.clone());
                    guard_ab.set(false);
                }
            });

            let a_clone = a.clone();
            let guard_ba = Rc::clone(&syncing);
            let sub_ba = b.subscribe(move |event| {
                if !guard_ba.get() {
                    guard_ba.set(true);
                    a_clone.set(event.new_value.clone());
                    guard_ba.set(false);
                }
            });

            Subscription::merge(vec![sub_ab, sub_ba])
        });
    }
}
