//! The binding unit: one source, one target, and owned child roles.
//!
//! # Lifecycle
//!
//! ```text
//! Detached ──attach──▶ Attaching ──▶ Attached ──detach──▶ Detaching ──▶ Detached
//! ```
//!
//! Attach registers the mapper (if findable), then attaches roles in
//! declaration order, which attaches children with the same context. Detach
//! runs the same steps backwards: roles in reverse declaration order, each
//! detaching its children last to first, then unregistration. The context
//! link is cleared last.
//!
//! # Invariants
//!
//! 1. A mapper holds a context exactly while it is not `Detached`.
//! 2. A findable mapper is registered exactly while it holds a context.
//! 3. A child is never `Attached` while its parent is `Detached`.
//! 4. A failed attach leaves no registry entry and no attached descendant.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Attach twice | `attach_root` on a non-detached mapper | `InvalidState`, nothing changes |
//! | Detach twice | `detach_root` on a non-attached mapper | `InvalidState`, nothing changes |
//! | Root call on a child | Mapper has a parent | `NotRoot` |
//! | Duplicate source | Another findable mapper owns the source | `DuplicateSource`, attach rolled back |

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};
use treebind_model::{Identity, IdentityKey};

use crate::context::MappingContext;
use crate::error::{MappingError, Result};
use crate::roles::{Role, RoleKind};

/// Global counter for unique mapper IDs.
static MAPPER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapperId(u64);

impl MapperId {
    fn next() -> Self {
        Self(MAPPER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mapper#{}", self.0)
    }
}

/// Lifecycle state of a mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapperState {
    Detached,
    Attaching,
    Attached,
    Detaching,
}

impl fmt::Display for MapperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Detached => "detached",
            Self::Attaching => "attaching",
            Self::Attached => "attached",
            Self::Detaching => "detaching",
        })
    }
}

/// Type-erased view of a mapper, used by roles and the registry.
pub(crate) trait MapperNode {
    fn id(&self) -> MapperId;
    fn source_key(&self) -> IdentityKey;
    fn is_findable(&self) -> bool;
    fn state(&self) -> MapperState;
    fn parent(&self) -> Option<MapperRef>;
    fn set_parent(&self, parent: Option<Weak<dyn MapperNode>>);
    fn type_name(&self) -> &'static str;
    fn attach(self: Rc<Self>, ctx: &MappingContext) -> Result<()>;
    fn detach(self: Rc<Self>) -> Result<()>;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

type AttachHook = Rc<dyn Fn(&MappingContext)>;
type DetachHook = Rc<dyn Fn()>;

struct MapperInner<S, T> {
    id: MapperId,
    source: S,
    target: T,
    findable: bool,
    state: Cell<MapperState>,
    context: RefCell<Option<MappingContext>>,
    parent: RefCell<Option<Weak<dyn MapperNode>>>,
    roles: RefCell<Vec<Role>>,
    on_attach: RefCell<Vec<AttachHook>>,
    on_detach: RefCell<Vec<DetachHook>>,
}

impl<S, T> MapperInner<S, T> {
    fn role_at(&self, index: usize) -> Option<Role> {
        self.roles.borrow().get(index).cloned()
    }

    fn reset(&self) {
        self.state.set(MapperState::Detached);
        self.context.borrow_mut().take();
    }

    /// Undo a partial attach: detach the first `attached` roles, unregister.
    fn roll_back(&self, attached: usize, ctx: &MappingContext, this: &MapperRef) {
        let roles: Vec<Role> = self.roles.borrow().iter().take(attached).cloned().collect();
        for role in roles.iter().rev() {
            if let Err(err) = role.detach() {
                warn!(mapper = %self.id, role = ?role.kind(), error = %err, "role detach failed during rollback");
            }
        }
        if self.findable {
            if let Err(err) = ctx.unregister(this) {
                warn!(mapper = %self.id, error = %err, "unregister failed during rollback");
            }
        }
        self.reset();
    }
}

impl<S: Identity + 'static, T: 'static> MapperNode for MapperInner<S, T> {
    fn id(&self) -> MapperId {
        self.id
    }

    fn source_key(&self) -> IdentityKey {
        self.source.identity()
    }

    fn is_findable(&self) -> bool {
        self.findable
    }

    fn state(&self) -> MapperState {
        self.state.get()
    }

    fn parent(&self) -> Option<MapperRef> {
        self.parent
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(MapperRef)
    }

    fn set_parent(&self, parent: Option<Weak<dyn MapperNode>>) {
        *self.parent.borrow_mut() = parent;
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Mapper<S, T>>()
    }

    fn attach(self: Rc<Self>, ctx: &MappingContext) -> Result<()> {
        let actual = self.state.get();
        if actual != MapperState::Detached {
            return Err(MappingError::invalid_state(
                self.id,
                MapperState::Detached,
                actual,
            ));
        }
        self.state.set(MapperState::Attaching);
        *self.context.borrow_mut() = Some(ctx.clone());

        let this = MapperRef(Rc::clone(&self) as Rc<dyn MapperNode>);
        if self.findable {
            if let Err(err) = ctx.register(&this) {
                self.reset();
                return Err(err);
            }
        }

        // Roles declared while attaching are appended and picked up here.
        let mut attached = 0;
        while let Some(role) = self.role_at(attached) {
            if let Err(err) = role.attach(ctx) {
                warn!(mapper = %self.id, role = ?role.kind(), error = %err, "attach failed, rolling back");
                self.roll_back(attached, ctx, &this);
                return Err(err);
            }
            attached += 1;
        }

        self.state.set(MapperState::Attached);
        debug!(
            mapper = %self.id,
            source = %self.source.identity(),
            roles = attached,
            "mapper attached"
        );
        let hooks = self.on_attach.borrow().clone();
        for hook in hooks {
            hook(ctx);
        }
        Ok(())
    }

    fn detach(self: Rc<Self>) -> Result<()> {
        let actual = self.state.get();
        if actual != MapperState::Attached {
            return Err(MappingError::invalid_state(
                self.id,
                MapperState::Attached,
                actual,
            ));
        }
        let hooks = self.on_detach.borrow().clone();
        for hook in hooks {
            hook();
        }
        self.state.set(MapperState::Detaching);

        let mut first_error = None;
        let roles: Vec<Role> = self.roles.borrow().clone();
        for role in roles.iter().rev() {
            if let Err(err) = role.detach() {
                warn!(mapper = %self.id, role = ?role.kind(), error = %err, "role detach failed");
                first_error.get_or_insert(err);
            }
        }

        let ctx = self.context.borrow().clone();
        if let (true, Some(ctx)) = (self.findable, ctx) {
            let this = MapperRef(Rc::clone(&self) as Rc<dyn MapperNode>);
            if let Err(err) = ctx.unregister(&this) {
                first_error.get_or_insert(err);
            }
        }
        self.reset();
        debug!(mapper = %self.id, "mapper detached");
        first_error.map_or(Ok(()), Err)
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Binds one source object to one target object.
///
/// `Mapper` is a shared handle; clones refer to the same mapper. Roles are
/// declared through the `create_*` and `sync_*` methods, typically right after
/// construction.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use treebind_mapper::Mapper;
/// use treebind_model::ObservableList;
///
/// let names = ObservableList::from_vec(vec![Rc::new("a".to_string())]);
/// let labels: ObservableList<String> = ObservableList::new();
///
/// let root = Mapper::new(Rc::new(()), ());
/// root.create_observable_role(names.clone(), labels.clone(), |name: &Rc<String>| {
///     Mapper::new(Rc::clone(name), name.to_uppercase())
/// });
///
/// root.attach_root().unwrap();
/// names.add(Rc::new("b".to_string()));
/// assert_eq!(labels.items(), vec!["A".to_string(), "B".to_string()]);
///
/// root.detach_root().unwrap();
/// assert!(labels.is_empty());
/// ```
pub struct Mapper<S, T> {
    inner: Rc<MapperInner<S, T>>,
}

impl<S, T> Clone for Mapper<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: Identity + 'static, T: 'static> Mapper<S, T> {
    /// Create a findable mapper.
    #[must_use]
    pub fn new(source: S, target: T) -> Self {
        Self::build(source, target, true)
    }

    /// Create a mapper that is never indexed in the context registry.
    ///
    /// It still attaches, detaches, and owns children like any other mapper.
    #[must_use]
    pub fn non_findable(source: S, target: T) -> Self {
        Self::build(source, target, false)
    }

    fn build(source: S, target: T, findable: bool) -> Self {
        Self {
            inner: Rc::new(MapperInner {
                id: MapperId::next(),
                source,
                target,
                findable,
                state: Cell::new(MapperState::Detached),
                context: RefCell::new(None),
                parent: RefCell::new(None),
                roles: RefCell::new(Vec::new()),
                on_attach: RefCell::new(Vec::new()),
                on_detach: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> MapperId {
        self.inner.id
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.inner.source
    }

    #[must_use]
    pub fn target(&self) -> &T {
        &self.inner.target
    }

    #[must_use]
    pub fn state(&self) -> MapperState {
        self.inner.state.get()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state() == MapperState::Attached
    }

    #[must_use]
    pub fn is_findable(&self) -> bool {
        self.inner.findable
    }

    /// The context this mapper is attached to.
    #[must_use]
    pub fn context(&self) -> Option<MappingContext> {
        self.inner.context.borrow().clone()
    }

    /// The mapper owning this one through a role.
    #[must_use]
    pub fn parent(&self) -> Option<MapperRef> {
        self.inner.parent()
    }

    /// Type-erased handle to this mapper.
    #[must_use]
    pub fn erased(&self) -> MapperRef {
        MapperRef(Rc::clone(&self.inner) as Rc<dyn MapperNode>)
    }

    /// Kinds of the declared roles, in declaration order.
    #[must_use]
    pub fn role_kinds(&self) -> Vec<RoleKind> {
        self.inner.roles.borrow().iter().map(Role::kind).collect()
    }

    /// Attach this mapper as the root of a tree with a fresh context.
    pub fn attach_root(&self) -> Result<()> {
        self.attach_root_with(&MappingContext::new())
    }

    /// Attach this mapper as a root of `ctx`, sharing it with other roots.
    pub fn attach_root_with(&self, ctx: &MappingContext) -> Result<()> {
        if self.inner.parent().is_some() {
            return Err(MappingError::NotRoot { mapper: self.id() });
        }
        Rc::clone(&self.inner).attach(ctx)
    }

    /// Detach this root and its whole tree.
    pub fn detach_root(&self) -> Result<()> {
        if self.inner.parent().is_some() {
            return Err(MappingError::NotRoot { mapper: self.id() });
        }
        Rc::clone(&self.inner).detach()
    }

    /// The findable mapper for `source`, if it is this mapper or one of its
    /// descendants. Always `None` while not attached.
    #[must_use]
    pub fn descendant_mapper<K: Identity + ?Sized>(&self, source: &K) -> Option<MapperRef> {
        if !self.is_attached() {
            return None;
        }
        let found = self.context()?.find_by_key(source.identity())?;
        let mut cursor = Some(found.clone());
        while let Some(node) = cursor {
            if node.id() == self.id() {
                return Some(found);
            }
            cursor = node.parent();
        }
        None
    }

    /// Typed variant of [`Mapper::descendant_mapper`].
    #[must_use]
    pub fn descendant<S2: Identity + 'static, T2: 'static>(
        &self,
        source: &S2,
    ) -> Option<Mapper<S2, T2>> {
        self.descendant_mapper(source)?.downcast()
    }

    /// Run `hook` at the end of every attach, once the mapper is `Attached`.
    pub fn on_attach(&self, hook: impl Fn(&MappingContext) + 'static) {
        self.inner.on_attach.borrow_mut().push(Rc::new(hook));
    }

    /// Run `hook` at the start of every detach, before any role detaches.
    pub fn on_detach(&self, hook: impl Fn() + 'static) {
        self.inner.on_detach.borrow_mut().push(Rc::new(hook));
    }

    pub(crate) fn owner_weak(&self) -> Weak<dyn MapperNode> {
        let node: Rc<dyn MapperNode> = Rc::clone(&self.inner) as Rc<dyn MapperNode>;
        Rc::downgrade(&node)
    }

    /// Declare a role. A role declared on an attached mapper attaches now.
    ///
    /// # Panics
    ///
    /// Panics if the mapper is attached and the new role fails to attach.
    pub(crate) fn add_role(&self, role: Role) {
        self.inner.roles.borrow_mut().push(role.clone());
        if self.state() != MapperState::Attached {
            return;
        }
        let Some(ctx) = self.context() else {
            return;
        };
        if let Err(err) = role.attach(&ctx) {
            self.inner.roles.borrow_mut().pop();
            panic!("{} could not attach a {:?} role: {err}", self.id(), role.kind());
        }
    }
}

impl<S, T> fmt::Debug for Mapper<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .field("findable", &self.inner.findable)
            .field("roles", &self.inner.roles.borrow().len())
            .finish()
    }
}

/// Type-erased, shared handle to a mapper of any source and target type.
///
/// Handles compare and hash by [`MapperId`].
#[derive(Clone)]
pub struct MapperRef(pub(crate) Rc<dyn MapperNode>);

impl MapperRef {
    #[must_use]
    pub fn id(&self) -> MapperId {
        self.0.id()
    }

    #[must_use]
    pub fn source_key(&self) -> IdentityKey {
        self.0.source_key()
    }

    #[must_use]
    pub fn state(&self) -> MapperState {
        self.0.state()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.0.state() == MapperState::Attached
    }

    #[must_use]
    pub fn is_findable(&self) -> bool {
        self.0.is_findable()
    }

    #[must_use]
    pub fn parent(&self) -> Option<MapperRef> {
        self.0.parent()
    }

    /// Full type name of the underlying `Mapper<S, T>`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Recover the typed handle, if the source and target types match.
    #[must_use]
    pub fn downcast<S: Identity + 'static, T: 'static>(&self) -> Option<Mapper<S, T>> {
        Rc::clone(&self.0)
            .into_any()
            .downcast::<MapperInner<S, T>>()
            .ok()
            .map(|inner| Mapper { inner })
    }

    /// Whether this handle refers to `mapper`.
    #[must_use]
    pub fn is<S, T>(&self, mapper: &Mapper<S, T>) -> bool {
        self.id() == mapper.inner.id
    }

    pub(crate) fn attach(&self, ctx: &MappingContext) -> Result<()> {
        Rc::clone(&self.0).attach(ctx)
    }

    pub(crate) fn detach(&self) -> Result<()> {
        Rc::clone(&self.0).detach()
    }

    pub(crate) fn set_parent(&self, parent: Option<Weak<dyn MapperNode>>) {
        self.0.set_parent(parent);
    }
}

impl PartialEq for MapperRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for MapperRef {}

impl Hash for MapperRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for MapperRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperRef")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("source", &self.source_key())
            .finish()
    }
}

impl<S: Identity + 'static, T: 'static> From<&Mapper<S, T>> for MapperRef {
    fn from(mapper: &Mapper<S, T>) -> Self {
        mapper.erased()
    }
}

impl<S: Identity + 'static, T: 'static> From<Mapper<S, T>> for MapperRef {
    fn from(mapper: Mapper<S, T>) -> Self {
        mapper.erased()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn leaf() -> Mapper<Rc<()>, ()> {
        Mapper::new(Rc::new(()), ())
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(leaf().id(), leaf().id());
    }

    #[test]
    fn attach_and_detach_root() {
        let m = leaf();
        m.attach_root().unwrap();
        assert!(m.is_attached());
        let ctx = m.context().unwrap();
        assert_eq!(ctx.len(), 1);

        m.detach_root().unwrap();
        assert_eq!(m.state(), MapperState::Detached);
        assert!(m.context().is_none());
        assert!(ctx.is_empty());
    }

    #[test]
    fn attach_twice_is_rejected() {
        let m = leaf();
        m.attach_root().unwrap();
        let err = m.attach_root().unwrap_err();
        assert_eq!(
            err,
            MappingError::InvalidState {
                mapper: m.id(),
                expected: MapperState::Detached,
                actual: MapperState::Attached,
            }
        );
        assert!(m.is_attached());
    }

    #[test]
    fn detach_detached_is_rejected() {
        let m = leaf();
        assert!(matches!(
            m.detach_root(),
            Err(MappingError::InvalidState { .. })
        ));
    }

    #[test]
    fn duplicate_root_in_shared_context() {
        let ctx = MappingContext::new();
        let source = Rc::new(());
        let a = Mapper::new(Rc::clone(&source), ());
        let b = Mapper::new(Rc::clone(&source), ());
        a.attach_root_with(&ctx).unwrap();

        assert!(matches!(
            b.attach_root_with(&ctx),
            Err(MappingError::DuplicateSource { .. })
        ));
        assert_eq!(b.state(), MapperState::Detached);
        assert!(b.context().is_none());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn non_findable_roots_may_share_source() {
        let ctx = MappingContext::new();
        let source = Rc::new(());
        let a = Mapper::non_findable(Rc::clone(&source), ());
        let b = Mapper::non_findable(Rc::clone(&source), ());
        a.attach_root_with(&ctx).unwrap();
        b.attach_root_with(&ctx).unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn downcast_recovers_typed_handle() {
        let m = Mapper::new(Rc::new(1u8), "target");
        let erased = m.erased();
        let typed: Mapper<Rc<u8>, &str> = erased.downcast().unwrap();
        assert_eq!(*typed.target(), "target");
        assert!(erased.downcast::<Rc<u8>, String>().is_none());
        assert!(erased.is(&m));
    }

    #[test]
    fn hooks_run_in_order() {
        let m = leaf();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let probe = m.clone();
        m.on_attach(move |_| l.borrow_mut().push(format!("attach {}", probe.state())));
        let l = Rc::clone(&log);
        let probe = m.clone();
        m.on_detach(move || l.borrow_mut().push(format!("detach {}", probe.state())));

        m.attach_root().unwrap();
        m.detach_root().unwrap();
        assert_eq!(*log.borrow(), vec!["attach attached", "detach attached"]);
    }

    #[test]
    fn findable_root_is_its_own_descendant() {
        let m = leaf();
        assert!(m.descendant_mapper(m.source()).is_none());
        m.attach_root().unwrap();
        assert!(m.descendant_mapper(m.source()).unwrap().is(&m));
        m.detach_root().unwrap();
        assert!(m.descendant_mapper(m.source()).is_none());
    }

    #[test]
    fn non_findable_root_is_not_found() {
        let m = Mapper::non_findable(Rc::new(()), ());
        m.attach_root().unwrap();
        assert!(m.descendant_mapper(m.source()).is_none());
        m.detach_root().unwrap();
    }

    #[test]
    fn error_messages_name_the_mapper() {
        let m = leaf();
        m.attach_root().unwrap();
        let message = m.attach_root().unwrap_err().to_string();
        assert_eq!(
            message,
            format!("mapper#{} is attached, expected detached", m.id().id())
        );
    }

    #[test]
    #[traced_test]
    fn transitions_are_logged() {
        let m = leaf();
        m.attach_root().unwrap();
        m.detach_root().unwrap();
        assert!(logs_contain("mapper attached"));
        assert!(logs_contain("mapper detached"));
    }
}
