//! End-to-end tests over an item tree mapped into a mirror tree.
//!
//! Every role kind is exercised at once: the name is a property sync,
//! observable children track a list live, plain children are refreshed on
//! demand, transformed children go through a mapped role, and the single
//! child follows an optional property.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use treebind_mapper::{
    ChildSet, Mapper, MapperRef, MapperState, MappingContext, MappingContextListener, SimpleRole,
};
use treebind_model::{Identity, IdentityKey, ObservableList, Property};

// ── Fixture ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct ItemData {
    name: Property<String>,
    observable_children: ObservableList<Item>,
    children: ObservableList<Item>,
    transformed_children: ObservableList<Item>,
    single_child: Property<Option<Item>>,
}

#[derive(Clone, Default)]
struct Item(Rc<ItemData>);

impl Item {
    fn named(name: &str) -> Self {
        let item = Self::default();
        item.0.name.set(name.to_string());
        item
    }
}

impl Identity for Item {
    fn identity(&self) -> IdentityKey {
        self.0.identity()
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item({:?})", self.0.name.get())
    }
}

fn lists_equal(a: &ObservableList<Item>, b: &ObservableList<Item>) -> bool {
    let (a, b) = (a.items(), b.items());
    a.len() == b.len() && a.iter().zip(&b).all(|(l, r)| content_equals(l, r))
}

fn content_equals(a: &Item, b: &Item) -> bool {
    let singles_equal = match (a.0.single_child.get(), b.0.single_child.get()) {
        (None, None) => true,
        (Some(l), Some(r)) => content_equals(&l, &r),
        _ => false,
    };
    a.0.name.get() == b.0.name.get()
        && lists_equal(&a.0.observable_children, &b.0.observable_children)
        && lists_equal(&a.0.children, &b.0.children)
        && lists_equal(&a.0.transformed_children, &b.0.transformed_children)
        && singles_equal
}

/// Mapper for one item plus a handle on its refresh-driven role.
///
/// Children reached through the simple and mapped roles share sources with
/// the observable role, so they are built non-findable.
struct ItemMapper {
    mapper: Mapper<Item, Item>,
    simple: SimpleRole<Item, Item>,
}

impl ItemMapper {
    fn new(source: &Item, findable: bool) -> Self {
        let target = Item::default();
        let mapper = if findable {
            Mapper::new(source.clone(), target.clone())
        } else {
            Mapper::non_findable(source.clone(), target.clone())
        };
        let (s, t) = (&source.0, &target.0);

        mapper.sync_one_way(&s.name, &t.name);
        mapper.create_observable_role(
            s.observable_children.clone(),
            t.observable_children.clone(),
            move |child: &Item| Self::new(child, findable).mapper,
        );
        let children = s.children.clone();
        let simple = mapper.create_simple_role(
            move || children.items(),
            t.children.clone(),
            |child: &Item| Self::new(child, false).mapper,
        );
        mapper.create_mapped_role(
            s.transformed_children.clone(),
            Item::clone,
            Item::clone,
            t.transformed_children.clone(),
            |child: &Item| Self::new(child, false).mapper,
        );
        mapper.create_single_child_role(
            s.single_child.clone(),
            t.single_child.clone(),
            move |child: &Item| Self::new(child, findable).mapper,
        );
        Self { mapper, simple }
    }
}

struct Fixture {
    source: Item,
    root: ItemMapper,
}

impl Fixture {
    fn new() -> Self {
        let source = Item::named("xyz");
        for i in 0..3 {
            let child = Item::named(&format!("child{i}"));
            source.0.observable_children.add(child.clone());
            source.0.children.add(child.clone());
            source.0.transformed_children.add(child);
        }
        let root = ItemMapper::new(&source, true);
        root.mapper.attach_root().unwrap();
        Self { source, root }
    }

    fn target(&self) -> &Item {
        self.root.mapper.target()
    }

    fn assert_mapped(&self) {
        assert!(
            content_equals(&self.source, self.target()),
            "{:?} is not mirrored by {:?}",
            self.source,
            self.target()
        );
    }
}

/// Root mapper with a child set, for membership churn.
struct Churn {
    mapper: Mapper<Rc<()>, ()>,
    children: ChildSet,
    child: RefCell<Option<Mapper<Rc<()>, ()>>>,
}

impl Churn {
    fn new() -> Self {
        let mapper = Mapper::new(Rc::new(()), ());
        let children = mapper.create_child_set();
        Self {
            mapper,
            children,
            child: RefCell::new(None),
        }
    }

    fn attach_child(&self) -> Mapper<Rc<()>, ()> {
        let child = Mapper::new(Rc::new(()), ());
        assert_eq!(self.children.add(&child), Ok(true));
        *self.child.borrow_mut() = Some(child.clone());
        child
    }

    fn detach_child(&self) {
        if let Some(child) = self.child.borrow_mut().take() {
            assert_eq!(self.children.remove(&child.erased()), Ok(true));
        }
    }

    fn detach_children(&self) {
        self.children.clear().unwrap();
        self.child.borrow_mut().take();
    }

    /// `current` is the only child, attached and registered; `old` is gone.
    fn assert_replaced(&self, old: &Mapper<Rc<()>, ()>, current: &Mapper<Rc<()>, ()>) {
        let ctx = self.mapper.context().unwrap();
        assert_eq!(self.children.items(), vec![current.erased()]);
        assert!(current.is_attached());
        assert!(self.mapper.descendant_mapper(current.source()).unwrap().is(current));

        assert_eq!(ctx.len(), 2);
        assert_eq!(old.state(), MapperState::Detached);
        assert!(old.parent().is_none());
        assert!(!ctx.contains(old.source()));
        assert!(self.mapper.descendant_mapper(old.source()).is_none());
    }
}

// ── Tree mirroring ──────────────────────────────────────────────────────

#[test]
fn initial_mapping() {
    Fixture::new().assert_mapped();
}

#[test]
fn property_change() {
    let f = Fixture::new();
    f.source.0.name.set("abc".into());
    assert_eq!(f.target().0.name.get(), "abc");
    f.assert_mapped();
}

#[test]
fn child_property_change() {
    let f = Fixture::new();
    let child = f.source.0.observable_children.get(1).unwrap();
    child.0.name.set("renamed".into());
    f.assert_mapped();
}

#[test]
fn remove_item_from_observable() {
    let f = Fixture::new();
    f.source.0.observable_children.remove_at(0);
    f.assert_mapped();
}

#[test]
fn add_item_to_observable() {
    let f = Fixture::new();
    f.source.0.observable_children.insert(0, Item::named("new"));
    f.assert_mapped();
}

#[test]
fn remove_item_from_simple() {
    let f = Fixture::new();
    f.source.0.children.remove_at(0);
    f.root.simple.refresh().unwrap();
    f.assert_mapped();
}

#[test]
fn add_item_to_simple() {
    let f = Fixture::new();
    f.source.0.children.add(Item::named("new"));
    f.root.simple.refresh().unwrap();
    f.assert_mapped();
}

#[test]
fn simple_role_is_stale_until_refresh() {
    let f = Fixture::new();
    f.source.0.children.remove_at(0);
    assert_eq!(f.target().0.children.len(), 3);
    f.root.simple.refresh().unwrap();
    assert_eq!(f.target().0.children.len(), 2);
}

#[test]
fn add_and_remove_transformed() {
    let f = Fixture::new();
    f.source.0.transformed_children.add(Item::named("t"));
    f.source.0.transformed_children.remove_at(1);
    f.assert_mapped();
}

#[test]
fn single_child_set() {
    let f = Fixture::new();
    f.source.0.single_child.set(Some(Item::named("single")));
    f.assert_mapped();
}

#[test]
fn single_child_set_to_none() {
    let f = Fixture::new();
    f.source.0.single_child.set(Some(Item::named("single")));
    f.source.0.single_child.set(None);
    f.assert_mapped();
}

#[test]
fn nested_observable_children() {
    let f = Fixture::new();
    let child = f.source.0.observable_children.get(0).unwrap();
    let grandchild = Item::named("grandchild");
    child.0.observable_children.add(grandchild.clone());
    f.assert_mapped();

    let found = f.root.mapper.descendant::<Item, Item>(&grandchild).unwrap();
    assert_eq!(found.target().0.name.get(), "grandchild");
}

#[test]
fn roles_are_cleaned_on_detach() {
    let f = Fixture::new();
    f.source.0.single_child.set(Some(Item::named("single")));
    let target = f.target().clone();
    assert!(!target.0.observable_children.is_empty());
    assert!(!target.0.children.is_empty());
    assert!(!target.0.transformed_children.is_empty());
    assert!(target.0.single_child.get().is_some());

    f.root.mapper.detach_root().unwrap();

    assert!(target.0.observable_children.is_empty());
    assert!(target.0.children.is_empty());
    assert!(target.0.transformed_children.is_empty());
    assert!(target.0.single_child.get().is_none());
}

#[test]
fn detach_then_reattach_mirrors_again() {
    let f = Fixture::new();
    f.root.mapper.detach_root().unwrap();
    f.source.0.observable_children.add(Item::named("late"));
    f.root.mapper.attach_root().unwrap();
    f.assert_mapped();
}

#[test]
fn detach_unregisters_everything() {
    let f = Fixture::new();
    let ctx = f.root.mapper.context().unwrap();
    // Root plus three findable observable children.
    assert_eq!(ctx.len(), 4);
    f.root.mapper.detach_root().unwrap();
    assert!(ctx.is_empty());
}

// ── Membership churn ────────────────────────────────────────────────────

#[test]
fn remove_then_add_child_then_detach() {
    let m = Churn::new();
    m.mapper.attach_root().unwrap();

    let old = m.attach_child();
    m.detach_child();
    let current = m.attach_child();
    m.assert_replaced(&old, &current);

    let ctx = m.mapper.context().unwrap();
    m.mapper.detach_root().unwrap();
    assert!(m.children.is_empty());
    assert!(ctx.is_empty());
    assert_eq!(current.state(), MapperState::Detached);
}

#[test]
fn clear_then_add_child_then_detach() {
    let m = Churn::new();
    m.mapper.attach_root().unwrap();

    let old = m.attach_child();
    m.detach_children();
    let current = m.attach_child();
    m.assert_replaced(&old, &current);

    let ctx = m.mapper.context().unwrap();
    m.mapper.detach_root().unwrap();
    assert!(m.children.is_empty());
    assert!(ctx.is_empty());
    assert_eq!(current.state(), MapperState::Detached);
}

#[test]
fn removed_child_can_join_again() {
    let m = Churn::new();
    m.mapper.attach_root().unwrap();
    let child = Mapper::new(Rc::new(()), ());

    m.children.add(&child).unwrap();
    m.children.remove(&child.erased()).unwrap();
    assert_eq!(child.state(), MapperState::Detached);
    m.children.add(&child).unwrap();
    assert!(child.is_attached());

    m.mapper.detach_root().unwrap();
    assert_eq!(child.state(), MapperState::Detached);
}

// ── Findability ─────────────────────────────────────────────────────────

#[test]
fn findable_root() {
    let source = Rc::new(());
    let m = Mapper::new(Rc::clone(&source), ());
    m.attach_root().unwrap();
    assert!(m.descendant_mapper(&source).unwrap().is(&m));
    m.detach_root().unwrap();
}

#[test]
fn non_findable_root() {
    let source = Rc::new(());
    let m = Mapper::non_findable(Rc::clone(&source), ());
    m.attach_root().unwrap();
    assert!(m.descendant_mapper(&source).is_none());
    m.detach_root().unwrap();
}

#[test]
fn sibling_tree_is_not_a_descendant() {
    let ctx = MappingContext::new();
    let a = Mapper::new(Rc::new(()), ());
    let b = Mapper::new(Rc::new(()), ());
    a.attach_root_with(&ctx).unwrap();
    b.attach_root_with(&ctx).unwrap();

    assert!(ctx.find(b.source()).is_some());
    assert!(a.descendant_mapper(b.source()).is_none());
}

// ── Context listeners ───────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    registered: RefCell<Vec<MapperRef>>,
    unregistered: RefCell<Vec<MapperRef>>,
}

impl MappingContextListener for Recorder {
    fn on_mapper_registered(&self, mapper: &MapperRef) {
        self.registered.borrow_mut().push(mapper.clone());
    }

    fn on_mapper_unregistered(&self, mapper: &MapperRef) {
        self.unregistered.borrow_mut().push(mapper.clone());
    }
}

#[test]
fn mapping_context_listeners() {
    let recorder = Rc::new(Recorder::default());
    let ctx = MappingContext::new();
    ctx.add_listener(recorder.clone());

    let m = Churn::new();
    m.mapper.attach_root_with(&ctx).unwrap();
    m.mapper.detach_root().unwrap();

    let root = m.mapper.erased();
    assert_eq!(*recorder.registered.borrow(), vec![root.clone()]);
    assert_eq!(*recorder.unregistered.borrow(), vec![root]);
}
