//! # Component — Ids, Registry, and Type-Erased Columns
//!
//! Three things live here:
//!
//! - [`ComponentId`], a packed 64-bit name for a component type, a tag type,
//!   or a component/relation pair.
//! - [`TypeRegistry`], the interning table that hands out those ids.
//! - [`DataBuffer`], a type-erased column of component values addressed by
//!   row index.
//!
//! ## Why an Interning Table?
//!
//! Archetypes, edges, and indexes all key on component ids, so the id must
//! be stable ("same type ⇒ same id") and collision-free. Hashing the type
//! name or reusing a language hash risks collisions; instead the registry
//! interns each Rust type the first time it is seen and assigns the next
//! counter value. The registry is owned by its [`World`](crate::world::World)
//! rather than sitting in a process-wide static, so independent worlds and
//! tests never leak ids into each other.
//!
//! ## Id Layout
//!
//! ```text
//! | key: 32 | relation: 32 |
//!   63    32  31          0
//! ```
//!
//! `relation` is zero for plain components and tags. For a relationship
//! between two types, the low half carries the relation type's key. A tag
//! interns under a different key than the same Rust type used as a data
//! component, so an archetype signature can be a single flat id list.
//!
//! ## Why `Box<dyn Any>` Columns?
//!
//! Archetypes hold a *dynamic* set of component types, so a column cannot be
//! a `Vec<T>`. The classic approach (hecs, bevy_ecs) stores raw bytes with
//! manual layout management — fast but all `unsafe`. [`DataBuffer`] stores
//! `Option<Box<dyn Any>>` slots instead: every access is checked, migration
//! is a pointer move, and there is zero unsafe code to audit. Slots are
//! `Option` because rows are pool-recycled: destroying an entity vacates its
//! mapping but intentionally leaves the column slot untouched until reuse.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

const KEY_SHIFT: u32 = 32;
const RELATION_MASK: u64 = 0xFFFF_FFFF;

/// Packed 64-bit identifier for a component type, tag type, or
/// component/relation pair.
///
/// Equality and hashing are by raw value, so ids are directly usable as map
/// keys. Obtained from a [`TypeRegistry`]; within one registry the same
/// logical type always produces the same id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    pub(crate) fn from_key(key: u32) -> Self {
        Self(u64::from(key) << KEY_SHIFT)
    }

    /// The interned type key (high 32 bits).
    pub fn key(self) -> u32 {
        (self.0 >> KEY_SHIFT) as u32
    }

    /// The relation key (low 32 bits); zero for plain components and tags.
    pub fn relation(self) -> u32 {
        (self.0 & RELATION_MASK) as u32
    }

    /// Build the id naming a relationship between a component type and a
    /// relation type, e.g. `ChildOf` pointing at a parent marker.
    pub fn pair(component: ComponentId, relation: ComponentId) -> Self {
        Self((u64::from(component.key()) << KEY_SHIFT) | u64::from(relation.key()))
    }

    /// Whether this id names a component/relation pair.
    pub fn is_pair(self) -> bool {
        self.relation() != 0
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pair() {
            write!(f, "ComponentId({}@{})", self.key(), self.relation())
        } else {
            write!(f, "ComponentId({})", self.key())
        }
    }
}

/// How a registered type participates in an archetype signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ComponentKind {
    /// Carries a value; the archetype allocates a column for it.
    Data,
    /// Presence-only marker; part of the signature, no column.
    Tag,
}

struct TypeInfo {
    name: &'static str,
    kind: ComponentKind,
}

/// Interning table mapping Rust types to stable [`ComponentId`]s.
///
/// Populated lazily the first time a type is seen. Keys start at 1 so a
/// relation field of zero always means "no relation".
pub struct TypeRegistry {
    keys: HashMap<(TypeId, ComponentKind), u32>,
    infos: Vec<TypeInfo>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            infos: Vec::new(),
        }
    }

    /// Intern `T` as a data component and return its id. Idempotent.
    pub fn register<T: 'static>(&mut self) -> ComponentId {
        self.intern(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            ComponentKind::Data,
        )
    }

    /// Intern `T` as a tag and return its id. Idempotent.
    ///
    /// The same Rust type may be registered both ways; the two ids are
    /// distinct, so "has the value" and "has the marker" are independent
    /// structural facts.
    pub fn register_tag<T: 'static>(&mut self) -> ComponentId {
        self.intern(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            ComponentKind::Tag,
        )
    }

    fn intern(&mut self, type_id: TypeId, name: &'static str, kind: ComponentKind) -> ComponentId {
        if let Some(&key) = self.keys.get(&(type_id, kind)) {
            return ComponentId::from_key(key);
        }
        let key = (self.infos.len() + 1) as u32;
        self.keys.insert((type_id, kind), key);
        self.infos.push(TypeInfo { name, kind });
        ComponentId::from_key(key)
    }

    /// The id of `T` as a data component, if it was ever registered here.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentId> {
        self.keys
            .get(&(TypeId::of::<T>(), ComponentKind::Data))
            .map(|&key| ComponentId::from_key(key))
    }

    /// The id of `T` as a tag, if it was ever registered here.
    pub fn lookup_tag<T: 'static>(&self) -> Option<ComponentId> {
        self.keys
            .get(&(TypeId::of::<T>(), ComponentKind::Tag))
            .map(|&key| ComponentId::from_key(key))
    }

    /// The kind an id was registered under.
    ///
    /// Pairs report the kind of their component half.
    pub fn kind(&self, id: ComponentId) -> ComponentKind {
        self.info(id.key()).map_or(ComponentKind::Data, |i| i.kind)
    }

    /// Short human-readable name for an id, for diagnostics.
    pub fn describe(&self, id: ComponentId) -> String {
        let name = |key: u32| {
            self.info(key)
                .map(|i| short_type_name(i.name))
                .unwrap_or("?")
        };
        if self.kind(id) == ComponentKind::Tag {
            format!("#{}", name(id.key()))
        } else if id.is_pair() {
            format!("{}@{}", name(id.key()), name(id.relation()))
        } else {
            name(id.key()).to_string()
        }
    }

    /// Number of interned type keys.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    fn info(&self, key: u32) -> Option<&TypeInfo> {
        if key == 0 {
            return None;
        }
        self.infos.get(key as usize - 1)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip the module path from a fully-qualified type name
/// (`ormr::math::Position` → `Position`).
fn short_type_name(full: &'static str) -> &'static str {
    full.rsplit("::").next().unwrap_or(full)
}

/// A type-erased, growable column of component values for one component
/// type, addressed by row index.
///
/// Opaque outside the crate: users reach component data through
/// [`World`](crate::world::World) and [`Query`](crate::query::Query)
/// methods. Rows are allocated and recycled by the owning archetype's row
/// pool; the buffer itself only grows, never shrinks, and a vacated slot
/// keeps its last value until the row id is reused.
pub struct DataBuffer {
    slots: Vec<Option<Box<dyn Any + Send + Sync>>>,
}

impl DataBuffer {
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new() }
    }

    fn grow_to(&mut self, row: u32) {
        let needed = row as usize + 1;
        if self.slots.len() < needed {
            self.slots.resize_with(needed, || None);
        }
    }

    /// Write a value at `row`, growing the column as needed.
    pub(crate) fn set<T: 'static + Send + Sync>(&mut self, row: u32, value: T) {
        self.grow_to(row);
        self.slots[row as usize] = Some(Box::new(value));
    }

    /// Shared reference to the value at `row`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is vacant or holds a different type.
    pub(crate) fn get<T: 'static>(&self, row: u32) -> &T {
        self.slots
            .get(row as usize)
            .and_then(|slot| slot.as_ref())
            .unwrap_or_else(|| {
                panic!(
                    "row {} is vacant in `{}` column",
                    row,
                    std::any::type_name::<T>()
                )
            })
            .downcast_ref()
            .unwrap_or_else(|| {
                panic!(
                    "component type mismatch: expected `{}` in column",
                    std::any::type_name::<T>()
                )
            })
    }

    /// Mutable reference to the value at `row`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is vacant or holds a different type.
    pub(crate) fn get_mut<T: 'static>(&mut self, row: u32) -> &mut T {
        self.slots
            .get_mut(row as usize)
            .and_then(|slot| slot.as_mut())
            .unwrap_or_else(|| {
                panic!(
                    "row {} is vacant in `{}` column",
                    row,
                    std::any::type_name::<T>()
                )
            })
            .downcast_mut()
            .unwrap_or_else(|| {
                panic!(
                    "component type mismatch: expected `{}` in column",
                    std::any::type_name::<T>()
                )
            })
    }

    /// Non-panicking variant of [`get`](Self::get).
    pub(crate) fn try_get<T: 'static>(&self, row: u32) -> Option<&T> {
        self.slots
            .get(row as usize)
            .and_then(|slot| slot.as_ref())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Non-panicking variant of [`get_mut`](Self::get_mut).
    pub(crate) fn try_get_mut<T: 'static>(&mut self, row: u32) -> Option<&mut T> {
        self.slots
            .get_mut(row as usize)
            .and_then(|slot| slot.as_mut())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Take the boxed value at `row`, leaving the slot vacant. Used when
    /// moving a row between archetypes.
    pub(crate) fn take(&mut self, row: u32) -> Option<Box<dyn Any + Send + Sync>> {
        self.slots.get_mut(row as usize).and_then(|slot| slot.take())
    }

    /// Place a boxed value at `row`, growing the column as needed.
    pub(crate) fn put(&mut self, row: u32, value: Box<dyn Any + Send + Sync>) {
        self.grow_to(row);
        self.slots[row as usize] = Some(value);
    }

    /// Move the value at `row` into `dest` at `dest_row`. A vacant source
    /// slot moves nothing.
    pub(crate) fn move_to(&mut self, row: u32, dest: &mut DataBuffer, dest_row: u32) {
        if let Some(value) = self.take(row) {
            dest.put(dest_row, value);
        }
    }

    /// Number of slots (occupied or vacant) the column has grown to.
    #[cfg(any(feature = "diagnostics", test))]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position {
        x: f32,
    }
    struct Frozen;

    #[test]
    fn same_type_same_id() {
        let mut registry = TypeRegistry::new();
        let a = registry.register::<Position>();
        let b = registry.register::<Position>();
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_types_distinct_ids() {
        let mut registry = TypeRegistry::new();
        let a = registry.register::<Position>();
        let b = registry.register::<f32>();
        assert_ne!(a, b);
    }

    #[test]
    fn tag_and_component_ids_differ() {
        let mut registry = TypeRegistry::new();
        let data = registry.register::<Frozen>();
        let tag = registry.register_tag::<Frozen>();
        assert_ne!(data, tag);
        assert_eq!(registry.kind(data), ComponentKind::Data);
        assert_eq!(registry.kind(tag), ComponentKind::Tag);
    }

    #[test]
    fn lookup_without_registration() {
        let registry = TypeRegistry::new();
        assert!(registry.lookup::<Position>().is_none());
        assert!(registry.lookup_tag::<Position>().is_none());
    }

    #[test]
    fn pair_packs_both_keys() {
        let mut registry = TypeRegistry::new();
        let child_of = registry.register::<Position>();
        let parent = registry.register::<Frozen>();
        let pair = ComponentId::pair(child_of, parent);
        assert_eq!(pair.key(), child_of.key());
        assert_eq!(pair.relation(), parent.key());
        assert!(pair.is_pair());
        assert!(!child_of.is_pair());
    }

    #[test]
    fn describe_uses_short_names() {
        let mut registry = TypeRegistry::new();
        let id = registry.register::<Position>();
        let tag = registry.register_tag::<Frozen>();
        assert_eq!(registry.describe(id), "Position");
        assert_eq!(registry.describe(tag), "#Frozen");
    }

    #[test]
    fn buffer_set_and_get() {
        let mut buffer = DataBuffer::new();
        buffer.set(0, 1.0f32);
        buffer.set(2, 3.0f32); // row 1 stays vacant
        assert_eq!(*buffer.get::<f32>(0), 1.0);
        assert_eq!(*buffer.get::<f32>(2), 3.0);
        assert!(buffer.try_get::<f32>(1).is_none());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn buffer_mutate_in_place() {
        let mut buffer = DataBuffer::new();
        buffer.set(0, 10u32);
        *buffer.get_mut::<u32>(0) = 99;
        assert_eq!(*buffer.get::<u32>(0), 99);
    }

    #[test]
    #[should_panic(expected = "vacant")]
    fn buffer_get_vacant_panics() {
        let buffer = DataBuffer::new();
        buffer.get::<u32>(0);
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn buffer_get_wrong_type_panics() {
        let mut buffer = DataBuffer::new();
        buffer.set(0, 10u32);
        buffer.get::<f32>(0);
    }

    #[test]
    fn buffer_move_between_columns() {
        let mut src = DataBuffer::new();
        let mut dest = DataBuffer::new();
        src.set(3, 42u64);
        src.move_to(3, &mut dest, 0);
        assert_eq!(*dest.get::<u64>(0), 42);
        assert!(src.try_get::<u64>(3).is_none()); // source slot vacated
    }

    #[test]
    fn buffer_drops_replaced_value() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct Tracked;
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROP_COUNT.store(0, Ordering::SeqCst);
        let mut buffer = DataBuffer::new();
        buffer.set(0, Tracked);
        buffer.set(0, Tracked); // replaces, dropping the first
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);
        drop(buffer);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 2);
    }
}
