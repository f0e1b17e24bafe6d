//! # Archetype — Grouping Entities by Structural Signature
//!
//! An archetype holds every entity that has exactly the same set of
//! component types and tag types. All entities in an archetype share one
//! [`DataBuffer`] column per component type, so iterating an archetype is a
//! straight walk over columnar storage.
//!
//! ## Memory Layout
//!
//! ```text
//! Archetype 3 { signature: [Position, Velocity, #Frozen] }
//!
//! columns:
//!   Position: [p0, p1, __, p3]   ← one DataBuffer per data component
//!   Velocity: [v0, v1, __, v3]   ← row 2 vacant (recycled slot)
//! row_index:  { 7v0 → 0, 9v0 → 1, 4v1 → 3 }
//! edges:      { Velocity → {add: 5, remove: 1}, ... }
//! ```
//!
//! Rows are allocated from a per-archetype pool and recycled on destroy, so
//! a row number stays stable for as long as the entity stays in the
//! archetype — there is no swap-remove compaction and no row reshuffling
//! behind the caller's back.
//!
//! ## The Archetype Graph
//!
//! `edges` is the adjacency list of the archetype graph: for a component id
//! `C`, `edges[C].add` names the archetype an entity moves to when `C` is
//! added here, and `edges[C].remove` the one it moves to when `C` is
//! removed. Edges are written by the [`World`](crate::world::World) the
//! first time a transition actually happens, so the graph records traversed
//! transitions, not all conceivable ones.
//!
//! ## Comparison
//!
//! - **hecs**: stores dense rows and swap-removes on despawn; no edge cache.
//! - **bevy_ecs**: caches add/remove transition targets per bundle on each
//!   archetype — the same idea as `edges` here, keyed per component.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::component::{ComponentId, ComponentKind, DataBuffer, TypeRegistry};
use crate::entity::EntityId;
use crate::pool::IndexPool;

/// Dense index of an archetype in its world's arena. Archetypes are created
/// lazily and never destroyed, so ids are stable for the world's lifetime.
pub type ArchetypeId = u32;

/// Canonical, order-independent key over a set of component and tag ids.
///
/// Two archetypes are the same archetype **iff** their signatures are equal;
/// the world deduplicates archetypes through a `Signature → ArchetypeId`
/// map. Internally a sorted, deduplicated id list, so `[A, B]` and `[B, A]`
/// produce the same key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Signature(Vec<ComponentId>);

impl Signature {
    /// Canonicalize an id list (sorts and deduplicates).
    pub fn new(mut ids: Vec<ComponentId>) -> Self {
        ids.sort();
        ids.dedup();
        Self(ids)
    }

    /// The signature of the empty archetype.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// The sorted id list.
    pub fn as_slice(&self) -> &[ComponentId] {
        &self.0
    }

    /// Whether `id` is part of this signature.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    /// Whether every id in `ids` is part of this signature.
    pub fn is_superset_of(&self, ids: &[ComponentId]) -> bool {
        ids.iter().all(|&id| self.contains(id))
    }

    /// This signature plus `id` (set union).
    pub fn with(&self, id: ComponentId) -> Signature {
        let mut ids = self.0.clone();
        ids.push(id);
        Signature::new(ids)
    }

    /// This signature minus `id` (set difference).
    pub fn without(&self, id: ComponentId) -> Signature {
        Signature(self.0.iter().copied().filter(|&c| c != id).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The two transition targets an archetype records per component id.
#[derive(Clone, Copy, Default, Debug)]
pub struct ArchetypeEdge {
    /// Archetype an entity moves to when the component is added here.
    pub add: Option<ArchetypeId>,
    /// Archetype an entity moves to when the component is removed here.
    pub remove: Option<ArchetypeId>,
}

/// A table of entities sharing one structural signature.
pub struct Archetype {
    id: ArchetypeId,
    signature: Signature,
    /// One column per **data** component; tags carry no value.
    columns: HashMap<ComponentId, DataBuffer>,
    /// Maps each resident entity to its row in the columns.
    row_index: HashMap<EntityId, u32>,
    /// Allocates and recycles row numbers, independently per archetype.
    rows: IndexPool,
    /// Archetype-graph adjacency, ordered so traversal is deterministic.
    pub(crate) edges: BTreeMap<ComponentId, ArchetypeEdge>,
}

impl Archetype {
    pub(crate) fn new(id: ArchetypeId, signature: Signature, registry: &TypeRegistry) -> Self {
        let mut columns = HashMap::new();
        for &component in signature.as_slice() {
            if registry.kind(component) == ComponentKind::Data {
                columns.insert(component, DataBuffer::new());
            }
        }
        Self {
            id,
            signature,
            columns,
            row_index: HashMap::new(),
            rows: IndexPool::new(),
            edges: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// The immutable structural signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Whether the signature contains `id` (component or tag).
    pub fn contains(&self, id: ComponentId) -> bool {
        self.signature.contains(id)
    }

    /// Number of entities currently stored here.
    pub fn len(&self) -> usize {
        self.row_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_index.is_empty()
    }

    /// The resident entities, in row-index iteration order (unstable across
    /// migrations).
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.row_index.keys().copied()
    }

    /// The recorded graph edges.
    pub fn edges(&self) -> impl Iterator<Item = (ComponentId, ArchetypeEdge)> + '_ {
        self.edges.iter().map(|(&id, &edge)| (id, edge))
    }

    pub(crate) fn row_of(&self, entity: EntityId) -> Option<u32> {
        self.row_index.get(&entity).copied()
    }

    pub(crate) fn row_index(&self) -> &HashMap<EntityId, u32> {
        &self.row_index
    }

    pub(crate) fn columns_mut(&mut self) -> &mut HashMap<ComponentId, DataBuffer> {
        &mut self.columns
    }

    /// Borrow the column storing `id`'s values, if this archetype has one
    /// (tags and foreign components don't).
    pub fn column(&self, id: ComponentId) -> Option<&DataBuffer> {
        self.columns.get(&id)
    }

    /// Register an entity, allocating it a row. The caller owns the id
    /// (fresh from the world allocator, or mid-migration from another
    /// archetype).
    pub(crate) fn insert_entity(&mut self, entity: EntityId) -> u32 {
        let row = self.rows.allocate();
        self.row_index.insert(entity, row);
        row
    }

    /// Unmap an entity and recycle its row. Column data in the vacated row
    /// is deliberately left in place until the row is reused.
    pub(crate) fn remove_entity(&mut self, entity: EntityId) -> Option<u32> {
        let row = self.row_index.remove(&entity)?;
        self.rows.release(row);
        Some(row)
    }

    /// Shared reference to `entity`'s value in the `component` column.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not stored here or the archetype has no such
    /// column.
    pub(crate) fn get<T: 'static>(&self, entity: EntityId, component: ComponentId) -> &T {
        let row = self.expect_row(entity);
        self.expect_column::<T>(component).get(row)
    }

    /// Mutable reference to `entity`'s value in the `component` column.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not stored here or the archetype has no such
    /// column.
    pub(crate) fn get_mut<T: 'static>(&mut self, entity: EntityId, component: ComponentId) -> &mut T {
        let row = self.expect_row(entity);
        self.columns
            .get_mut(&component)
            .unwrap_or_else(|| missing_column::<T>())
            .get_mut(row)
    }

    /// Non-panicking component read: `None` if the entity is absent, the
    /// column is absent, or the slot is vacant.
    pub(crate) fn try_get<T: 'static>(&self, entity: EntityId, component: ComponentId) -> Option<&T> {
        let row = self.row_of(entity)?;
        self.columns.get(&component)?.try_get(row)
    }

    /// Non-panicking mutable component read.
    pub(crate) fn try_get_mut<T: 'static>(
        &mut self,
        entity: EntityId,
        component: ComponentId,
    ) -> Option<&mut T> {
        let row = self.row_of(entity)?;
        self.columns.get_mut(&component)?.try_get_mut(row)
    }

    /// Overwrite `entity`'s slot in an existing column. Does not change
    /// archetype membership; structural changes are the world's job.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not stored here or the archetype has no such
    /// column.
    pub(crate) fn set_component<T: 'static + Send + Sync>(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        value: T,
    ) {
        let row = self.expect_row(entity);
        self.columns
            .get_mut(&component)
            .unwrap_or_else(|| missing_column::<T>())
            .set(row, value);
    }

    /// Move an entity's row from `src` to `dest`: allocate a destination
    /// row, move every column value whose component exists in **both**
    /// signatures, and unmap the source row. Values only in `src` are
    /// dropped with the vacated slot; columns only in `dest` stay vacant
    /// until the caller writes them. Cost is proportional to the number of
    /// shared columns.
    pub(crate) fn transfer(src: &mut Archetype, dest: &mut Archetype, entity: EntityId) -> u32 {
        let src_row = src
            .row_of(entity)
            .unwrap_or_else(|| panic!("entity {} is not stored in archetype {}", entity, src.id));
        let dest_row = dest.insert_entity(entity);
        for (component, column) in src.columns.iter_mut() {
            if let Some(dest_column) = dest.columns.get_mut(component) {
                column.move_to(src_row, dest_column, dest_row);
            }
        }
        src.remove_entity(entity);
        dest_row
    }

    fn expect_row(&self, entity: EntityId) -> u32 {
        self.row_of(entity).unwrap_or_else(|| {
            panic!("entity {} is not stored in archetype {}", entity, self.id)
        })
    }

    fn expect_column<T: 'static>(&self, component: ComponentId) -> &DataBuffer {
        self.columns
            .get(&component)
            .unwrap_or_else(|| missing_column::<T>())
    }
}

fn missing_column<T: 'static>() -> ! {
    panic!(
        "archetype has no `{}` column",
        std::any::type_name::<T>()
    )
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archetype {} {:?} ({} entities)", self.id, self.signature.as_slice(), self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position {
        x: f32,
    }
    struct Velocity {
        dx: f32,
    }
    struct Frozen;

    fn entity(index: u32) -> EntityId {
        EntityId::new(index, 0)
    }

    #[test]
    fn signature_is_order_insensitive() {
        let mut registry = TypeRegistry::new();
        let a = registry.register::<Position>();
        let b = registry.register::<Velocity>();
        assert_eq!(Signature::new(vec![a, b]), Signature::new(vec![b, a]));
        assert_eq!(Signature::new(vec![a, a, b]), Signature::new(vec![a, b]));
    }

    #[test]
    fn signature_set_operations() {
        let mut registry = TypeRegistry::new();
        let a = registry.register::<Position>();
        let b = registry.register::<Velocity>();
        let sig = Signature::new(vec![a]);

        let grown = sig.with(b);
        assert!(grown.contains(a));
        assert!(grown.contains(b));
        assert_eq!(grown.with(b), grown); // union is idempotent

        let shrunk = grown.without(b);
        assert_eq!(shrunk, sig);
        assert!(grown.is_superset_of(sig.as_slice()));
        assert!(!sig.is_superset_of(grown.as_slice()));
    }

    #[test]
    fn tags_get_no_column() {
        let mut registry = TypeRegistry::new();
        let pos = registry.register::<Position>();
        let frozen = registry.register_tag::<Frozen>();
        let arch = Archetype::new(0, Signature::new(vec![pos, frozen]), &registry);
        assert!(arch.column(pos).is_some());
        assert!(arch.column(frozen).is_none());
        assert!(arch.contains(frozen)); // still part of the signature
    }

    #[test]
    fn rows_are_recycled() {
        let registry = TypeRegistry::new();
        let mut arch = Archetype::new(0, Signature::empty(), &registry);
        let r0 = arch.insert_entity(entity(0));
        let r1 = arch.insert_entity(entity(1));
        assert_ne!(r0, r1);

        arch.remove_entity(entity(0));
        let r2 = arch.insert_entity(entity(2));
        assert_eq!(r2, r0); // recycled row
        assert_eq!(arch.len(), 2);
    }

    #[test]
    fn set_and_get_component() {
        let mut registry = TypeRegistry::new();
        let pos = registry.register::<Position>();
        let mut arch = Archetype::new(0, Signature::new(vec![pos]), &registry);
        let e = entity(0);
        arch.insert_entity(e);
        arch.set_component(e, pos, Position { x: 4.0 });
        assert_eq!(arch.get::<Position>(e, pos).x, 4.0);

        arch.get_mut::<Position>(e, pos).x = 8.0;
        assert_eq!(arch.get::<Position>(e, pos).x, 8.0);
    }

    #[test]
    #[should_panic(expected = "no `")]
    fn get_missing_column_panics() {
        let mut registry = TypeRegistry::new();
        let pos = registry.register::<Position>();
        let vel = registry.register::<Velocity>();
        let mut arch = Archetype::new(0, Signature::new(vec![pos]), &registry);
        let e = entity(0);
        arch.insert_entity(e);
        arch.get::<Velocity>(e, vel);
    }

    #[test]
    fn try_get_absent_is_none() {
        let mut registry = TypeRegistry::new();
        let pos = registry.register::<Position>();
        let mut arch = Archetype::new(0, Signature::new(vec![pos]), &registry);
        let e = entity(0);
        arch.insert_entity(e);
        // Row exists but the slot was never written.
        assert!(arch.try_get::<Position>(e, pos).is_none());
        // Unknown entity.
        assert!(arch.try_get::<Position>(entity(9), pos).is_none());
    }

    #[test]
    fn transfer_moves_shared_columns_only() {
        let mut registry = TypeRegistry::new();
        let pos = registry.register::<Position>();
        let vel = registry.register::<Velocity>();

        let mut src = Archetype::new(0, Signature::new(vec![pos, vel]), &registry);
        let mut dest = Archetype::new(1, Signature::new(vec![pos]), &registry);

        let e = entity(0);
        src.insert_entity(e);
        src.set_component(e, pos, Position { x: 1.0 });
        src.set_component(e, vel, Velocity { dx: 2.0 });

        Archetype::transfer(&mut src, &mut dest, e);

        assert!(src.row_of(e).is_none());
        assert_eq!(dest.get::<Position>(e, pos).x, 1.0); // shared column moved
        assert!(dest.column(vel).is_none()); // velocity dropped with the move
        assert_eq!(src.len(), 0);
        assert_eq!(dest.len(), 1);
    }

    #[test]
    fn transfer_leaves_new_columns_vacant() {
        let mut registry = TypeRegistry::new();
        let pos = registry.register::<Position>();
        let vel = registry.register::<Velocity>();

        let mut src = Archetype::new(0, Signature::new(vec![pos]), &registry);
        let mut dest = Archetype::new(1, Signature::new(vec![pos, vel]), &registry);

        let e = entity(0);
        src.insert_entity(e);
        src.set_component(e, pos, Position { x: 1.0 });

        Archetype::transfer(&mut src, &mut dest, e);

        assert_eq!(dest.get::<Position>(e, pos).x, 1.0);
        assert!(dest.try_get::<Velocity>(e, vel).is_none()); // caller must write it
    }
}
