//! # World — The Archetype Graph and Everything In It
//!
//! The [`World`] owns the whole storage engine: the entity allocator, the
//! type registry, and an arena of [`Archetype`]s rooted at the *empty
//! archetype* (id 0, no components, no tags — every entity starts there).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ World                                                      │
//! │                                                            │
//! │  allocator: EntityAllocator (generational ids)             │
//! │  registry:  TypeRegistry (type → ComponentId interning)    │
//! │                                                            │
//! │  archetypes: Vec<Archetype>        ← arena, dense ids      │
//! │  archetype_by_signature: Signature → ArchetypeId           │
//! │  archetype_by_entity:    EntityId  → ArchetypeId           │
//! │  archetypes_by_component: ComponentId → Vec<ArchetypeId>   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Archetypes are deduplicated by signature and never destroyed; the graph
//! only grows. `archetype_by_entity` is the authoritative "where is this
//! entity" index: every live entity appears in the row index of exactly one
//! archetype, the one this map names.
//!
//! ## Structural Changes
//!
//! [`set`](World::set), [`unset`](World::unset), [`tag`](World::tag), and
//! [`untag`](World::untag) all follow the same shape: compute the
//! destination signature (set union or difference), look up or create the
//! destination archetype, move the entity's row across (shared columns
//! only), and record the transition in both archetypes' edge tables. Edge
//! wiring happens on **every** transition, component or tag, so anything
//! reachable by mutation is reachable by traversal.
//!
//! ## Threading
//!
//! A `World` is exclusively owned by one logical thread; nothing in here
//! locks. Structural mutation during query iteration is rejected by the
//! borrow checker (the query exclusively borrows the world) — defer such
//! changes with a [`CommandBuffer`](crate::command::CommandBuffer).

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write as _;

use crate::archetype::{Archetype, ArchetypeId, Signature};
use crate::component::{ComponentId, TypeRegistry};
use crate::entity::{Entity, EntityAllocator, EntityId};
use crate::pool::IndexPool;
use crate::query::Query;

/// Identifies one [`World`] within a [`Worlds`] directory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct WorldId(pub(crate) u32);

impl WorldId {
    /// The raw directory slot index.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// The empty archetype's id. Seeded at world creation; every entity starts
/// its life here.
pub(crate) const EMPTY_ARCHETYPE: ArchetypeId = 0;

/// One add-transition in the archetype graph, as yielded by
/// [`World::archetype_graph`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GraphEdge {
    pub from: ArchetypeId,
    pub to: ArchetypeId,
    /// The component or tag id whose addition crosses this edge.
    pub via: ComponentId,
}

/// The central container: entities, their components, and the archetype
/// graph describing every structural shape seen so far.
pub struct World {
    id: WorldId,
    registry: TypeRegistry,
    allocator: EntityAllocator,
    archetypes: Vec<Archetype>,
    archetype_by_signature: HashMap<Signature, ArchetypeId>,
    archetype_by_entity: HashMap<EntityId, ArchetypeId>,
    /// Reverse index: which archetypes carry a given component or tag.
    archetypes_by_component: HashMap<ComponentId, Vec<ArchetypeId>>,
    /// Entities created this frame (diagnostics only).
    #[cfg(feature = "diagnostics")]
    created_this_frame: u32,
    /// Entities destroyed this frame (diagnostics only).
    #[cfg(feature = "diagnostics")]
    destroyed_this_frame: u32,
}

impl World {
    /// Create a standalone world. Hosts that juggle several worlds should go
    /// through [`Worlds::create`] instead, which assigns distinct ids.
    pub fn new() -> Self {
        Self::with_id(WorldId(0))
    }

    pub(crate) fn with_id(id: WorldId) -> Self {
        let registry = TypeRegistry::new();
        let empty = Archetype::new(EMPTY_ARCHETYPE, Signature::empty(), &registry);
        let mut archetype_by_signature = HashMap::new();
        archetype_by_signature.insert(Signature::empty(), EMPTY_ARCHETYPE);
        Self {
            id,
            registry,
            allocator: EntityAllocator::new(),
            archetypes: vec![empty],
            archetype_by_signature,
            archetype_by_entity: HashMap::new(),
            archetypes_by_component: HashMap::new(),
            #[cfg(feature = "diagnostics")]
            created_this_frame: 0,
            #[cfg(feature = "diagnostics")]
            destroyed_this_frame: 0,
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    /// The world's type registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    // ── Entity Lifecycle ─────────────────────────────────────────────

    /// Create an entity in the empty archetype.
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.allocator.allocate();
        self.archetypes[EMPTY_ARCHETYPE as usize].insert_entity(entity);
        self.archetype_by_entity.insert(entity, EMPTY_ARCHETYPE);
        #[cfg(feature = "diagnostics")]
        {
            self.created_this_frame += 1;
        }
        entity
    }

    /// A convenience handle for fluent per-entity calls.
    pub fn entity(&self, id: EntityId) -> Entity {
        Entity {
            id,
            world: self.id,
        }
    }

    /// Destroy an entity, unmapping its row and recycling its id.
    ///
    /// Returns `false` (and does nothing) if the handle is dead or stale.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        if !self.allocator.is_alive(entity) {
            log::trace!("destroy_entity: {} is already dead, ignoring", entity);
            return false;
        }
        if let Some(archetype) = self.archetype_by_entity.remove(&entity) {
            self.archetypes[archetype as usize].remove_entity(entity);
        }
        self.allocator.deallocate(entity);
        #[cfg(feature = "diagnostics")]
        {
            self.destroyed_this_frame += 1;
        }
        true
    }

    /// Whether the handle is current (generation matches) and the entity is
    /// stored in its archetype's row index.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
            && self
                .archetype_by_entity
                .get(&entity)
                .is_some_and(|&a| self.archetypes[a as usize].row_of(entity).is_some())
    }

    /// Number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Number of archetypes, the empty one included.
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    // ── Structural Changes ───────────────────────────────────────────

    /// Set a component value on an entity.
    ///
    /// If the entity's archetype lacks the component, the entity migrates to
    /// the archetype whose signature is its current one plus `T` (created on
    /// first use), and the transition is recorded in both archetypes' edge
    /// tables. If the component is already present this only overwrites the
    /// value — idempotent on structure. A no-op on dead entities. Chainable.
    pub fn set<T: 'static + Send + Sync>(&mut self, entity: EntityId, value: T) -> &mut Self {
        if !self.allocator.is_alive(entity) {
            log::trace!("set: {} is dead, ignoring", entity);
            return self;
        }
        let component = self.registry.register::<T>();
        let dest = self.shift(entity, component, true);
        self.archetypes[dest as usize].set_component(entity, component, value);
        self
    }

    /// Remove a component from an entity, migrating it to the archetype
    /// without `T`. A no-op if the entity is dead or never had `T`. Chainable.
    pub fn unset<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> &mut Self {
        if !self.allocator.is_alive(entity) {
            log::trace!("unset: {} is dead, ignoring", entity);
            return self;
        }
        // A type this world has never seen cannot be on the entity.
        if let Some(component) = self.registry.lookup::<T>() {
            self.shift(entity, component, false);
        }
        self
    }

    /// Attach a marker tag to an entity. Tags join the structural signature
    /// but carry no value. A no-op on dead entities. Chainable.
    pub fn tag<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> &mut Self {
        if !self.allocator.is_alive(entity) {
            log::trace!("tag: {} is dead, ignoring", entity);
            return self;
        }
        let tag = self.registry.register_tag::<T>();
        self.shift(entity, tag, true);
        self
    }

    /// Detach a marker tag from an entity. A no-op if the entity is dead or
    /// untagged. Chainable.
    pub fn untag<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> &mut Self {
        if !self.allocator.is_alive(entity) {
            log::trace!("untag: {} is dead, ignoring", entity);
            return self;
        }
        if let Some(tag) = self.registry.lookup_tag::<T>() {
            self.shift(entity, tag, false);
        }
        self
    }

    /// Move `entity` toward the archetype that differs from its current one
    /// by `component` (added or removed). Wires the graph edges in both
    /// directions when an actual transition happens. Returns the entity's
    /// archetype after the (possibly trivial) move.
    fn shift(&mut self, entity: EntityId, component: ComponentId, add: bool) -> ArchetypeId {
        let src = *self
            .archetype_by_entity
            .get(&entity)
            .unwrap_or_else(|| panic!("entity {} has no archetype", entity));
        let src_signature = self.archetypes[src as usize].signature();
        let dest_signature = if add {
            src_signature.with(component)
        } else {
            src_signature.without(component)
        };
        let dest = self.ensure_archetype(dest_signature);
        if dest == src {
            return dest;
        }

        let (src_arch, dest_arch) = two_archetypes(&mut self.archetypes, src, dest);
        Archetype::transfer(src_arch, dest_arch, entity);

        // Record the transition so graph traversal can find it later. An
        // add-transition is a remove-transition read backwards.
        if add {
            src_arch.edges.entry(component).or_default().add = Some(dest);
            dest_arch.edges.entry(component).or_default().remove = Some(src);
        } else {
            src_arch.edges.entry(component).or_default().remove = Some(dest);
            dest_arch.edges.entry(component).or_default().add = Some(src);
        }

        self.archetype_by_entity.insert(entity, dest);
        dest
    }

    // ── Component Access ─────────────────────────────────────────────

    /// Shared reference to a component on an entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or does not have the component. Use
    /// [`try_get`](Self::try_get) to probe.
    pub fn get<T: 'static + Send + Sync>(&self, entity: EntityId) -> &T {
        let (archetype, component) = self.expect_location::<T>(entity);
        self.archetypes[archetype as usize].get(entity, component)
    }

    /// Mutable reference to a component on an entity. Mutations through the
    /// reference land directly in columnar storage.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or does not have the component.
    pub fn get_mut<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> &mut T {
        let (archetype, component) = self.expect_location::<T>(entity);
        self.archetypes[archetype as usize].get_mut(entity, component)
    }

    /// Non-panicking component read. `None` if the entity is dead, the
    /// component was never registered, or the entity doesn't carry it.
    pub fn try_get<T: 'static + Send + Sync>(&self, entity: EntityId) -> Option<&T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        let component = self.registry.lookup::<T>()?;
        let archetype = *self.archetype_by_entity.get(&entity)?;
        self.archetypes[archetype as usize].try_get(entity, component)
    }

    /// Non-panicking mutable component read.
    pub fn try_get_mut<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> Option<&mut T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        let component = self.registry.lookup::<T>()?;
        let archetype = *self.archetype_by_entity.get(&entity)?;
        self.archetypes[archetype as usize].try_get_mut(entity, component)
    }

    fn expect_location<T: 'static>(&self, entity: EntityId) -> (ArchetypeId, ComponentId) {
        assert!(
            self.allocator.is_alive(entity),
            "entity {} is not alive in world {:?}",
            entity,
            self.id
        );
        let component = self.registry.lookup::<T>().unwrap_or_else(|| {
            panic!(
                "component `{}` was never registered in world {:?}",
                std::any::type_name::<T>(),
                self.id
            )
        });
        let archetype = *self
            .archetype_by_entity
            .get(&entity)
            .unwrap_or_else(|| panic!("entity {} has no archetype", entity));
        (archetype, component)
    }

    /// Whether the tag `T` is attached to the entity.
    pub fn tagged<T: 'static + Send + Sync>(&self, entity: EntityId) -> bool {
        if !self.allocator.is_alive(entity) {
            return false;
        }
        let Some(tag) = self.registry.lookup_tag::<T>() else {
            return false;
        };
        self.archetype_by_entity
            .get(&entity)
            .is_some_and(|&a| self.archetypes[a as usize].contains(tag))
    }

    /// The archetype currently describing this entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead.
    pub fn archetype_of(&self, entity: EntityId) -> ArchetypeId {
        assert!(
            self.allocator.is_alive(entity),
            "entity {} is not alive in world {:?}",
            entity,
            self.id
        );
        *self
            .archetype_by_entity
            .get(&entity)
            .unwrap_or_else(|| panic!("entity {} has no archetype", entity))
    }

    /// Borrow an archetype by id.
    pub fn archetype(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id as usize]
    }

    // ── Archetype Graph ──────────────────────────────────────────────

    /// Look up the archetype for a signature, creating and indexing it on
    /// first use. New archetypes enter the graph here with no edges; the
    /// structural-change path that needed them wires the edges.
    pub(crate) fn ensure_archetype(&mut self, signature: Signature) -> ArchetypeId {
        if let Some(&id) = self.archetype_by_signature.get(&signature) {
            return id;
        }
        let id = self.archetypes.len() as ArchetypeId;
        let archetype = Archetype::new(id, signature.clone(), &self.registry);
        for &component in signature.as_slice() {
            self.archetypes_by_component
                .entry(component)
                .or_default()
                .push(id);
        }
        log::debug!(
            "world {:?}: new archetype {} [{}]",
            self.id,
            id,
            self.describe_signature(&signature)
        );
        self.archetype_by_signature.insert(signature, id);
        self.archetypes.push(archetype);
        id
    }

    /// The archetypes carrying a given component or tag id (reverse index).
    pub fn archetypes_with(&self, component: ComponentId) -> &[ArchetypeId] {
        self.archetypes_by_component
            .get(&component)
            .map_or(&[], Vec::as_slice)
    }

    /// Every add-edge of the archetype graph reachable from the empty
    /// archetype, in breadth-first order, each edge exactly once. Each call
    /// walks the graph fresh.
    pub fn archetype_graph(&self) -> Vec<GraphEdge> {
        let mut edges = Vec::new();
        let mut visited = HashSet::from([EMPTY_ARCHETYPE]);
        let mut queue = VecDeque::from([EMPTY_ARCHETYPE]);

        while let Some(current) = queue.pop_front() {
            for (via, edge) in self.archetypes[current as usize].edges() {
                if let Some(next) = edge.add {
                    edges.push(GraphEdge {
                        from: current,
                        to: next,
                        via,
                    });
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        edges
    }

    /// The archetypes matching a with/without filter, discovered by
    /// breadth-first traversal of the add-edge graph from the empty
    /// archetype.
    ///
    /// An edge whose component is in `without` is pruned outright; since
    /// every path to an archetype containing a component crosses that
    /// component's add-edge, nothing carrying an excluded id survives. An
    /// unpruned, unvisited destination is yielded if its signature is a
    /// superset of `with`, and enqueued for further traversal either way.
    /// The empty root itself is never yielded. Order is BFS order, not
    /// creation order.
    pub fn archetypes(&self, with: &[ComponentId], without: &[ComponentId]) -> Vec<ArchetypeId> {
        let mut matches = Vec::new();
        let mut visited = HashSet::from([EMPTY_ARCHETYPE]);
        let mut queue = VecDeque::from([EMPTY_ARCHETYPE]);

        while let Some(current) = queue.pop_front() {
            for (via, edge) in self.archetypes[current as usize].edges() {
                let Some(next) = edge.add else { continue };
                if without.contains(&via) {
                    continue;
                }
                if !visited.insert(next) {
                    continue;
                }
                if self.archetypes[next as usize].signature().is_superset_of(with) {
                    matches.push(next);
                }
                queue.push_back(next);
            }
        }
        matches
    }

    /// Start building a query over this world.
    pub fn query(&mut self) -> Query<'_> {
        Query::new(self)
    }

    pub(crate) fn archetype_and_registry(
        &mut self,
        id: ArchetypeId,
    ) -> (&mut Archetype, &TypeRegistry) {
        (&mut self.archetypes[id as usize], &self.registry)
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// Human-readable dump of every archetype and its recorded edges. For
    /// debugging; the format is not stable.
    pub fn to_graph_string(&self) -> String {
        let mut out = String::new();
        for archetype in &self.archetypes {
            let _ = writeln!(
                out,
                "archetype {} [{}] ({} entities)",
                archetype.id(),
                self.describe_signature(archetype.signature()),
                archetype.len()
            );
            for (via, edge) in archetype.edges() {
                let name = self.registry.describe(via);
                if let Some(to) = edge.add {
                    let _ = writeln!(out, "  --add {}--> {}", name, to);
                }
                if let Some(to) = edge.remove {
                    let _ = writeln!(out, "  --remove {}--> {}", name, to);
                }
            }
        }
        out
    }

    fn describe_signature(&self, signature: &Signature) -> String {
        signature
            .as_slice()
            .iter()
            .map(|&id| self.registry.describe(id))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Entity churn since the last call: `(created, destroyed)`.
    #[cfg(feature = "diagnostics")]
    pub fn churn_stats(&mut self) -> (u32, u32) {
        let stats = (self.created_this_frame, self.destroyed_this_frame);
        self.created_this_frame = 0;
        self.destroyed_this_frame = 0;
        stats
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Tear the world down to its freshly-created state: all entities die,
    /// all archetypes but the empty root are dropped, all handles become
    /// stale. Idempotent — every step here is, so calling it again (or on a
    /// fresh world) changes nothing.
    pub fn dispose(&mut self) {
        self.allocator.reset();
        self.archetype_by_entity.clear();
        self.archetypes_by_component.clear();
        self.archetypes.clear();
        self.archetype_by_signature.clear();
        let empty = Archetype::new(EMPTY_ARCHETYPE, Signature::empty(), &self.registry);
        self.archetypes.push(empty);
        self.archetype_by_signature
            .insert(Signature::empty(), EMPTY_ARCHETYPE);
        log::debug!("world {:?} disposed", self.id);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrow two distinct archetypes from the arena at once.
fn two_archetypes(
    archetypes: &mut [Archetype],
    a: ArchetypeId,
    b: ArchetypeId,
) -> (&mut Archetype, &mut Archetype) {
    debug_assert_ne!(a, b);
    let (a, b) = (a as usize, b as usize);
    if a < b {
        let (lo, hi) = archetypes.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = archetypes.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

/// An explicit directory of worlds, replacing ambient global state: hosts
/// that run several simulations keep one `Worlds` and hand out [`WorldId`]s.
/// Slots are recycled when a world is destroyed.
pub struct Worlds {
    slots: Vec<Option<World>>,
    pool: IndexPool,
}

impl Worlds {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            pool: IndexPool::new(),
        }
    }

    /// Create a world and return its id.
    pub fn create(&mut self) -> WorldId {
        let index = self.pool.allocate();
        let id = WorldId(index);
        let slot = index as usize;
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some(World::with_id(id));
        id
    }

    /// Borrow a world by id.
    pub fn get(&self, id: WorldId) -> Option<&World> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Mutably borrow a world by id.
    pub fn get_mut(&mut self, id: WorldId) -> Option<&mut World> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Dispose and remove a world, recycling its slot. Idempotent: `false`
    /// if the id no longer names a world.
    pub fn destroy(&mut self, id: WorldId) -> bool {
        let Some(slot) = self.slots.get_mut(id.0 as usize) else {
            return false;
        };
        let Some(mut world) = slot.take() else {
            return false;
        };
        world.dispose();
        self.pool.release(id.0);
        true
    }

    /// Number of live worlds.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Worlds {
    fn default() -> Self {
        Self::new()
    }
}
