//! # Entity — Packed Generational Identifiers
//!
//! An [`EntityId`] is just a number — it doesn't "contain" anything. The
//! [`World`](crate::world::World) maps ids to the archetype currently
//! describing them. Separating identity from data is the core move of the
//! ECS pattern.
//!
//! ## Bit Layout
//!
//! Ids pack three fields into one `u64`:
//!
//! ```text
//! | index: 32 | generation: 16 | flags: 16 |
//!   63      32  31           16  15       0
//! ```
//!
//! - **index** is the slot in the allocator, recycled on destroy.
//! - **generation** increments each time a slot is recycled, so a stale
//!   handle with an old generation is detected instead of silently aliasing
//!   whatever entity reused the slot.
//! - **flags** is reserved; always zero today.
//!
//! ## Why Verify Generations?
//!
//! ```text
//! 1. Create entity #5
//! 2. Store a handle: saved = 5v0
//! 3. Destroy entity #5
//! 4. Create a new entity — slot 5 is recycled as 5v1
//! 5. Use `saved` — 5v0 no longer matches, lookup fails safely
//! ```
//!
//! Every lookup in this crate goes through the generation check. Skipping it
//! would make step 5 read the wrong entity's components.
//!
//! ## Comparison
//!
//! - **hecs**: `Entity` = u64 split into index + generation (same idea).
//! - **bevy_ecs**: same generational scheme, wrapped in more layers.

use std::fmt;

use crate::archetype::ArchetypeId;
use crate::world::{World, WorldId};

const INDEX_SHIFT: u32 = 32;
const GENERATION_SHIFT: u32 = 16;
const GENERATION_MASK: u64 = 0xFFFF;
const FLAGS_MASK: u64 = 0xFFFF;

/// A packed handle to an entity slot in one [`World`].
///
/// Created by [`World::create_entity`]; only valid while its generation
/// matches the slot's current generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    pub(crate) fn new(index: u32, generation: u16) -> Self {
        Self((u64::from(index) << INDEX_SHIFT) | (u64::from(generation) << GENERATION_SHIFT))
    }

    /// The slot index in the allocator.
    pub fn index(self) -> u32 {
        (self.0 >> INDEX_SHIFT) as u32
    }

    /// The generation this handle was issued under.
    pub fn generation(self) -> u16 {
        ((self.0 >> GENERATION_SHIFT) & GENERATION_MASK) as u16
    }

    /// Reserved flag bits. Always zero in the current layout.
    pub fn flags(self) -> u16 {
        (self.0 & FLAGS_MASK) as u16
    }

    /// The raw packed value, e.g. for hashing into external tables.
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from [`to_bits`](Self::to_bits) output.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Manages entity id allocation and recycling for one world.
///
/// ```text
/// generations: [0, 1, 0, 2, 0]   ← one generation per slot ever allocated
/// free_list:   [1, 3]            ← slots available for reuse
/// len:         5                 ← next fresh index (if free_list is empty)
/// ```
///
/// Allocating pops from `free_list` if possible, otherwise grows. Destroying
/// bumps the slot's generation and pushes the index onto `free_list`.
pub(crate) struct EntityAllocator {
    /// Generation counter per slot, indexed by `EntityId::index`.
    generations: Vec<u16>,
    /// Indices of destroyed entities, available for reuse.
    free_list: Vec<u32>,
    /// Total number of slots ever allocated. Also the next fresh index.
    len: u32,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Allocate an id, reusing a freed slot if one is available.
    pub fn allocate(&mut self) -> EntityId {
        if let Some(index) = self.free_list.pop() {
            // Generation was already bumped when the slot was freed.
            EntityId::new(index, self.generations[index as usize])
        } else {
            let index = self.len;
            self.len += 1;
            self.generations.push(0);
            EntityId::new(index, 0)
        }
    }

    /// Free an id, making its slot available for reuse.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        if idx < self.generations.len() && self.generations[idx] == id.generation() {
            // Bump the generation so existing handles become stale.
            self.generations[idx] = self.generations[idx].wrapping_add(1);
            self.free_list.push(id.index());
            true
        } else {
            false
        }
    }

    /// Whether the handle still matches its slot's current generation.
    pub fn is_alive(&self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        idx < self.generations.len() && self.generations[idx] == id.generation()
    }

    /// Number of currently alive entities.
    pub fn alive_count(&self) -> usize {
        (self.len as usize) - self.free_list.len()
    }

    /// Drop all slots. Every previously issued handle becomes stale.
    pub fn reset(&mut self) {
        self.generations.clear();
        self.free_list.clear();
        self.len = 0;
    }

    /// Number of free (recyclable) slots.
    #[cfg(any(feature = "diagnostics", test))]
    pub(crate) fn free_count(&self) -> usize {
        self.free_list.len()
    }
}

/// A copyable convenience handle pairing an [`EntityId`] with the id of the
/// world that owns it.
///
/// All accessors take the owning [`World`] explicitly and assert that it is
/// in fact the owner, so a handle from one world cannot silently read
/// another world's storage. Mutating accessors return `self`, so calls chain:
///
/// ```ignore
/// let e = world.create_entity();
/// world.entity(e).set(&mut world, Position { x: 0.0, y: 0.0 })
///     .tag::<Frozen>(&mut world);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) world: WorldId,
}

impl Entity {
    /// The underlying entity id.
    pub fn id(self) -> EntityId {
        self.id
    }

    /// The id of the owning world.
    pub fn world(self) -> WorldId {
        self.world
    }

    fn check(self, world: &World) {
        assert_eq!(
            world.id(),
            self.world,
            "entity {} belongs to world {:?}, not {:?}",
            self.id,
            self.world,
            world.id()
        );
    }

    /// Shared reference to a component.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or does not have the component.
    pub fn get<T: 'static + Send + Sync>(self, world: &World) -> &T {
        self.check(world);
        world.get::<T>(self.id)
    }

    /// Mutable reference to a component.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or does not have the component.
    pub fn get_mut<T: 'static + Send + Sync>(self, world: &mut World) -> &mut T {
        self.check(world);
        world.get_mut::<T>(self.id)
    }

    /// Non-panicking variant of [`get`](Self::get).
    pub fn try_get<T: 'static + Send + Sync>(self, world: &World) -> Option<&T> {
        self.check(world);
        world.try_get::<T>(self.id)
    }

    /// Set a component value, migrating the entity if the component is new.
    pub fn set<T: 'static + Send + Sync>(self, world: &mut World, value: T) -> Self {
        self.check(world);
        world.set(self.id, value);
        self
    }

    /// Remove a component, migrating the entity out of its column.
    pub fn unset<T: 'static + Send + Sync>(self, world: &mut World) -> Self {
        self.check(world);
        world.unset::<T>(self.id);
        self
    }

    /// Attach a marker tag (presence only, no value).
    pub fn tag<T: 'static + Send + Sync>(self, world: &mut World) -> Self {
        self.check(world);
        world.tag::<T>(self.id);
        self
    }

    /// Detach a marker tag.
    pub fn untag<T: 'static + Send + Sync>(self, world: &mut World) -> Self {
        self.check(world);
        world.untag::<T>(self.id);
        self
    }

    /// Whether the tag `T` is attached.
    pub fn tagged<T: 'static + Send + Sync>(self, world: &World) -> bool {
        self.check(world);
        world.tagged::<T>(self.id)
    }

    /// Whether the handle is still valid.
    pub fn is_alive(self, world: &World) -> bool {
        self.check(world);
        world.is_alive(self.id)
    }

    /// The archetype currently describing this entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead.
    pub fn archetype(self, world: &World) -> ArchetypeId {
        self.check(world);
        world.archetype_of(self.id)
    }

    /// Destroy the entity. A no-op if it is already dead.
    pub fn destroy(self, world: &mut World) {
        self.check(world);
        world.destroy_entity(self.id);
    }
}
