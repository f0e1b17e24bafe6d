//! # CommandBuffer — Deferred Structural Mutations
//!
//! Structural changes (create, destroy, set, unset, tag, untag) are unsafe
//! to perform while a query is iterating — in this crate they are in fact
//! *impossible* then, because the query holds the exclusive world borrow.
//! The command buffer is the sanctioned workaround: record what should
//! happen as plain data while iterating, then apply it afterwards at a
//! synchronization point.
//!
//! ```text
//! let mut commands = CommandBuffer::new();
//! world.query().for_each::<(&Health,)>(|entity, (health,)| {
//!     if health.0 == 0 {
//!         commands.destroy(entity);
//!     }
//! });
//! commands.apply(&mut world);
//! ```
//!
//! Commands describe *what* change should occur, not *how*; they are applied
//! strictly in recording order. Each typed recording captures a
//! monomorphized `fn` pointer that performs the mutation through the normal
//! [`World`] entry points, so deferred changes behave identically to direct
//! calls (including their silent no-op semantics on dead entities).

use std::any::Any;

use crate::entity::EntityId;
use crate::world::World;

type ApplyValue = fn(&mut World, EntityId, Box<dyn Any + Send + Sync>);
type ApplyMarker = fn(&mut World, EntityId);

/// One recorded component write: the boxed value plus the monomorphized
/// function that downcasts and applies it.
struct Write {
    value: Box<dyn Any + Send + Sync>,
    apply: ApplyValue,
}

enum Command {
    Create {
        writes: Vec<Write>,
        markers: Vec<ApplyMarker>,
    },
    Destroy(EntityId),
    Set {
        entity: EntityId,
        write: Write,
    },
    Unset {
        entity: EntityId,
        apply: ApplyMarker,
    },
    Tag {
        entity: EntityId,
        apply: ApplyMarker,
    },
    Untag {
        entity: EntityId,
        apply: ApplyMarker,
    },
}

fn apply_set<T: 'static + Send + Sync>(
    world: &mut World,
    entity: EntityId,
    value: Box<dyn Any + Send + Sync>,
) {
    match value.downcast::<T>() {
        Ok(value) => {
            world.set(entity, *value);
        }
        Err(_) => unreachable!("command buffer stored a mistyped value"),
    }
}

fn apply_unset<T: 'static + Send + Sync>(world: &mut World, entity: EntityId) {
    world.unset::<T>(entity);
}

fn apply_tag<T: 'static + Send + Sync>(world: &mut World, entity: EntityId) {
    world.tag::<T>(entity);
}

fn apply_untag<T: 'static + Send + Sync>(world: &mut World, entity: EntityId) {
    world.untag::<T>(entity);
}

/// An ordered queue of deferred world mutations.
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Queue the creation of a new entity. Components and tags for it are
    /// added through the returned builder:
    ///
    /// ```ignore
    /// commands.create().set(Position { x: 0.0, y: 0.0 }).tag::<Debris>();
    /// ```
    pub fn create(&mut self) -> PendingEntity<'_> {
        self.commands.push(Command::Create {
            writes: Vec::new(),
            markers: Vec::new(),
        });
        let index = self.commands.len() - 1;
        PendingEntity {
            buffer: self,
            index,
        }
    }

    /// Queue the destruction of an entity.
    pub fn destroy(&mut self, entity: EntityId) {
        self.commands.push(Command::Destroy(entity));
    }

    /// Queue a component write on an existing entity.
    pub fn set<T: 'static + Send + Sync>(&mut self, entity: EntityId, value: T) {
        self.commands.push(Command::Set {
            entity,
            write: Write {
                value: Box::new(value),
                apply: apply_set::<T>,
            },
        });
    }

    /// Queue a component removal.
    pub fn unset<T: 'static + Send + Sync>(&mut self, entity: EntityId) {
        self.commands.push(Command::Unset {
            entity,
            apply: apply_unset::<T>,
        });
    }

    /// Queue attaching a tag.
    pub fn tag<T: 'static + Send + Sync>(&mut self, entity: EntityId) {
        self.commands.push(Command::Tag {
            entity,
            apply: apply_tag::<T>,
        });
    }

    /// Queue detaching a tag.
    pub fn untag<T: 'static + Send + Sync>(&mut self, entity: EntityId) {
        self.commands.push(Command::Untag {
            entity,
            apply: apply_untag::<T>,
        });
    }

    /// Apply every recorded command to the world, in recording order, and
    /// leave the buffer empty for reuse.
    pub fn apply(&mut self, world: &mut World) {
        for command in self.commands.drain(..) {
            match command {
                Command::Create { writes, markers } => {
                    let entity = world.create_entity();
                    for write in writes {
                        (write.apply)(world, entity, write.value);
                    }
                    for marker in markers {
                        marker(world, entity);
                    }
                }
                Command::Destroy(entity) => {
                    world.destroy_entity(entity);
                }
                Command::Set { entity, write } => {
                    (write.apply)(world, entity, write.value);
                }
                Command::Unset { entity, apply }
                | Command::Tag { entity, apply }
                | Command::Untag { entity, apply } => {
                    apply(world, entity);
                }
            }
        }
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop all queued commands without applying them.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for a queued entity creation. Lives only as long as the
/// borrow of its [`CommandBuffer`].
pub struct PendingEntity<'a> {
    buffer: &'a mut CommandBuffer,
    index: usize,
}

impl PendingEntity<'_> {
    /// Add a component to the pending entity.
    pub fn set<T: 'static + Send + Sync>(self, value: T) -> Self {
        let Command::Create { writes, .. } = &mut self.buffer.commands[self.index] else {
            unreachable!("pending entity points at a non-create command");
        };
        writes.push(Write {
            value: Box::new(value),
            apply: apply_set::<T>,
        });
        self
    }

    /// Add a tag to the pending entity.
    pub fn tag<T: 'static + Send + Sync>(self) -> Self {
        let Command::Create { markers, .. } = &mut self.buffer.commands[self.index] else {
            unreachable!("pending entity points at a non-create command");
        };
        markers.push(apply_tag::<T>);
        self
    }
}
