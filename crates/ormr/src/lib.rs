//! # Ormr — Archetype ECS Storage Engine
//!
//! A deliberately small Entity Component System built around the archetype
//! pattern used by [hecs](https://github.com/Ralith/hecs) and
//! [bevy_ecs](https://github.com/bevyengine/bevy): entities sharing a
//! structural signature live together in columnar storage, and the
//! signatures form a graph connected by "add one type" / "remove one type"
//! edges that queries traverse.
//!
//! ```ignore
//! use ormr::World;
//!
//! struct Position { x: f32, y: f32 }
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut world = World::new();
//! let e = world.create_entity();
//! world.set(e, Position { x: 0.0, y: 0.0 })
//!      .set(e, Velocity { dx: 1.0, dy: 0.0 });
//!
//! world.query().for_each::<(&mut Position, &Velocity)>(|_, (pos, vel)| {
//!     pos.x += vel.dx;
//!     pos.y += vel.dy;
//! });
//! ```
//!
//! ## Module Overview
//!
//! - [`entity`] — packed generational entity ids and the per-world allocator
//! - [`component`] — component ids, the interning type registry, type-erased
//!   columns
//! - [`archetype`] — entities grouped by structural signature; graph edges
//! - [`world`] — the central container and the archetype-graph traversals
//! - [`query`] — filtered, closure-based iteration over matching archetypes
//! - [`command`] — deferred structural mutations for use during iteration
//! - [`events`] — double-buffered event queues

pub mod archetype;
pub mod command;
pub mod component;
pub mod entity;
pub mod events;
pub(crate) mod pool;
pub mod query;
pub mod world;

pub use archetype::{Archetype, ArchetypeEdge, ArchetypeId, Signature};
pub use command::CommandBuffer;
pub use component::{ComponentId, ComponentKind, DataBuffer, TypeRegistry};
pub use entity::{Entity, EntityId};
pub use events::Events;
pub use query::{Query, QueryParam};
pub use world::{GraphEdge, World, WorldId, Worlds};
