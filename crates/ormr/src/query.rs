//! # Query — Filtered Iteration Over the Archetype Graph
//!
//! A query is a with/without filter plus an iteration driver. Configure the
//! filter fluently, then hand `for_each` a closure:
//!
//! ```text
//! world.query()
//!     .without::<Anchor>()
//!     .for_each::<(&mut Position, &Velocity)>(|entity, (pos, vel)| {
//!         pos.x += vel.dx;
//!     });
//!
//! 1. The queried component ids are unioned into the `with` set.
//! 2. Matching archetypes are found by BFS over the add-edge graph.
//! 3. Per archetype: extract the needed columns, walk every occupied row,
//!    invoke the closure, restore the columns.
//! ```
//!
//! Every arity runs the same filtered traversal, so a query can never reach
//! an archetype that lacks one of its requested columns — declaring
//! `.with::<T>()` for queried types is implied, not required.
//!
//! ## Closure-Based Design
//!
//! Rust's `Iterator` trait can't express "yielded items borrow from the
//! iterator" (lending iterators). Instead of unsafe pointer juggling, the
//! needed columns are temporarily removed from the archetype's column map —
//! giving owned access the borrow checker accepts — and put back after the
//! rows are walked.
//!
//! ## The `QueryParam` Trait
//!
//! Any "fetchable thing" implements [`QueryParam`]: `&T` reads, `&mut T`
//! writes, and tuples of params are themselves params, so `(&A, &mut B)`
//! just works. Row visit order follows the archetype's row index; archetype
//! visit order is BFS graph order.

use std::collections::HashMap;

use crate::component::{ComponentId, DataBuffer, TypeRegistry};
use crate::entity::EntityId;
use crate::world::World;

/// Trait for things that can be fetched from an archetype's columns.
///
/// Implemented for `&T` (shared read) and `&mut T` (exclusive write), and
/// for tuples of params up to eight elements.
pub trait QueryParam {
    /// The item yielded per entity.
    type Item<'w>;

    /// Owned column data extracted from the archetype while iterating.
    type Column;

    /// Register (or look up) the component ids this param reads or writes.
    fn component_ids(registry: &mut TypeRegistry) -> Vec<ComponentId>;

    /// Extract the needed column(s) from the archetype's column map.
    fn extract(
        columns: &mut HashMap<ComponentId, DataBuffer>,
        registry: &TypeRegistry,
    ) -> Self::Column;

    /// Restore the column(s) into the archetype's column map.
    fn restore(column: Self::Column, columns: &mut HashMap<ComponentId, DataBuffer>);

    /// Fetch the item for the entity stored at `row`.
    fn fetch(column: &mut Self::Column, row: u32) -> Self::Item<'_>;
}

fn extract_column<T: 'static>(
    columns: &mut HashMap<ComponentId, DataBuffer>,
    registry: &TypeRegistry,
) -> (ComponentId, DataBuffer) {
    let id = registry.lookup::<T>().unwrap_or_else(|| {
        panic!(
            "query extract: `{}` is not registered",
            std::any::type_name::<T>()
        )
    });
    let column = columns.remove(&id).unwrap_or_else(|| {
        panic!(
            "query extract: column for `{}` not found in archetype",
            std::any::type_name::<T>()
        )
    });
    (id, column)
}

/// Shared read access to a component.
impl<T: 'static + Send + Sync> QueryParam for &T {
    type Item<'w> = &'w T;
    type Column = (ComponentId, DataBuffer);

    fn component_ids(registry: &mut TypeRegistry) -> Vec<ComponentId> {
        vec![registry.register::<T>()]
    }

    fn extract(
        columns: &mut HashMap<ComponentId, DataBuffer>,
        registry: &TypeRegistry,
    ) -> Self::Column {
        extract_column::<T>(columns, registry)
    }

    fn restore(column: Self::Column, columns: &mut HashMap<ComponentId, DataBuffer>) {
        columns.insert(column.0, column.1);
    }

    fn fetch(column: &mut Self::Column, row: u32) -> Self::Item<'_> {
        column.1.get::<T>(row)
    }
}

/// Exclusive write access to a component.
impl<T: 'static + Send + Sync> QueryParam for &mut T {
    type Item<'w> = &'w mut T;
    type Column = (ComponentId, DataBuffer);

    fn component_ids(registry: &mut TypeRegistry) -> Vec<ComponentId> {
        vec![registry.register::<T>()]
    }

    fn extract(
        columns: &mut HashMap<ComponentId, DataBuffer>,
        registry: &TypeRegistry,
    ) -> Self::Column {
        extract_column::<T>(columns, registry)
    }

    fn restore(column: Self::Column, columns: &mut HashMap<ComponentId, DataBuffer>) {
        columns.insert(column.0, column.1);
    }

    fn fetch(column: &mut Self::Column, row: u32) -> Self::Item<'_> {
        column.1.get_mut::<T>(row)
    }
}

macro_rules! impl_query_param_tuple {
    ($($P:ident),+) => {
        impl<$($P: QueryParam),+> QueryParam for ($($P,)+) {
            type Item<'w> = ($($P::Item<'w>,)+);
            type Column = ($($P::Column,)+);

            fn component_ids(registry: &mut TypeRegistry) -> Vec<ComponentId> {
                let mut ids = Vec::new();
                $(ids.extend($P::component_ids(registry));)+
                ids
            }

            #[allow(non_snake_case)]
            fn extract(
                columns: &mut HashMap<ComponentId, DataBuffer>,
                registry: &TypeRegistry,
            ) -> Self::Column {
                ($($P::extract(columns, registry),)+)
            }

            #[allow(non_snake_case)]
            fn restore(column: Self::Column, columns: &mut HashMap<ComponentId, DataBuffer>) {
                let ($($P,)+) = column;
                $($P::restore($P, columns);)+
            }

            #[allow(non_snake_case)]
            fn fetch(column: &mut Self::Column, row: u32) -> Self::Item<'_> {
                let ($($P,)+) = column;
                ($($P::fetch($P, row),)+)
            }
        }
    };
}

impl_query_param_tuple!(A);
impl_query_param_tuple!(A, B);
impl_query_param_tuple!(A, B, C);
impl_query_param_tuple!(A, B, C, D);
impl_query_param_tuple!(A, B, C, D, E);
impl_query_param_tuple!(A, B, C, D, E, F);
impl_query_param_tuple!(A, B, C, D, E, F, G);
impl_query_param_tuple!(A, B, C, D, E, F, G, H);

/// A read-oriented, fluent view over a [`World`]: with/without filters plus
/// an iteration driver. Stateless between calls — each `for_each` resolves
/// matching archetypes fresh.
///
/// The world is exclusively borrowed for the query's lifetime, which is what
/// makes handing out `&mut T` items sound — and what makes structural
/// changes from inside the callback impossible to compile. Queue those on a
/// [`CommandBuffer`](crate::command::CommandBuffer) instead.
pub struct Query<'w> {
    world: &'w mut World,
    with: Vec<ComponentId>,
    without: Vec<ComponentId>,
}

impl<'w> Query<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        Self {
            world,
            with: Vec::new(),
            without: Vec::new(),
        }
    }

    /// Require the data component `T` on matching archetypes.
    pub fn with<T: 'static + Send + Sync>(mut self) -> Self {
        let id = self.world.registry_mut().register::<T>();
        self.with.push(id);
        self
    }

    /// Require the tag `T` on matching archetypes.
    pub fn with_tag<T: 'static + Send + Sync>(mut self) -> Self {
        let id = self.world.registry_mut().register_tag::<T>();
        self.with.push(id);
        self
    }

    /// Exclude archetypes carrying the data component `T`.
    pub fn without<T: 'static + Send + Sync>(mut self) -> Self {
        let id = self.world.registry_mut().register::<T>();
        self.without.push(id);
        self
    }

    /// Exclude archetypes carrying the tag `T`.
    pub fn without_tag<T: 'static + Send + Sync>(mut self) -> Self {
        let id = self.world.registry_mut().register_tag::<T>();
        self.without.push(id);
        self
    }

    /// Run the query, invoking `f` once per occupied row of every matching
    /// archetype with references straight into columnar storage.
    ///
    /// `Q` is a tuple of `&T` / `&mut T` accesses; its component ids are
    /// unioned into the `with` filter before matching.
    pub fn for_each<Q: QueryParam>(self, mut f: impl FnMut(EntityId, Q::Item<'_>)) {
        let Query {
            world,
            mut with,
            without,
        } = self;

        for id in Q::component_ids(world.registry_mut()) {
            if !with.contains(&id) {
                with.push(id);
            }
        }

        let matching = world.archetypes(&with, &without);
        for archetype_id in matching {
            let (archetype, registry) = world.archetype_and_registry(archetype_id);
            let mut columns = Q::extract(archetype.columns_mut(), registry);
            for (&entity, &row) in archetype.row_index() {
                f(entity, Q::fetch(&mut columns, row));
            }
            Q::restore(columns, archetype.columns_mut());
        }
    }

    /// Collect the entities matching the filters, without touching any
    /// column. Useful for tag-only queries.
    pub fn entities(self) -> Vec<EntityId> {
        let Query {
            world,
            with,
            without,
        } = self;
        world
            .archetypes(&with, &without)
            .into_iter()
            .flat_map(|id| world.archetype(id).entities())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    #[derive(Debug, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }
    struct Anchor;

    #[test]
    fn single_component_query() {
        // Entities shaped {int}, {String}, {}, {int}: only the ints match.
        let mut world = World::new();
        let e1 = world.create_entity();
        world.set(e1, 1i32);
        let e2 = world.create_entity();
        world.set(e2, String::from("two"));
        let _e3 = world.create_entity();
        let e4 = world.create_entity();
        world.set(e4, 4i32);

        let mut seen = Vec::new();
        world.query().with::<i32>().for_each::<(&i32,)>(|entity, (value,)| {
            seen.push((entity, *value));
        });

        assert_eq!(seen.len(), 2);
        seen.sort_by_key(|&(_, v)| v);
        assert_eq!(seen[0], (e1, 1));
        assert_eq!(seen[1], (e4, 4));
    }

    #[test]
    fn queried_types_are_implied_filters() {
        let mut world = World::new();
        let both = world.create_entity();
        world.set(both, Position { x: 0.0, y: 0.0 });
        world.set(both, Velocity { dx: 1.0, dy: 1.0 });
        let position_only = world.create_entity();
        world.set(position_only, Position { x: 9.0, y: 9.0 });

        // No explicit .with() calls: the tuple's types are the filter.
        let mut seen = Vec::new();
        world
            .query()
            .for_each::<(&Position, &Velocity)>(|entity, (_, _)| {
                seen.push(entity);
            });

        assert_eq!(seen, vec![both]); // position_only is filtered out, not a fault
    }

    #[test]
    fn mutation_lands_in_storage() {
        let mut world = World::new();
        let e = world.create_entity();
        world.set(e, Position { x: 0.0, y: 0.0 });
        world.set(e, Velocity { dx: 1.0, dy: 2.0 });

        world
            .query()
            .for_each::<(&mut Position, &Velocity)>(|_, (pos, vel)| {
                pos.x += vel.dx;
                pos.y += vel.dy;
            });

        assert_eq!(world.get::<Position>(e), &Position { x: 1.0, y: 2.0 });
    }

    #[test]
    fn without_excludes() {
        let mut world = World::new();
        let plain = world.create_entity();
        world.set(plain, Position { x: 0.0, y: 0.0 });
        let moving = world.create_entity();
        world.set(moving, Position { x: 0.0, y: 0.0 });
        world.set(moving, Velocity { dx: 0.0, dy: 0.0 });

        let mut seen = Vec::new();
        world
            .query()
            .without::<Velocity>()
            .for_each::<(&Position,)>(|entity, _| {
                seen.push(entity);
            });

        assert_eq!(seen, vec![plain]);
    }

    #[test]
    fn tag_filters() {
        let mut world = World::new();
        let anchored = world.create_entity();
        world.set(anchored, Position { x: 0.0, y: 0.0 });
        world.tag::<Anchor>(anchored);
        let free = world.create_entity();
        world.set(free, Position { x: 0.0, y: 0.0 });

        let mut seen = Vec::new();
        world
            .query()
            .with_tag::<Anchor>()
            .for_each::<(&Position,)>(|entity, _| {
                seen.push(entity);
            });
        assert_eq!(seen, vec![anchored]);

        let mut seen = Vec::new();
        world
            .query()
            .without_tag::<Anchor>()
            .for_each::<(&Position,)>(|entity, _| {
                seen.push(entity);
            });
        assert_eq!(seen, vec![free]);
    }

    #[test]
    fn entities_for_tag_only_queries() {
        let mut world = World::new();
        let a = world.create_entity();
        world.tag::<Anchor>(a);
        let b = world.create_entity();
        world.tag::<Anchor>(b);
        let _plain = world.create_entity();

        let mut found = world.query().with_tag::<Anchor>().entities();
        found.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn destroyed_entities_are_not_visited() {
        let mut world = World::new();
        let keep = world.create_entity();
        world.set(keep, 1i32);
        let gone = world.create_entity();
        world.set(gone, 2i32);
        world.destroy_entity(gone);

        let mut seen = Vec::new();
        world.query().for_each::<(&i32,)>(|entity, (value,)| {
            seen.push((entity, *value));
        });
        assert_eq!(seen, vec![(keep, 1)]);
    }

    #[test]
    fn empty_world_queries_are_empty() {
        let mut world = World::new();
        let mut calls = 0;
        world.query().for_each::<(&Position,)>(|_, _| calls += 1);
        assert_eq!(calls, 0);
        assert!(world.query().with::<Position>().entities().is_empty());
    }

    #[test]
    fn three_component_arity() {
        let mut world = World::new();
        let e = world.create_entity();
        world.set(e, Position { x: 1.0, y: 0.0 });
        world.set(e, Velocity { dx: 2.0, dy: 0.0 });
        world.set(e, 3i32);

        let mut seen = 0;
        world
            .query()
            .for_each::<(&Position, &Velocity, &i32)>(|_, (pos, vel, n)| {
                assert_eq!(pos.x, 1.0);
                assert_eq!(vel.dx, 2.0);
                assert_eq!(*n, 3);
                seen += 1;
            });
        assert_eq!(seen, 1);
    }
}
