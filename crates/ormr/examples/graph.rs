//! Build a few entity shapes and dump the resulting archetype graph.

use ormr::World;

#[derive(Debug)]
struct Position {
    x: f32,
}
#[derive(Debug)]
struct Rotation {
    angle: f32,
}
#[derive(Debug)]
struct Velocity {
    dx: f32,
}
struct Frozen;

fn main() {
    env_logger::init();

    let mut world = World::new();

    let a = world.create_entity();
    world
        .set(a, Position { x: 0.0 })
        .set(a, Rotation { angle: 0.0 })
        .set(a, Velocity { dx: 0.0 });

    let b = world.create_entity();
    world.set(b, Position { x: 1.0 }).set(b, Velocity { dx: 1.0 });

    let c = world.create_entity();
    world.set(c, Velocity { dx: 2.0 });
    world.tag::<Frozen>(c);

    println!("{}", world.to_graph_string());

    println!("add-edges in BFS order:");
    for edge in world.archetype_graph() {
        println!(
            "  {} --{}--> {}",
            edge.from,
            world.registry().describe(edge.via),
            edge.to
        );
    }

    println!(
        "entity a carries {:?}, {:?}, {:?}",
        world.get::<Position>(a),
        world.get::<Rotation>(a),
        world.get::<Velocity>(a)
    );
}
