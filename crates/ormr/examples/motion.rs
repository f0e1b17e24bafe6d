//! Particles under gravity — spawn, integrate with a query, despawn through
//! a command buffer when they fall off the bottom.

use ormr::{CommandBuffer, World};

#[derive(Debug)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug)]
struct Velocity {
    dx: f32,
    dy: f32,
}

/// Marker for particles that ignore gravity.
struct Anchored;

fn main() {
    env_logger::init();

    let mut world = World::new();

    for i in 0..32 {
        let e = world.create_entity();
        world
            .set(
                e,
                Position {
                    x: i as f32 * 4.0,
                    y: 100.0,
                },
            )
            .set(
                e,
                Velocity {
                    dx: 0.0,
                    dy: -(1.0 + i as f32 * 0.5),
                },
            );
        if i % 8 == 0 {
            world.tag::<Anchored>(e);
        }
    }

    let mut commands = CommandBuffer::new();
    for step in 0..60 {
        world
            .query()
            .without_tag::<Anchored>()
            .for_each::<(&mut Position, &Velocity)>(|entity, (pos, vel)| {
                pos.x += vel.dx;
                pos.y += vel.dy;
                if pos.y < 0.0 {
                    commands.destroy(entity);
                }
            });
        commands.apply(&mut world);

        if step % 10 == 0 {
            println!("step {:2}: {} particles alive", step, world.entity_count());
        }
    }

    println!("done: {} particles left", world.entity_count());
}
