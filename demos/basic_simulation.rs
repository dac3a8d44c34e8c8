//! Basic physics simulation example
//!
//! A ball and a box fall onto a ground plane. Contact events are printed
//! as they happen. Run with `RUST_LOG=debug` to see the engine's log.

use std::f32::consts::FRAC_PI_2;

use tumble::prelude::*;

fn main() {
    env_logger::init();

    println!("Tumble - Basic Simulation Example");
    println!("=================================\n");

    let config = WorldConfig::default()
        .with_gravity(Vec3::new(0.0, -9.81, 0.0))
        .with_sleep(true);
    let mut world = World::new(config);

    let floor = world.add_body(
        Body::fixed()
            .with_shape(Shape::plane())
            .with_rotation(Quat::from_axis_angle(Vec3::X, -FRAC_PI_2)),
    );
    println!("Created ground plane {:?} at Y=0", floor);

    let ball = world.add_body(
        Body::dynamic(1.0)
            .with_shape(Shape::sphere(0.5).expect("valid radius"))
            .with_position(Vec3::new(0.0, 5.0, 0.0)),
    );
    let crate_box = world.add_body(
        Body::dynamic(2.0)
            .with_shape(Shape::cuboid(Vec3::splat(0.5)).expect("valid extents"))
            .with_position(Vec3::new(2.0, 3.0, 0.0))
            .with_rotation(Quat::from_axis_angle(Vec3::new(1.0, 0.0, 1.0).normalize(), 0.4)),
    );
    println!("Created ball {:?} at Y=5.0 and box {:?} at Y=3.0\n", ball, crate_box);

    let dt = 1.0 / 60.0;
    let total_time = 4.0;
    let steps = (total_time / dt) as usize;

    println!("Simulating {} seconds ({} steps at {}Hz)...\n", total_time, steps, 1.0 / dt);

    for i in 0..steps {
        world.step(dt);

        for event in world.drain_events() {
            match event {
                WorldEvent::BeginContact { body_a, body_b } => {
                    println!("t={:.2}s: {:?} started touching {:?}", i as f32 * dt, body_a, body_b)
                }
                WorldEvent::Sleep { body } => println!("t={:.2}s: {:?} fell asleep", i as f32 * dt, body),
                _ => {}
            }
        }

        if i % 30 == 0 {
            if let Some(body) = world.body(ball) {
                let pos = body.position();
                let vel = body.velocity;
                println!(
                    "t={:.2}s: ball position=({:.3}, {:.3}, {:.3}), velocity=({:.3}, {:.3}, {:.3})",
                    i as f32 * dt,
                    pos.x,
                    pos.y,
                    pos.z,
                    vel.x,
                    vel.y,
                    vel.z
                );
            }
        }
    }

    for (name, id) in [("ball", ball), ("box", crate_box)] {
        if let Some(body) = world.body(id) {
            let pos = body.position();
            println!(
                "\nFinal {} position: ({:.3}, {:.3}, {:.3}), {:?}",
                name,
                pos.x,
                pos.y,
                pos.z,
                body.sleep_state()
            );
        }
    }
    println!("Expected resting height: ~0.5 for both (half size above the ground)");
}
