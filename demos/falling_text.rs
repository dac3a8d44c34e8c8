//! Falling text example
//!
//! Each letter of a word is a box dropped onto the ground. A renderer
//! would draw the letters at their interpolated poses; here the frame
//! loop runs at an uneven rate and prints the poses instead. A ray cast
//! from above stands in for picking a letter with the pointer.

use std::f32::consts::FRAC_PI_2;

use tumble::prelude::*;

const WORD: &str = "TUMBLE";
const LETTER_SIZE: Vec3 = Vec3::new(0.35, 0.5, 0.1);
const FIXED_DT: f32 = 1.0 / 60.0;
const MAX_SUBSTEPS: u32 = 5;

fn main() {
    env_logger::init();

    let mut world = World::new(
        WorldConfig::default()
            .with_gravity(Vec3::new(0.0, -9.81, 0.0))
            .with_broadphase(BroadphaseKind::NaiveAabb)
            .with_sleep(true),
    );

    let bouncy = world.add_material(Material::new("letter").with_restitution(0.3));
    let ground_material = world.add_material(Material::new("ground"));
    world.add_contact_material(
        ContactMaterial::new(bouncy, ground_material)
            .with_friction(0.6)
            .with_restitution(0.3),
    );

    world.add_body(
        Body::fixed()
            .with_shape(Shape::plane())
            .with_rotation(Quat::from_axis_angle(Vec3::X, -FRAC_PI_2))
            .with_material(ground_material),
    );

    let letters: Vec<(char, BodyId)> = WORD
        .chars()
        .enumerate()
        .map(|(i, letter)| {
            let x = (i as f32 - WORD.len() as f32 / 2.0) * 0.8;
            let tilt = Quat::from_axis_angle(Vec3::Z, 0.15 * (i as f32 - 2.5));
            let body = Body::dynamic(1.0)
                .with_shape(Shape::cuboid(LETTER_SIZE).expect("valid letter extents"))
                .with_position(Vec3::new(x, 4.0 + i as f32 * 0.6, 0.0))
                .with_rotation(tilt)
                .with_material(bouncy);
            (letter, world.add_body(body))
        })
        .collect();

    // Uneven frame times, as a browser or game loop would deliver them
    let frame_times = [0.016, 0.021, 0.013, 0.034, 0.016, 0.017];
    let mut clock = 0.0;
    for frame in 0..240 {
        let elapsed = frame_times[frame % frame_times.len()];
        clock += elapsed;
        let substeps = world.step_accumulated(FIXED_DT, elapsed, MAX_SUBSTEPS);

        if frame % 40 == 0 {
            println!("frame {:3} (t={:.2}s, {} substeps)", frame, clock, substeps);
            for (letter, id) in &letters {
                if let Some(body) = world.body(*id) {
                    let p = body.interpolated_position();
                    println!("  {} at ({:6.2}, {:5.2}) {:?}", letter, p.x, p.y, body.sleep_state());
                }
            }
        }
        world.drain_events().for_each(drop);
    }

    let pick = world.raycast_closest(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -1.0, 0.0), RaycastOptions::default());
    match pick.and_then(|hit| letters.iter().find(|(_, id)| *id == hit.body).map(|(c, _)| (*c, hit))) {
        Some((letter, hit)) => println!("\npointer at x=0 picks '{}' at height {:.2}", letter, hit.hit_point.y),
        None => println!("\npointer at x=0 hits only the ground"),
    }
}
