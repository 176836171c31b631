use std::hint::black_box;

use criterion::*;
use ecs_runtime::{CommandBuffer, World};

mod common;
use common::{populate, register_components, Position, AGENTS_MED};

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    group.bench_function("create_10k_three_components", |b| {
        b.iter(|| {
            let mut world = World::new();
            register_components(&mut world).expect("registration failed");
            populate(&mut world, AGENTS_MED).expect("spawn failed in benchmark");
            black_box(world);
        });
    });

    group.bench_function("create_10k_single_component", |b| {
        b.iter(|| {
            let mut world = World::new();
            register_components(&mut world).expect("registration failed");
            for i in 0..AGENTS_MED {
                let bundle = world
                    .bundle()
                    .with(Position { x: i as f32, y: 0.0 })
                    .finish()
                    .expect("bundle build failed");
                world.create_entity(bundle).expect("spawn failed in benchmark");
            }
            black_box(world);
        });
    });

    group.bench_function("deferred_create_10k_via_flush", |b| {
        b.iter(|| {
            let mut world = World::new();
            register_components(&mut world).expect("registration failed");
            let mut commands = CommandBuffer::new();
            for i in 0..AGENTS_MED {
                commands
                    .spawn()
                    .with(Position { x: i as f32, y: 0.0 })
                    .record();
            }
            commands.flush(&mut world).expect("flush failed in benchmark");
            black_box(world);
        });
    });

    group.bench_function("destroy_10k", |b| {
        b.iter_batched(
            || {
                let world = common::setup_world(AGENTS_MED).expect("setup failed");
                let entities: Vec<_> = world.query().iter(&world).collect();
                (world, entities)
            },
            |(mut world, entities)| {
                for entity in entities {
                    world.destroy_entity(entity).expect("destroy failed");
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
