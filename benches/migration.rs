use std::hint::black_box;

use criterion::*;
use ecs_runtime::{EcsResult, Entity, World};

mod common;
use common::{Position, Velocity, AGENTS_MED};

#[derive(Clone, Copy)]
struct Marker;

/// Entities carrying only Position, so every add is a real archetype move.
fn setup_positions(agent_count: usize) -> EcsResult<(World, Vec<Entity>)> {
    let mut world = World::new();
    common::register_components(&mut world)?;
    world.register_tag::<Marker>()?;
    let mut entities = Vec::with_capacity(agent_count);
    for i in 0..agent_count {
        let bundle = world
            .bundle()
            .with(Position { x: i as f32, y: 0.0 })
            .finish()?;
        entities.push(world.create_entity(bundle)?);
    }
    Ok((world, entities))
}

fn migration_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("migration");

    group.bench_function("add_component_10k", |b| {
        b.iter_batched(
            || setup_positions(AGENTS_MED).expect("setup failed"),
            |(mut world, entities)| {
                for entity in &entities {
                    world
                        .add_component(*entity, Velocity { dx: 1.0, dy: 0.0 })
                        .expect("add failed");
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("add_remove_round_trip_10k", |b| {
        b.iter_batched(
            || setup_positions(AGENTS_MED).expect("setup failed"),
            |(mut world, entities)| {
                for entity in &entities {
                    world
                        .add_component(*entity, Velocity { dx: 1.0, dy: 0.0 })
                        .expect("add failed");
                }
                for entity in &entities {
                    world
                        .remove_component::<Velocity>(*entity)
                        .expect("remove failed");
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    // Tags carry no data; this isolates the row-move cost itself.
    group.bench_function("tag_toggle_10k", |b| {
        b.iter_batched(
            || setup_positions(AGENTS_MED).expect("setup failed"),
            |(mut world, entities)| {
                for entity in &entities {
                    world.add_component(*entity, Marker).expect("tag failed");
                }
                for entity in &entities {
                    world
                        .remove_component::<Marker>(*entity)
                        .expect("untag failed");
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("set_component_10k", |b| {
        let (mut world, entities) = setup_positions(AGENTS_MED).expect("setup failed");
        b.iter(|| {
            for entity in &entities {
                world
                    .set_component(*entity, Position { x: 1.0, y: 1.0 })
                    .expect("set failed");
            }
            black_box(&world);
        });
    });

    group.finish();
}

criterion_group!(benches, migration_benchmark);
criterion_main!(benches);
