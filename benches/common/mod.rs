#![allow(dead_code)]

use ecs_runtime::{EcsResult, World};

pub const AGENTS_SMALL: usize = 1_000;
pub const AGENTS_MED: usize = 10_000;
pub const AGENTS_LARGE: usize = 100_000;

#[derive(Clone, Copy)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Clone, Copy)]
pub struct Wealth {
    pub value: f32,
}

pub fn register_components(world: &mut World) -> EcsResult<()> {
    world.register_component::<Position>()?;
    world.register_component::<Velocity>()?;
    world.register_component::<Wealth>()?;
    Ok(())
}

/// A world of `agent_count` entities carrying all three components.
pub fn setup_world(agent_count: usize) -> EcsResult<World> {
    let mut world = World::new();
    register_components(&mut world)?;
    populate(&mut world, agent_count)?;
    Ok(world)
}

pub fn populate(world: &mut World, agent_count: usize) -> EcsResult<()> {
    for i in 0..agent_count {
        let bundle = world
            .bundle()
            .with(Position { x: i as f32, y: 0.0 })
            .with(Velocity { dx: 1.0, dy: 0.5 })
            .with(Wealth { value: 100.0 })
            .finish()?;
        world.create_entity(bundle)?;
    }
    Ok(())
}
