use ecs_runtime::{
    CommandBuffer, EcsResult, FlushPolicy, FlushReport, TaggingOps, World, WorldError,
};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Mass(f32);

#[test]
fn deferred_spawn_applies_at_flush() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Position>()?;
    world.register_component::<Mass>()?;

    let mut commands = CommandBuffer::new();
    commands
        .spawn()
        .with(Position { x: 1.0, y: 2.0 })
        .with(Mass(3.0))
        .named("cargo")
        .record();

    // Nothing happens until the flush point.
    assert_eq!(commands.len(), 1);
    assert_eq!(world.entity_count(), 0);

    let report = commands.flush(&mut world)?;
    assert_eq!(report, FlushReport { applied: 1, skipped: 0 });

    let entity = world.find_by_name("cargo").expect("spawn was recorded");
    assert_eq!(
        world.get_component::<Position>(entity)?,
        Some(&Position { x: 1.0, y: 2.0 })
    );
    assert_eq!(world.get_component::<Mass>(entity)?, Some(&Mass(3.0)));
    Ok(())
}

#[test]
fn flush_consumes_the_buffer() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Mass>()?;

    let entity = world.create_empty()?;
    let mut commands = CommandBuffer::new();
    commands.add(entity, Mass(1.0));

    let report = commands.flush(&mut world)?;
    assert_eq!(report.applied, 1);
    assert!(commands.is_empty());

    // A second flush replays nothing.
    let report = commands.flush(&mut world)?;
    assert_eq!(report, FlushReport::default());
    assert_eq!(world.get_component::<Mass>(entity)?, Some(&Mass(1.0)));
    Ok(())
}

#[test]
fn deferred_mutations_apply_in_recording_order() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Mass>()?;

    let entity = world.create_empty()?;
    let mut commands = CommandBuffer::new();
    commands.add(entity, Mass(1.0));
    commands.set(entity, Mass(2.0));
    commands.remove::<Mass>(entity);
    commands.add(entity, Mass(3.0));

    let report = commands.flush(&mut world)?;
    assert_eq!(report.applied, 4);
    assert_eq!(world.get_component::<Mass>(entity)?, Some(&Mass(3.0)));
    Ok(())
}

#[test]
fn skip_missing_tolerates_vanished_targets() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Mass>()?;

    let doomed = world.create_empty()?;
    let survivor = world.create_empty()?;

    let mut commands = CommandBuffer::new();
    commands.add(doomed, Mass(1.0));
    commands.add(survivor, Mass(2.0));

    // The target disappears between recording and flushing.
    world.destroy_entity(doomed)?;

    let report = commands.flush(&mut world)?;
    assert_eq!(report, FlushReport { applied: 1, skipped: 1 });
    assert_eq!(world.get_component::<Mass>(survivor)?, Some(&Mass(2.0)));
    Ok(())
}

#[test]
fn skip_missing_covers_every_stale_target_shape() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Mass>()?;

    let doomed = world.create_empty()?;
    let massless = world.create_empty()?;
    let massive = world.create_empty()?;
    world.add_component(massive, Mass(1.0))?;

    let mut commands = CommandBuffer::new();
    commands.despawn(doomed); // dead destroy is a world-level no-op, applied
    commands.remove::<Mass>(doomed); // stale handle, skipped
    commands.set(doomed, Mass(9.0)); // stale handle, skipped
    commands.set(massless, Mass(9.0)); // component absent, skipped
    commands.add(massive, Mass(9.0)); // component present, skipped
    world.destroy_entity(doomed)?;

    let report = commands.flush(&mut world)?;
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 4);
    assert_eq!(world.get_component::<Mass>(massive)?, Some(&Mass(1.0)));
    Ok(())
}

#[test]
fn strict_policy_aborts_and_discards_the_remainder() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Mass>()?;

    let doomed = world.create_empty()?;
    let survivor = world.create_empty()?;

    let mut commands = CommandBuffer::with_policy(FlushPolicy::Strict);
    commands.add(doomed, Mass(1.0));
    commands.add(survivor, Mass(2.0));
    world.destroy_entity(doomed)?;

    let err = commands.flush(&mut world).unwrap_err();
    assert!(matches!(err, WorldError::Stale(_)));

    // The unapplied remainder is discarded, never replayed.
    assert!(commands.is_empty());
    assert_eq!(world.get_component::<Mass>(survivor)?, None);
    Ok(())
}

#[test]
fn validation_failures_abort_even_under_skip_missing() -> EcsResult<()> {
    use ecs_runtime::ComponentSpec;

    let mut world = World::new();
    world.register_component_with(
        ComponentSpec::<Mass>::new().predicate(|_, _, mass| mass.0 > 0.0),
    )?;

    let entity = world.create_empty()?;
    let other = world.create_empty()?;

    let mut commands = CommandBuffer::new();
    commands.add(entity, Mass(-1.0));
    commands.add(other, Mass(5.0));

    let err = commands.flush(&mut world).unwrap_err();
    assert!(matches!(err, WorldError::Validation(_)));
    assert!(commands.is_empty());
    assert_eq!(world.get_component::<Mass>(other)?, None);
    Ok(())
}

#[test]
fn clear_drops_pending_commands() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Mass>()?;

    let entity = world.create_empty()?;
    let mut commands = CommandBuffer::new();
    commands.add(entity, Mass(1.0));
    commands.clear();
    assert!(commands.is_empty());

    let report = commands.flush(&mut world)?;
    assert_eq!(report, FlushReport::default());
    assert_eq!(world.get_component::<Mass>(entity)?, None);
    Ok(())
}

#[test]
fn deferred_destroy_takes_effect_at_flush() -> EcsResult<()> {
    let mut world = World::new();

    let entity = world.create_empty()?;
    let mut commands = CommandBuffer::new();
    commands.despawn(entity);

    assert!(world.is_alive(entity));
    commands.flush(&mut world)?;
    assert!(!world.is_alive(entity));
    Ok(())
}

#[test]
fn spawn_components_resolve_against_the_flushing_world() -> EcsResult<()> {
    let mut world = World::new();

    // Record the spawn before Mass is registered anywhere.
    let mut commands = CommandBuffer::new();
    commands.spawn().with(Mass(4.0)).record();

    world.register_component::<Mass>()?;
    let report = commands.flush(&mut world)?;
    assert_eq!(report.applied, 1);
    assert_eq!(world.entity_count(), 1);
    Ok(())
}
