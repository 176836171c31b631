use ecs_runtime::{ComponentSpec, EcsResult, World, WorldError};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Mass(f32);

#[derive(Clone, Copy, Debug, PartialEq)]
struct Frozen;

#[test]
fn component_set_tracks_adds_and_removes() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Position>()?;
    world.register_component::<Velocity>()?;
    world.register_component::<Mass>()?;

    let bundle = world.bundle().with(Position { x: 0.0, y: 0.0 }).finish()?;
    let entity = world.create_entity(bundle)?;

    world.add_component(entity, Velocity { dx: 1.0, dy: 1.0 })?;
    world.add_component(entity, Mass(2.0))?;
    assert!(world.remove_component::<Velocity>(entity)?);

    assert!(world.has_component::<Position>(entity)?);
    assert!(!world.has_component::<Velocity>(entity)?);
    assert!(world.has_component::<Mass>(entity)?);
    assert_eq!(world.components_of(entity)?.len(), 2);
    Ok(())
}

#[test]
fn migration_preserves_untouched_values() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Position>()?;
    world.register_component::<Velocity>()?;
    world.register_component::<Mass>()?;

    let bundle = world
        .bundle()
        .with(Position { x: 1.0, y: 2.0 })
        .with(Mass(9.5))
        .finish()?;
    let entity = world.create_entity(bundle)?;

    // Moving the row out to {Position, Mass, Velocity} and back must carry
    // every shared column value unchanged.
    world.add_component(entity, Velocity { dx: 0.1, dy: 0.2 })?;
    assert_eq!(
        world.get_component::<Position>(entity)?,
        Some(&Position { x: 1.0, y: 2.0 })
    );
    assert_eq!(world.get_component::<Mass>(entity)?, Some(&Mass(9.5)));

    assert!(world.remove_component::<Velocity>(entity)?);
    assert_eq!(
        world.get_component::<Position>(entity)?,
        Some(&Position { x: 1.0, y: 2.0 })
    );
    assert_eq!(world.get_component::<Mass>(entity)?, Some(&Mass(9.5)));
    assert_eq!(world.get_component::<Velocity>(entity)?, None);
    Ok(())
}

#[test]
fn removing_the_last_component_keeps_the_entity_alive() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Position>()?;

    let bundle = world.bundle().with(Position { x: 0.0, y: 0.0 }).finish()?;
    let entity = world.create_entity(bundle)?;

    assert!(world.remove_component::<Position>(entity)?);
    assert!(world.is_alive(entity));
    assert!(world.components_of(entity)?.is_empty());

    // And components can come back afterwards.
    world.add_component(entity, Position { x: 7.0, y: 7.0 })?;
    assert_eq!(
        world.get_component::<Position>(entity)?,
        Some(&Position { x: 7.0, y: 7.0 })
    );
    Ok(())
}

#[test]
fn duplicate_add_is_rejected_without_clobbering() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Mass>()?;

    let bundle = world.bundle().with(Mass(1.0)).finish()?;
    let entity = world.create_entity(bundle)?;

    let err = world.add_component(entity, Mass(99.0)).unwrap_err();
    assert!(matches!(err, WorldError::AlreadyPresent(_)));
    assert_eq!(world.get_component::<Mass>(entity)?, Some(&Mass(1.0)));
    Ok(())
}

#[test]
fn set_replaces_and_returns_the_previous_value() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Mass>()?;

    let bundle = world.bundle().with(Mass(1.0)).finish()?;
    let entity = world.create_entity(bundle)?;

    let previous = world.set_component(entity, Mass(2.0))?;
    assert_eq!(previous, Mass(1.0));
    assert_eq!(world.get_component::<Mass>(entity)?, Some(&Mass(2.0)));
    Ok(())
}

#[test]
fn set_on_an_absent_component_is_an_error() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Mass>()?;

    let entity = world.create_empty()?;
    let err = world.set_component(entity, Mass(1.0)).unwrap_err();
    assert!(matches!(err, WorldError::NotPresent(_)));
    Ok(())
}

#[test]
fn remove_of_an_absent_component_reports_false() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Mass>()?;

    let entity = world.create_empty()?;
    assert!(!world.remove_component::<Mass>(entity)?);
    Ok(())
}

#[test]
fn required_components_gate_create_and_add() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Position>()?;
    world.register_component_with(ComponentSpec::<Velocity>::new().requires::<Position>())?;

    // Velocity without Position must not spawn.
    let bundle = world
        .bundle()
        .with(Velocity { dx: 1.0, dy: 0.0 })
        .finish()?;
    let err = world.create_entity(bundle).unwrap_err();
    assert!(matches!(err, WorldError::Validation(_)));
    assert_eq!(world.entity_count(), 0);

    // Nor attach to an entity that lacks it.
    let bare = world.create_empty()?;
    let err = world
        .add_component(bare, Velocity { dx: 1.0, dy: 0.0 })
        .unwrap_err();
    assert!(matches!(err, WorldError::Validation(_)));

    // With the requirement satisfied, both paths succeed.
    let bundle = world
        .bundle()
        .with(Position { x: 0.0, y: 0.0 })
        .with(Velocity { dx: 1.0, dy: 0.0 })
        .finish()?;
    let entity = world.create_entity(bundle)?;
    assert!(world.has_component::<Velocity>(entity)?);
    Ok(())
}

#[test]
fn conflicting_components_cannot_meet() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Velocity>()?;
    world.register_component_with(ComponentSpec::<Frozen>::new().tag().conflicts_with::<Velocity>())?;

    let bundle = world
        .bundle()
        .with(Velocity { dx: 1.0, dy: 0.0 })
        .with(Frozen)
        .finish()?;
    let err = world.create_entity(bundle).unwrap_err();
    assert!(matches!(err, WorldError::Validation(_)));

    // The conflict also binds in reverse: adding the undeclared side to an
    // entity holding the declared side is rejected too.
    let bundle = world.bundle().with(Frozen).finish()?;
    let frozen = world.create_entity(bundle)?;
    let err = world
        .add_component(frozen, Velocity { dx: 1.0, dy: 0.0 })
        .unwrap_err();
    assert!(matches!(err, WorldError::Validation(_)));
    Ok(())
}

#[test]
fn value_predicates_reject_before_storage_is_touched() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component_with(
        ComponentSpec::<Mass>::new().predicate(|_, _, mass| mass.0 > 0.0),
    )?;

    let bundle = world.bundle().with(Mass(-1.0)).finish()?;
    let err = world.create_entity(bundle).unwrap_err();
    assert!(matches!(err, WorldError::Validation(_)));
    assert_eq!(world.entity_count(), 0);

    let entity = world.create_empty()?;
    let err = world.add_component(entity, Mass(0.0)).unwrap_err();
    assert!(matches!(err, WorldError::Validation(_)));
    assert!(!world.has_component::<Mass>(entity)?);

    world.add_component(entity, Mass(1.5))?;
    assert_eq!(world.get_component::<Mass>(entity)?, Some(&Mass(1.5)));

    // set_component is exempt; invariants of live values are the caller's.
    world.set_component(entity, Mass(-3.0))?;
    assert_eq!(world.get_component::<Mass>(entity)?, Some(&Mass(-3.0)));
    Ok(())
}

#[test]
fn absent_lookups_are_none_not_errors() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Position>()?;

    let entity = world.create_empty()?;
    assert_eq!(world.get_component::<Position>(entity)?, None);
    // Velocity is not even registered; lookups still answer None.
    assert_eq!(world.get_component::<Velocity>(entity)?, None);
    assert!(!world.has_component::<Velocity>(entity)?);
    Ok(())
}

#[test]
fn mutable_access_writes_through() -> EcsResult<()> {
    let mut world = World::new();
    world.register_component::<Position>()?;

    let bundle = world.bundle().with(Position { x: 1.0, y: 1.0 }).finish()?;
    let entity = world.create_entity(bundle)?;

    if let Some(position) = world.get_component_mut::<Position>(entity)? {
        position.x = 10.0;
    }
    assert_eq!(
        world.get_component::<Position>(entity)?,
        Some(&Position { x: 10.0, y: 1.0 })
    );
    Ok(())
}
