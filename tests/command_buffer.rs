use simply_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Health(i32);
#[derive(Debug, Clone, Copy, PartialEq)]
struct Poisoned;

#[test]
fn test_deferred_component_changes_after_query() {
    let mut world = World::new();
    let sick = world.spawn((Health(3), Poisoned)).unwrap();
    let fine = world.spawn((Health(3),)).unwrap();

    let mut commands = CommandBuffer::new();
    for (entity, _) in world.query::<(&Health, With<Poisoned>)>().iter() {
        commands.remove_component::<Poisoned>(entity);
        commands.add(move |world| {
            world.get_component_mut::<Health>(entity)?.0 -= 1;
            Ok(())
        });
    }
    assert_eq!(commands.len(), 2);

    world.apply_commands(&mut commands).unwrap();

    assert!(commands.is_empty());
    assert_eq!(world.has_component::<Poisoned>(sick), Ok(false));
    assert_eq!(world.get_component::<Health>(sick), Ok(&Health(2)));
    assert_eq!(world.get_component::<Health>(fine), Ok(&Health(3)));
}

#[test]
fn test_deferred_spawn_returns_created_ids() {
    let mut world = World::new();
    let mut commands = CommandBuffer::with_capacity(4);
    commands.spawn((Health(10),));
    commands.create_entity();
    commands.spawn((Health(20), Poisoned));

    world.apply_commands(&mut commands).unwrap();
    let created = commands.take_created();

    assert_eq!(created.len(), 3);
    assert!(created.iter().all(|&e| world.is_alive(e)));
    assert_eq!(world.get_component::<Health>(created[0]), Ok(&Health(10)));
    assert_eq!(world.has_component::<Health>(created[1]), Ok(false));
    assert_eq!(world.has_component::<Poisoned>(created[2]), Ok(true));
    assert!(commands.take_created().is_empty());
}

#[test]
fn test_failed_command_keeps_the_rest_queued() {
    let mut world = World::new();
    let e = world.spawn((Health(1),)).unwrap();

    let mut commands = CommandBuffer::new();
    commands.add_component(e, Poisoned);
    commands.add_component(e, Health(5));
    commands.destroy_entity(e);

    assert!(matches!(
        world.apply_commands(&mut commands),
        Err(EcsError::DuplicateComponent(_))
    ));
    assert_eq!(world.has_component::<Poisoned>(e), Ok(true));
    assert_eq!(world.get_component::<Health>(e), Ok(&Health(1)));
    assert_eq!(commands.len(), 1);

    world.apply_commands(&mut commands).unwrap();
    assert!(!world.is_alive(e));
}

#[test]
fn test_destroy_twice_through_commands() {
    let mut world = World::new();
    let e = world.create_entity();

    let mut commands = CommandBuffer::new();
    commands.destroy_entity(e);
    commands.destroy_entity(e);

    assert_eq!(
        world.apply_commands(&mut commands),
        Err(EcsError::StaleEntity(e))
    );
    assert_eq!(world.entity_count(), 0);
}
