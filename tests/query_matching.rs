use simply_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct A;
#[derive(Debug, Clone, Copy, PartialEq)]
struct B;
#[derive(Debug, Clone, Copy, PartialEq)]
struct C;
#[derive(Debug, Clone, Copy, PartialEq)]
struct D;

#[test]
fn test_half_of_entities_have_position() {
    let mut world = World::new();
    let mut expected = Vec::new();
    for i in 0..1000 {
        let e = world.create_entity();
        if i % 2 == 0 {
            let pos = Position {
                x: i as f32,
                y: -(i as f32),
            };
            world.add_component(e, pos).unwrap();
            expected.push((e, pos));
        }
    }

    let mut seen: Vec<_> = world
        .query::<&Position>()
        .iter()
        .map(|(e, p)| (e, *p))
        .collect();
    assert_eq!(seen.len(), 500);

    seen.sort_by_key(|(e, _)| *e);
    expected.sort_by_key(|(e, _)| *e);
    assert_eq!(seen, expected);
}

#[test]
fn test_superset_matching() {
    let mut world = World::new();
    let e = world.spawn((A, B, C)).unwrap();

    let hits = |ids: Vec<EntityId>| ids == vec![e];
    assert!(hits(world.query::<&A>().iter().map(|(id, _)| id).collect()));
    assert!(hits(world.query::<(&A, &B)>().iter().map(|(id, _)| id).collect()));
    assert!(hits(world.query::<(&A, &B, &C)>().iter().map(|(id, _)| id).collect()));
    assert_eq!(world.query::<(&A, &D)>().iter().count(), 0);
}

#[test]
fn test_repeated_iteration_is_stable() {
    let mut world = World::new();
    for i in 0..20 {
        if i % 3 == 0 {
            world.spawn((A, Position { x: i as f32, y: 0.0 })).unwrap();
        } else {
            world.spawn((Position { x: i as f32, y: 0.0 },)).unwrap();
        }
    }

    let query = world.query::<&Position>();
    let first: Vec<_> = query.iter().map(|(e, p)| (e, *p)).collect();
    let second: Vec<_> = query.iter().map(|(e, p)| (e, *p)).collect();
    assert_eq!(first.len(), 20);
    assert_eq!(first, second);

    // A fresh query over the unmodified world sees the same results
    let third: Vec<_> = world
        .query::<&Position>()
        .iter()
        .map(|(e, p)| (e, *p))
        .collect();
    assert_eq!(first, third);
}

#[test]
fn test_empty_world_and_empty_results() {
    let world = World::new();
    let query = world.query::<(&Position, &Velocity)>();
    assert!(query.is_empty());
    assert_eq!(query.iter().next(), None);
}

#[test]
fn test_without_filter_excludes_archetypes() {
    let mut world = World::new();
    let moving = world
        .spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 0.0 }))
        .unwrap();
    let still = world.spawn((Position { x: 5.0, y: 5.0 },)).unwrap();

    let ids: Vec<_> = world
        .query::<(&Position, Without<Velocity>)>()
        .iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec![still]);

    let ids: Vec<_> = world
        .query::<(&Position, With<Velocity>)>()
        .iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec![moving]);
}

#[test]
fn test_query_mut_integrates_velocity() {
    let mut world = World::new();
    let e = world
        .spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.5, y: -2.0 }))
        .unwrap();
    let fixed = world.spawn((Position { x: 9.0, y: 9.0 },)).unwrap();

    for _ in 0..2 {
        let query = world.query_mut::<(&mut Position, &Velocity)>().unwrap();
        assert_eq!(query.count(), 1);
        for (_, (pos, vel)) in query {
            pos.x += vel.x;
            pos.y += vel.y;
        }
    }

    assert_eq!(
        world.get_component::<Position>(e),
        Ok(&Position { x: 3.0, y: -4.0 })
    );
    assert_eq!(
        world.get_component::<Position>(fixed),
        Ok(&Position { x: 9.0, y: 9.0 })
    );
}

#[test]
fn test_query_mut_rejects_aliasing() {
    let mut world = World::new();
    world.spawn((Position { x: 0.0, y: 0.0 },)).unwrap();

    assert!(matches!(
        world.query_mut::<(&mut Position, &mut Position)>(),
        Err(EcsError::ConflictingAccess(_))
    ));
    assert!(matches!(
        world.query_mut::<(&mut Position, &Position)>(),
        Err(EcsError::ConflictingAccess(_))
    ));
}

#[test]
fn test_query_state_picks_up_new_archetypes() {
    let mut world = World::new();
    world.spawn((A,)).unwrap();

    let mut state = world.query_state::<&A>();
    assert_eq!(state.iter(&world).count(), 1);

    world.spawn((A, B)).unwrap();
    world.spawn((A, C)).unwrap();
    world.spawn((B,)).unwrap();

    assert_eq!(state.iter(&world).count(), 3);
    state.update(&world);
    assert_eq!(state.matched_archetype_count(), 3);

    // The same state drives a mutable pass once the shared borrows are gone
    assert_eq!(state.iter_mut(&mut world).unwrap().len(), 3);
}

#[test]
fn test_iteration_visits_archetypes_in_id_order() {
    let mut world = World::new();
    let ab = world.spawn((A, B)).unwrap();
    let a = world.spawn((A,)).unwrap();
    let ab2 = world.spawn((A, B)).unwrap();

    // {A, B} was created first, so its rows come first
    let order: Vec<_> = world.query::<&A>().iter().map(|(id, _)| id).collect();
    assert_eq!(order, vec![ab, ab2, a]);
}

#[test]
fn test_deferred_destroy_during_query() {
    let mut world = World::new();
    for i in 0..10 {
        world.spawn((Position { x: i as f32, y: 0.0 },)).unwrap();
    }

    let mut commands = CommandBuffer::new();
    for (entity, pos) in world.query::<&Position>().iter() {
        if pos.x >= 5.0 {
            commands.destroy_entity(entity);
        }
    }
    world.apply_commands(&mut commands).unwrap();

    assert_eq!(world.entity_count(), 5);
    assert!(world.query::<&Position>().iter().all(|(_, p)| p.x < 5.0));
}

#[cfg(feature = "parallel")]
#[test]
fn test_par_for_each_matches_sequential() {
    use std::sync::Mutex;

    let mut world = World::new();
    for i in 0..2_000 {
        match i % 3 {
            0 => world.spawn((Position { x: i as f32, y: 0.0 },)).unwrap(),
            1 => world
                .spawn((Position { x: i as f32, y: 0.0 }, Velocity { x: 0.0, y: 0.0 }))
                .unwrap(),
            _ => world.spawn((Velocity { x: 0.0, y: 0.0 },)).unwrap(),
        };
    }

    let seen = Mutex::new(Vec::new());
    world.query::<&Position>().par_for_each(|entity, _| {
        seen.lock().unwrap().push(entity);
    });

    let mut parallel = seen.into_inner().unwrap();
    let mut sequential: Vec<_> = world.query::<&Position>().iter().map(|(e, _)| e).collect();
    parallel.sort();
    sequential.sort();
    assert_eq!(parallel, sequential);
}
