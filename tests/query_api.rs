use lattice::{Entity, World};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Pos(u32);
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Vel(u64);
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Frozen;

#[test]
fn required_pair_matches_intersection() {
    let mut world = World::new();
    let registry = world.registry_mut();

    let first = registry.create_entity();
    let second = registry.create_entity();
    let _third = registry.create_entity();

    registry.attach(first, Pos(32));
    registry.attach(first, Vel(64));
    registry.attach(second, Pos(128));

    let matches: Vec<(Entity, (&Pos, &Vel), ())> =
        world.viewer().view::<(Pos, Vel), (), ()>().collect();

    assert_eq!(matches.len(), 1);
    let (entity, (pos, vel), ()) = matches[0];
    assert_eq!(entity, first);
    assert_eq!((*pos, *vel), (Pos(32), Vel(64)));
}

#[test]
fn optional_components_yield_none_when_absent() {
    let mut world = World::new();
    let registry = world.registry_mut();

    let first = registry.create_entity();
    let second = registry.create_entity();
    registry.attach(first, Pos(32));
    registry.attach(first, Vel(64));
    registry.attach(second, Pos(128));

    let matches: Vec<(Pos, Option<Vel>)> = world
        .viewer()
        .view::<(Pos,), (Vel,), ()>()
        .map(|(_, (pos,), (vel,))| (*pos, vel.copied()))
        .collect();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0], (Pos(32), Some(Vel(64))));
    assert_eq!(matches[1], (Pos(128), None));
}

#[test]
fn excluded_components_reject_matches() {
    let mut world = World::new();
    let registry = world.registry_mut();

    let moving = registry.create_entity();
    let frozen = registry.create_entity();
    registry.attach(moving, Pos(1));
    registry.attach(frozen, Pos(2));
    registry.attach(frozen, Frozen);

    let matches: Vec<Entity> = world
        .viewer()
        .view::<(Pos,), (), (Frozen,)>()
        .map(|(entity, _, ())| entity)
        .collect();

    assert_eq!(matches, vec![moving]);
}

#[test]
fn empty_required_visits_every_live_entity() {
    let mut world = World::new();
    let registry = world.registry_mut();

    let mut spawned = Vec::new();
    for value in 0..5 {
        let entity = registry.create_entity();
        if value % 2 == 0 {
            registry.attach(entity, Pos(value));
        }
        spawned.push(entity);
    }

    let mut visited: Vec<Entity> = world
        .viewer()
        .view::<(), (Pos,), ()>()
        .map(|(entity, (), _)| entity)
        .collect();
    visited.sort();
    spawned.sort();
    assert_eq!(visited, spawned);
}

#[test]
fn empty_required_with_exclusion() {
    let mut world = World::new();
    let registry = world.registry_mut();

    let plain = registry.create_entity();
    let tagged = registry.create_entity();
    registry.attach(tagged, Frozen);

    let visited: Vec<Entity> = world
        .viewer()
        .view::<(), (), (Frozen,)>()
        .map(|(entity, (), ())| entity)
        .collect();
    assert_eq!(visited, vec![plain]);
}

#[test]
fn missing_required_storage_means_empty_view() {
    let mut world = World::new();
    let entity = world.registry_mut().create_entity();
    world.registry_mut().attach(entity, Pos(1));

    // No Vel storage exists at all.
    assert_eq!(world.viewer().view::<(Pos, Vel), (), ()>().count(), 0);
}

#[test]
fn match_order_follows_driving_storage() {
    let mut world = World::new();
    let registry = world.registry_mut();

    let mut entities = Vec::new();
    for value in 0..4 {
        let entity = registry.create_entity();
        registry.attach(entity, Pos(value));
        entities.push(entity);
    }
    // Swap-and-pop moves the last entity into the removed slot.
    registry.detach::<Pos>(entities[1]);

    let order: Vec<u32> = world
        .viewer()
        .view::<(Pos,), (), ()>()
        .map(|(_, (pos,), ())| pos.0)
        .collect();
    assert_eq!(order, vec![0, 3, 2]);
}

#[test]
fn destroyed_entities_never_match() {
    let mut world = World::new();
    let registry = world.registry_mut();

    let doomed = registry.create_entity();
    registry.attach(doomed, Pos(9));
    registry.destroy_entity(doomed);

    assert_eq!(world.viewer().view::<(Pos,), (), ()>().count(), 0);
}

#[test]
fn required_refs_observe_current_values() {
    let mut world = World::new();
    let registry = world.registry_mut();
    let entity = registry.create_entity();
    registry.attach(entity, Pos(1));
    registry.attach(entity, Pos(42));

    let values: Vec<u32> = world
        .viewer()
        .view::<(Pos,), (), ()>()
        .map(|(_, (pos,), ())| pos.0)
        .collect();
    assert_eq!(values, vec![42]);
}

#[test]
#[should_panic(expected = "required, optional and exclude")]
fn overlapping_sets_panic() {
    let world = World::new();
    let _ = world.viewer().view::<(Pos,), (Pos,), ()>();
}

#[test]
fn viewer_convenience_accessors() {
    let mut world = World::new();
    let entity = world.registry_mut().create_entity();
    world.registry_mut().attach(entity, Pos(3));

    let viewer = world.viewer();
    assert!(viewer.contains_entity(entity));
    assert_eq!(viewer.get::<Pos>(entity), Some(&Pos(3)));
    assert_eq!(viewer.get::<Vel>(entity), None);
}
