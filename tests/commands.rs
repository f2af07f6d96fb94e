use std::sync::Arc;
use std::thread;

use lattice::systems::CommandQueue;
use lattice::{Scheduler, SystemArgs, World};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Pos(u32);
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Vel(u32);

struct TickCount(usize);

#[test]
fn spawn_destroy_attach_detach() {
    let mut world = World::new();

    world.commands().spawn((Pos(1), Vel(2))).spawn((Pos(3),));
    world.apply_commands();
    assert_eq!(world.registry().entity_count(), 2);

    let with_vel: Vec<_> = world
        .viewer()
        .view::<(Pos, Vel), (), ()>()
        .map(|(entity, _, ())| entity)
        .collect();
    assert_eq!(with_vel.len(), 1);
    let target = with_vel[0];

    world.commands().attach(target, (Vel(9),)).detach::<(Pos,)>(target);
    world.apply_commands();
    assert_eq!(world.registry().get::<Vel>(target), Some(&Vel(9)));
    assert!(!world.registry().has::<Pos>(target));

    world.commands().destroy(target);
    world.apply_commands();
    assert!(!world.registry().contains_entity(target));
    assert_eq!(world.registry().entity_count(), 1);
}

#[test]
fn resource_commands() {
    let mut world = World::new();

    world.commands().add_resource(TickCount(41));
    world.apply_commands();
    assert_eq!(world.resources().get::<TickCount>().map(|t| t.0), Some(41));

    world.commands().remove_resource::<TickCount>();
    world.apply_commands();
    assert!(!world.resources().contains::<TickCount>());
}

#[test]
#[should_panic(expected = "duplicate component types")]
fn duplicate_spawn_bundle_panics() {
    let world = World::new();
    world.commands().spawn((Pos(1), Pos(2)));
}

#[test]
#[should_panic(expected = "duplicate component types")]
fn duplicate_detach_set_panics() {
    let world = World::new();
    let entity = lattice::Entity::from_parts(0, 0);
    world.commands().detach::<(Pos, Pos)>(entity);
}

#[test]
fn per_thread_fifo_is_preserved() {
    let mut world = World::new();
    world.resources_mut().insert(Vec::<(usize, usize)>::new());

    let commands = world.commands().clone();
    let mut handles = Vec::new();
    for thread_index in 0..4usize {
        let commands = commands.clone();
        handles.push(thread::spawn(move || {
            for sequence in 0..50usize {
                commands.exec_mut(move |world| {
                    if let Some(mut log) = world.resources().get_mut::<Vec<(usize, usize)>>() {
                        log.push((thread_index, sequence));
                    }
                });
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    world.apply_commands();

    let log = world.resources().get::<Vec<(usize, usize)>>().unwrap();
    for thread_index in 0..4usize {
        let order: Vec<usize> = log
            .iter()
            .filter(|(tid, _)| *tid == thread_index)
            .map(|(_, seq)| *seq)
            .collect();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted);
        assert_eq!(order.len(), 50);
    }
}

#[test]
fn commands_enqueued_in_one_stage_apply_before_the_next() {
    let mut world = World::new();
    let scheduler = Scheduler::with_stages(2);

    scheduler
        .stage(0)
        .unwrap()
        .add_system(|args: &mut SystemArgs<'_>| {
            args.commands().spawn((Pos(5),));
            // Not visible within this stage.
            assert_eq!(args.viewer().view::<(Pos,), (), ()>().count(), 0);
        });
    scheduler
        .stage(1)
        .unwrap()
        .add_system(|args: &mut SystemArgs<'_>| {
            assert_eq!(args.viewer().view::<(Pos,), (), ()>().count(), 1);
        });

    scheduler.execute(&mut world).unwrap();
    assert_eq!(world.registry().entity_count(), 1);
}

#[test]
fn queue_pop_operations() {
    let queue = CommandQueue::new();
    assert!(queue.is_empty());
    assert!(queue.try_pop().is_none());

    queue.push(Box::new(|world: &mut World| {
        world.registry_mut().create_entity();
    }));
    assert!(!queue.is_empty());

    let command = queue.try_pop().unwrap();
    let mut world = World::new();
    command(&mut world);
    assert_eq!(world.registry().entity_count(), 1);
    assert!(queue.is_empty());
}

#[test]
fn wait_and_pop_blocks_until_a_push() {
    let queue = Arc::new(CommandQueue::new());

    let popper = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let command = queue.wait_and_pop();
            let mut world = World::new();
            command(&mut world);
            world.registry().entity_count()
        })
    };

    thread::sleep(std::time::Duration::from_millis(20));
    queue.push(Box::new(|world: &mut World| {
        world.registry_mut().create_entity();
    }));

    assert_eq!(popper.join().unwrap(), 1);
}
