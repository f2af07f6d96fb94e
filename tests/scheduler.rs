use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use itertools::Itertools;
use lattice::{EcsError, Scheduler, StageScheduler, SystemArgs, World};

fn recording_system(
    order: &Arc<Mutex<Vec<u32>>>,
    value: u32,
) -> impl Fn(&mut SystemArgs<'_>) + Send + Sync + 'static {
    let order = Arc::clone(order);
    move |_| order.lock().unwrap().push(value)
}

#[test]
fn diamond_executes_in_topological_waves() {
    //           5 --------|
    //           ^         |
    //           |         v
    // 0 -> 1 -> 3 -> 4 -> 6
    // |         ^
    // v         |
    // 2 --------|
    let world = World::new();
    let stage = StageScheduler::with_workers(4);
    let order = Arc::new(Mutex::new(Vec::new()));

    for value in 0..7 {
        stage.add_system(recording_system(&order, value));
    }
    for (from, to) in [(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (3, 5), (4, 6), (5, 6)] {
        stage.add_constraint(from, to).unwrap();
    }

    assert_eq!(stage.len(), 7);
    for (from, to) in [(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (3, 5), (4, 6), (5, 6)] {
        assert!(stage.contains_constraint(from, to));
    }
    assert!(!stage.has_cycle());

    stage.execute(&world).unwrap();

    let recorded = order.lock().unwrap().clone();
    assert_eq!(recorded.len(), 7);
    assert_eq!(recorded[0], 0);
    assert_eq!(
        recorded[1..3].iter().copied().sorted().collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(recorded[3], 3);
    assert_eq!(
        recorded[4..6].iter().copied().sorted().collect::<Vec<_>>(),
        vec![4, 5]
    );
    assert_eq!(recorded[6], 6);
}

#[test]
fn cycle_is_rejected_before_anything_runs() {
    let world = World::new();
    let stage = StageScheduler::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for value in 0..3 {
        stage.add_system(recording_system(&order, value));
    }
    stage.add_constraint(0, 1).unwrap();
    stage.add_constraint(1, 2).unwrap();
    stage.add_constraint(2, 0).unwrap();

    assert!(stage.has_cycle());
    assert_eq!(stage.execute(&world), Err(EcsError::Cycle));
    assert!(order.lock().unwrap().is_empty());
}

#[test]
fn constraint_is_happens_before_in_wall_clock() {
    let world = World::new();
    let stage = StageScheduler::with_workers(4);
    let times = Arc::new(Mutex::new(Vec::<(u32, Instant, Instant)>::new()));

    for value in 0..2 {
        let times = Arc::clone(&times);
        stage.add_system(move |_: &mut SystemArgs<'_>| {
            let begin = Instant::now();
            std::thread::sleep(Duration::from_millis(25));
            times.lock().unwrap().push((value, begin, Instant::now()));
        });
    }
    stage.add_constraint(0, 1).unwrap();

    stage.execute(&world).unwrap();

    let times = times.lock().unwrap();
    let (_, _, first_end) = times.iter().find(|(id, _, _)| *id == 0).unwrap();
    let (_, second_begin, _) = times.iter().find(|(id, _, _)| *id == 1).unwrap();
    assert!(second_begin >= first_end);
}

#[test]
fn unconstrained_systems_all_run() {
    let world = World::new();
    let stage = StageScheduler::with_workers(8);
    let order = Arc::new(Mutex::new(Vec::new()));

    for value in 0..32 {
        stage.add_system(recording_system(&order, value));
    }
    stage.execute(&world).unwrap();

    let mut recorded = order.lock().unwrap().clone();
    recorded.sort_unstable();
    assert_eq!(recorded, (0..32).collect::<Vec<_>>());
}

#[test]
fn removed_systems_do_not_run_and_ids_recycle() {
    let world = World::new();
    let stage = StageScheduler::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let keep = stage.add_system(recording_system(&order, 1));
    let drop_id = stage.add_system(recording_system(&order, 2));
    stage.add_constraint(keep, drop_id).unwrap();
    stage.remove_system(drop_id).unwrap();

    assert!(!stage.contains_system(drop_id));
    assert!(!stage.contains_constraint(keep, drop_id));

    let reused = stage.add_system(recording_system(&order, 3));
    assert_eq!(reused, drop_id);

    stage.execute(&world).unwrap();
    let mut recorded = order.lock().unwrap().clone();
    recorded.sort_unstable();
    assert_eq!(recorded, vec![1, 3]);
}

#[test]
fn unknown_system_operations_error() {
    let stage = StageScheduler::new();
    let id = stage.add_system(|_: &mut SystemArgs<'_>| {});
    assert_eq!(stage.add_constraint(id, 42), Err(EcsError::UnknownSystem(42)));
    assert_eq!(stage.add_constraint(id, id), Err(EcsError::SelfLoopConstraint));
    assert_eq!(stage.remove_system(42), Err(EcsError::UnknownSystem(42)));
}

#[test]
fn stages_run_in_order() {
    let mut world = World::new();
    let mut scheduler = Scheduler::new();
    scheduler.add_stage();
    scheduler.add_stage();
    assert_eq!(scheduler.stage_count(), 3);

    let order = Arc::new(Mutex::new(Vec::new()));
    for index in 0..3u32 {
        let recorder = Arc::clone(&order);
        scheduler
            .stage(index as usize)
            .unwrap()
            .add_system(move |_: &mut SystemArgs<'_>| {
                recorder.lock().unwrap().push(index);
            });
    }

    scheduler.execute(&mut world).unwrap();
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn first_and_last_stage_addressing() {
    let mut scheduler = Scheduler::with_stages(2);
    let first = scheduler.first_stage().add_system(|_: &mut SystemArgs<'_>| {});
    let last = scheduler.last_stage().add_system(|_: &mut SystemArgs<'_>| {});
    assert_eq!((first, last), (0, 0));
    assert_eq!(scheduler.system_count(), 2);

    scheduler.add_stage_scheduler(StageScheduler::with_workers(2));
    assert_eq!(scheduler.stage_count(), 3);
    assert!(scheduler.last_stage().is_empty());
}

#[test]
fn panic_in_one_system_still_finishes_the_stage() {
    let world = World::new();
    let stage = StageScheduler::with_workers(2);
    let order = Arc::new(Mutex::new(Vec::new()));

    let panicker = stage.add_system(|_: &mut SystemArgs<'_>| panic!("unlucky"));
    let after = stage.add_system(recording_system(&order, 7));
    stage.add_constraint(panicker, after).unwrap();

    let result = stage.execute(&world);
    assert_eq!(
        result,
        Err(EcsError::SystemPanicked {
            system: panicker,
            message: "unlucky".to_owned(),
        })
    );
    // The dependent system still ran once its predecessor completed.
    assert_eq!(*order.lock().unwrap(), vec![7]);
}
