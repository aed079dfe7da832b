mod common;

use std::cell::RefCell;
use std::rc::Rc;

use abm_observers::prelude::*;
use abm_observers::{ArchetypeEvent, HookKind, WorldConfig};
use common::{Recorder, TestResult};

fn monitor_with_recorders(query: Query) -> Result<(Monitor, Recorder, Recorder), abm_observers::ObserverError> {
    let monitor = Monitor::new(query)?;
    let added = Recorder::new();
    let removed = Recorder::new();
    monitor.set_added(added.sink());
    monitor.set_removed(removed.sink());
    Ok((monitor, added, removed))
}

#[test]
fn reports_removal_when_required_term_is_lost() -> TestResult {
    common::init_tracing();
    let world = World::new();
    let entity = world.spawn_with(&[5])?;

    let (_monitor, added, removed) = monitor_with_recorders(world.query(&[5]))?;
    world.remove(entity, 5)?;

    assert_eq!(removed.events(), vec![entity]);
    assert_eq!(added.count(), 0);
    Ok(())
}

#[test]
fn reports_each_boundary_crossing_once() -> TestResult {
    let world = World::new();
    let (_monitor, added, removed) = monitor_with_recorders(world.query(&[5]))?;

    let entity = world.spawn();
    world.add(entity, 5)?;
    assert_eq!(added.events(), vec![entity]);

    world.add(entity, 7)?;
    world.add(entity, 5)?;
    world.remove(entity, 7)?;
    assert_eq!(added.count(), 1);
    assert_eq!(removed.count(), 0);

    world.remove(entity, 5)?;
    world.remove(entity, 5)?;
    assert_eq!(removed.events(), vec![entity]);

    world.add(entity, 5)?;
    assert_eq!(added.count(), 2);
    Ok(())
}

#[test]
fn empty_slots_drop_transitions() -> TestResult {
    let world = World::new();
    let monitor = Monitor::new(world.query(&[5]))?;

    let early = world.spawn_with(&[5])?;
    world.remove(early, 5)?;

    let added = Recorder::new();
    monitor.set_added(added.sink());
    assert_eq!(added.count(), 0);

    let late = world.spawn_with(&[5])?;
    world.remove(late, 5)?;
    assert_eq!(added.events(), vec![late]);
    Ok(())
}

#[test]
fn slots_can_be_replaced_and_cleared() -> TestResult {
    let world = World::new();
    let monitor = Monitor::new(world.query(&[5]))?;

    let first = Recorder::new();
    let second = Recorder::new();

    monitor.set_added(first.sink());
    let a = world.spawn_with(&[5])?;

    monitor.set_added(second.sink());
    let b = world.spawn_with(&[5])?;

    monitor.clear_added();
    world.spawn_with(&[5])?;

    assert_eq!(first.events(), vec![a]);
    assert_eq!(second.events(), vec![b]);

    let removed = Recorder::new();
    monitor.set_removed(removed.sink());
    monitor.clear_removed();
    world.remove(a, 5)?;
    assert_eq!(removed.count(), 0);
    Ok(())
}

#[test]
fn callback_may_clear_its_own_slot() -> TestResult {
    let world = World::new();
    let monitor = Rc::new(Monitor::new(world.query(&[5]))?);
    let seen = Recorder::new();

    {
        let handle = Rc::downgrade(&monitor);
        let sink = seen.sink();
        monitor.set_added(move |entity| {
            sink(entity);
            if let Some(monitor) = handle.upgrade() {
                monitor.clear_added();
            }
        });
    }

    let first = world.spawn_with(&[5])?;
    world.spawn_with(&[5])?;
    assert_eq!(seen.events(), vec![first]);
    Ok(())
}

#[test]
fn excluded_terms_invert_directions() -> TestResult {
    let world = World::new();
    let (_monitor, added, removed) = monitor_with_recorders(world.query(&[5]).without(&[9]))?;

    let entity = world.spawn_with(&[5])?;
    assert_eq!(added.events(), vec![entity]);

    world.add(entity, 9)?;
    assert_eq!(removed.events(), vec![entity]);

    world.remove(entity, 9)?;
    assert_eq!(added.events(), vec![entity, entity]);

    world.remove(entity, 5)?;
    assert_eq!(removed.count(), 2);

    // Without the required term, losing the exclusion cannot admit it.
    world.add(entity, 9)?;
    world.remove(entity, 9)?;
    assert_eq!(added.count(), 2);
    assert_eq!(removed.count(), 2);
    Ok(())
}

#[test]
fn with_list_replaces_required_ids_for_hooks() -> TestResult {
    let world = World::new();
    let (_monitor, added, _removed) = monitor_with_recorders(world.query(&[5]).with(&[5, 6]))?;
    assert_eq!(world.hook_count(HookKind::Added, 5), 1);
    assert_eq!(world.hook_count(HookKind::Added, 6), 1);

    let entity = world.spawn_with(&[5])?;
    assert_eq!(added.count(), 0);

    world.add(entity, 6)?;
    assert_eq!(added.events(), vec![entity]);
    Ok(())
}

#[test]
fn wildcard_pair_tracks_relation_membership() -> TestResult {
    let world = World::new();
    let (_monitor, added, removed) = monitor_with_recorders(world.query(&[pair(3, WILDCARD)]))?;

    let entity = world.spawn();
    world.add(entity, pair(3, 9))?;
    world.add(entity, pair(3, 5))?;
    assert_eq!(added.events(), vec![entity]);

    world.remove(entity, pair(3, 9))?;
    assert_eq!(removed.count(), 0);

    world.remove(entity, pair(3, 5))?;
    assert_eq!(removed.events(), vec![entity]);
    Ok(())
}

#[test]
fn deleting_an_entity_reports_one_removal() -> TestResult {
    let world = World::new();
    let (_monitor, added, removed) = monitor_with_recorders(world.query(&[5, 6]))?;

    let entity = world.spawn_with(&[5, 6])?;
    assert_eq!(added.events(), vec![entity]);

    world.delete(entity)?;
    assert_eq!(removed.events(), vec![entity]);
    assert!(!world.is_alive(entity));
    Ok(())
}

#[test]
fn auto_cleanup_does_not_hide_transitions() -> TestResult {
    let world = World::with_config(WorldConfig { auto_cleanup: true, ..WorldConfig::default() });
    let (monitor, added, removed) = monitor_with_recorders(world.query(&[5]))?;

    let entity = world.spawn_with(&[5])?;
    world.remove(entity, 5)?;
    assert_eq!(removed.events(), vec![entity]);
    assert!(monitor.match_set().is_empty());

    world.add(entity, 5)?;
    assert_eq!(added.events(), vec![entity, entity]);
    Ok(())
}

#[test]
fn disconnect_is_idempotent_and_restores_buckets() -> TestResult {
    let world = World::new();
    let counts = |kind| world.hook_count(kind, 5);
    assert_eq!((counts(HookKind::Added), counts(HookKind::Removed)), (0, 0));

    let (monitor, added, removed) = monitor_with_recorders(world.query(&[5]))?;
    assert_eq!((counts(HookKind::Added), counts(HookKind::Removed)), (1, 1));
    assert_eq!(world.archetype_hook_count(ArchetypeEvent::Create, 5), 1);

    monitor.disconnect();
    monitor.disconnect();
    assert!(!monitor.is_connected());
    assert_eq!((counts(HookKind::Added), counts(HookKind::Removed)), (0, 0));
    assert_eq!(world.archetype_hook_count(ArchetypeEvent::Create, 5), 0);

    let entity = world.spawn_with(&[5])?;
    world.remove(entity, 5)?;
    assert_eq!(added.count() + removed.count(), 0);
    Ok(())
}

#[test]
fn monitors_share_buckets_independently() -> TestResult {
    let world = World::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    let narrow = Monitor::new(world.query(&[5, 6]))?;
    let broad = Monitor::new(world.query(&[5]))?;
    {
        let log = Rc::clone(&log);
        narrow.set_added(move |_| log.borrow_mut().push("narrow"));
    }
    {
        let log = Rc::clone(&log);
        broad.set_added(move |_| log.borrow_mut().push("broad"));
    }

    let entity = world.spawn_with(&[5])?;
    world.add(entity, 6)?;
    assert_eq!(*log.borrow(), vec!["broad", "narrow"]);

    narrow.disconnect();
    assert!(broad.is_connected());
    assert_eq!(world.hook_count(HookKind::Added, 5), 1);
    Ok(())
}

#[test]
fn wildcard_exclusion_tracks_the_whole_relation() -> TestResult {
    let world = World::new();
    let (_monitor, added, removed) =
        monitor_with_recorders(world.query(&[5]).without(&[pair(3, WILDCARD)]))?;

    let entity = world.spawn_with(&[5])?;
    assert_eq!(added.count(), 1);

    world.add(entity, pair(3, 1))?;
    assert_eq!(removed.events(), vec![entity]);

    world.add(entity, pair(3, 2))?;
    world.remove(entity, pair(3, 1))?;
    assert_eq!((added.count(), removed.count()), (1, 1));

    world.remove(entity, pair(3, 2))?;
    assert_eq!(added.events(), vec![entity, entity]);
    assert_eq!(removed.count(), 1);
    Ok(())
}

#[test]
fn concrete_excluded_pair_ignores_other_targets() -> TestResult {
    let world = World::new();
    let (_monitor, added, removed) =
        monitor_with_recorders(world.query(&[5]).without(&[pair(3, 9)]))?;

    let entity = world.spawn_with(&[5])?;
    world.add(entity, pair(3, 4))?;
    assert_eq!((added.count(), removed.count()), (1, 0));

    world.add(entity, pair(3, 9))?;
    assert_eq!(removed.events(), vec![entity]);

    world.remove(entity, pair(3, 4))?;
    assert_eq!(added.count(), 1);

    world.remove(entity, pair(3, 9))?;
    assert_eq!(added.events(), vec![entity, entity]);
    Ok(())
}

#[test]
fn with_pairs_drive_both_directions() -> TestResult {
    let world = World::new();
    let (_monitor, added, removed) =
        monitor_with_recorders(world.query(&[5]).with(&[pair(3, WILDCARD)]))?;
    assert_eq!(world.hook_count(HookKind::Added, pair(3, WILDCARD)), 1);
    assert_eq!(world.hook_count(HookKind::Added, 5), 0);

    let entity = world.spawn_with(&[5])?;
    world.add(entity, pair(3, 1))?;
    assert_eq!(added.events(), vec![entity]);

    world.add(entity, pair(3, 2))?;
    world.remove(entity, pair(3, 1))?;
    assert_eq!((added.count(), removed.count()), (1, 0));

    world.remove(entity, pair(3, 2))?;
    assert_eq!(removed.events(), vec![entity]);
    Ok(())
}

#[test]
fn concrete_with_pair_needs_its_exact_target() -> TestResult {
    let world = World::new();
    let (_monitor, added, removed) =
        monitor_with_recorders(world.query(&[5]).with(&[pair(3, 9)]))?;

    let entity = world.spawn_with(&[5, pair(3, 4)])?;
    assert_eq!(added.count(), 0);

    world.add(entity, pair(3, 9))?;
    assert_eq!(added.events(), vec![entity]);

    world.remove(entity, pair(3, 4))?;
    assert_eq!(removed.count(), 0);

    world.remove(entity, pair(3, 9))?;
    assert_eq!(removed.events(), vec![entity]);
    Ok(())
}

#[test]
fn deleting_an_excluded_entity_passes_through_the_result_set() -> TestResult {
    let world = World::new();
    let entity = world.spawn_with(&[5, 9])?;
    let (_monitor, added, removed) = monitor_with_recorders(world.query(&[5]).without(&[9]))?;

    world.delete(entity)?;
    assert_eq!(added.events(), vec![entity]);
    assert_eq!(removed.events(), vec![entity]);
    Ok(())
}
