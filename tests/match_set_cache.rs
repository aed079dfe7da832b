mod common;

use abm_observers::prelude::*;
use abm_observers::{ArchetypeEvent, MatchSetCache, ObserverError};
use common::TestResult;

#[test]
fn seeds_from_existing_archetypes_and_tracks_lifecycle() -> TestResult {
    common::init_tracing();
    let world = World::new();
    let existing = world.archetype_of(&[5, 7])?;
    world.archetype_of(&[7])?;

    let cache = MatchSetCache::build(&world.query(&[5]))?;
    assert_eq!(cache.match_set().ids(), vec![existing]);

    let created = world.archetype_of(&[5])?;
    assert!(cache.match_set().contains(created));
    assert_eq!(cache.match_set().ids(), vec![existing, created]);

    world.delete_archetype(existing)?;
    assert!(!cache.match_set().contains(existing));
    assert_eq!(cache.match_set().ids(), vec![created]);
    Ok(())
}

#[test]
fn ignores_archetypes_failing_the_full_query() -> TestResult {
    let world = World::new();
    let cache = MatchSetCache::build(&world.query(&[5, 6]).without(&[9]))?;

    let lacks_second = world.archetype_of(&[5])?;
    let excluded = world.archetype_of(&[5, 6, 9])?;
    let unrelated = world.archetype_of(&[6])?;
    let matching = world.archetype_of(&[5, 6])?;

    assert!(!cache.match_set().contains(lacks_second));
    assert!(!cache.match_set().contains(excluded));
    assert!(!cache.match_set().contains(unrelated));
    assert_eq!(cache.match_set().ids(), vec![matching]);
    Ok(())
}

#[test]
fn empty_query_is_rejected() {
    let world = World::new();
    let result = MatchSetCache::build(&world.query(&[]));
    assert!(matches!(result, Err(ObserverError::EmptyQueryTerms)));

    assert!(matches!(
        Observer::new(world.query(&[]).with(&[5]), |_| {}),
        Err(ObserverError::EmptyQueryTerms)
    ));
    assert!(matches!(Monitor::new(world.query(&[])), Err(ObserverError::EmptyQueryTerms)));
}

#[test]
fn wildcard_first_term_tracks_every_target() -> TestResult {
    let world = World::new();
    let likes_5 = world.archetype_of(&[pair(3, 5)])?;
    world.archetype_of(&[pair(4, 5)])?;

    let cache = MatchSetCache::build(&world.query(&[pair(3, WILDCARD)]))?;
    assert_eq!(cache.match_set().ids(), vec![likes_5]);

    let likes_9 = world.archetype_of(&[pair(3, 9), 11])?;
    assert!(cache.match_set().contains(likes_9));

    world.delete_archetype(likes_5)?;
    assert_eq!(cache.match_set().ids(), vec![likes_9]);
    Ok(())
}

#[test]
fn concrete_pair_does_not_match_other_targets() -> TestResult {
    let world = World::new();
    let cache = MatchSetCache::build(&world.query(&[pair(3, 9)]))?;

    let other_target = world.archetype_of(&[pair(3, 5)])?;
    let exact = world.archetype_of(&[pair(3, 9)])?;

    assert!(!cache.match_set().contains(other_target));
    assert!(cache.match_set().contains(exact));
    Ok(())
}

#[test]
fn disconnect_clears_and_unsubscribes() -> TestResult {
    let world = World::new();
    world.archetype_of(&[5])?;
    assert_eq!(world.archetype_hook_count(ArchetypeEvent::Create, 5), 0);

    let cache = MatchSetCache::build(&world.query(&[5]))?;
    assert_eq!(world.archetype_hook_count(ArchetypeEvent::Create, 5), 1);
    assert_eq!(world.archetype_hook_count(ArchetypeEvent::Delete, 5), 1);
    assert_eq!(cache.match_set().len(), 1);

    cache.disconnect();
    assert!(cache.match_set().is_empty());
    assert_eq!(world.archetype_hook_count(ArchetypeEvent::Create, 5), 0);
    assert_eq!(world.archetype_hook_count(ArchetypeEvent::Delete, 5), 0);

    world.archetype_of(&[5, 8])?;
    assert!(cache.match_set().is_empty());

    cache.disconnect();
    assert!(cache.match_set().is_empty());
    Ok(())
}
