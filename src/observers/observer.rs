//! # Observers
//!
//! An [`Observer`] fires its callback once each time an entity's component
//! set *starts* satisfying a query. It never fires while the entity stays
//! inside the result set, and fires again after the entity leaves and
//! re-enters.
//!
//! ## Subscriptions
//!
//! One handler is registered per hook bucket (see [`group_by_key`]):
//!
//! | Terms in the bucket | Hook | Accepts |
//! |---|---|---|
//! | any required term | `Changed` | plain / wildcard: every event; concrete pair: exact id |
//! | only `with` terms | `Added` | same rules |
//! | `without` terms | `Removed` | same rules |
//!
//! ## Firing rule
//!
//! Presence handlers resolve the entity's **current** archetype through the
//! world's record table and fire when it is in the match set while the
//! event's source archetype is not. Absence handlers run before the entity
//! moves: they compute the destination with `traverse_remove` and fire when
//! the destination is in the match set while the current archetype is not.
//!
//! An entity whose record no longer resolves (deleted earlier in the same
//! dispatch chain) is dropped silently.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::engine::entity::Entity;
use crate::engine::error::ObserverResult;
use crate::engine::events::ComponentEvent;
use crate::engine::query::Query;
use crate::engine::world::{Subscription, World};
use crate::observers::match_set::{MatchSet, MatchSetCache};
use crate::observers::term::{contexts, group_by_key, KeyedTerms, TermSource};


/// Callback invoked with an entity.
pub type EntityCallback = Rc<dyn Fn(Entity)>;

/// Edge-triggered "entity now satisfies the query" subscription.
pub struct Observer {
    cache: MatchSetCache,
    cleanup: Vec<Subscription>,
    connected: Cell<bool>,
}

struct ObserverHandler {
    world: Weak<World>,
    match_set: MatchSet,
    callback: EntityCallback,
    terms: KeyedTerms,
}

impl ObserverHandler {
    fn on_presence(&self, event: &ComponentEvent) {
        if !self.terms.accepts(event.id) {
            return;
        }
        let Some(world) = self.world.upgrade() else { return; };
        let Some(current) = world.record(event.entity) else {
            trace!(entity = ?event.entity, "dropping event for deleted entity");
            return;
        };

        if self.match_set.contains(current) && !self.match_set.contains(event.source) {
            (self.callback)(event.entity);
        }
    }

    fn on_absence(&self, event: &ComponentEvent) {
        if !self.terms.accepts(event.id) {
            return;
        }
        let Some(world) = self.world.upgrade() else { return; };
        let Some(current) = world.record(event.entity) else {
            trace!(entity = ?event.entity, "dropping event for deleted entity");
            return;
        };

        let destination = match world.traverse_remove(current, event.id) {
            Ok(destination) => destination,
            Err(error) => {
                warn!(%error, entity = ?event.entity, id = event.id, "cannot resolve removal destination");
                return;
            }
        };

        if self.match_set.contains(destination) && !self.match_set.contains(current) {
            (self.callback)(event.entity);
        }
    }
}

impl Observer {
    /// Builds an observer for `query`.
    ///
    /// ## Errors
    /// [`ObserverError::EmptyQueryTerms`](crate::engine::error::ObserverError::EmptyQueryTerms)
    /// if the query has no required ids.
    pub fn new(query: Query, callback: impl Fn(Entity) + 'static) -> ObserverResult<Self> {
        let cache = MatchSetCache::build(&query)?;
        let world = query.world();
        let filter = query.filter();
        let callback: EntityCallback = Rc::new(callback);

        let make_handler = |terms: KeyedTerms| ObserverHandler {
            world: Rc::downgrade(world),
            match_set: cache.match_set().clone(),
            callback: Rc::clone(&callback),
            terms,
        };

        let mut cleanup = Vec::new();

        let presence = group_by_key(
            contexts(&filter.ids, TermSource::Required).chain(contexts(&filter.with, TermSource::With)),
        );
        for terms in presence {
            let key = terms.key;
            let required = terms.has_source(TermSource::Required);
            let handler = make_handler(terms);
            let subscription = if required {
                world.on_changed(key, move |event| handler.on_presence(event))
            } else {
                world.on_added(key, move |event| handler.on_presence(event))
            };
            cleanup.push(subscription);
        }

        for terms in group_by_key(contexts(&filter.without, TermSource::Without)) {
            let key = terms.key;
            let handler = make_handler(terms);
            cleanup.push(world.on_removed(key, move |event| handler.on_absence(event)));
        }

        debug!(terms = filter.ids.len(), hooks = cleanup.len(), "observer connected");
        Ok(Self { cache, cleanup, connected: Cell::new(true) })
    }

    /// Stops all notifications.
    ///
    /// Clears the match set first, then unsubscribes every hook in
    /// registration order. Calling it again is a no-op.
    pub fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }
        self.cache.disconnect();
        for subscription in &self.cleanup {
            subscription.unsubscribe();
        }
        debug!(hooks = self.cleanup.len(), "observer disconnected");
    }

    /// `false` once [`Observer::disconnect`] has run.
    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Archetypes currently satisfying the observed query.
    pub fn match_set(&self) -> &MatchSet {
        self.cache.match_set()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::engine::events::HookKind;

    fn recorder() -> (Rc<RefCell<Vec<Entity>>>, impl Fn(Entity) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |entity| sink.borrow_mut().push(entity))
    }

    #[test]
    fn removing_an_already_absent_excluded_term_does_not_refire() {
        let world = World::new();
        let entity = world.spawn_with(&[5]).unwrap();

        let (seen, callback) = recorder();
        let observer = Observer::new(world.query(&[5]).without(&[9]), callback).unwrap();

        // The entity already lacks 9: the destination equals the current
        // archetype, which was already inside the match set.
        let source = world.record(entity).unwrap();
        world.emit(HookKind::Removed, &ComponentEvent { entity, id: 9, source });

        assert!(seen.borrow().is_empty());
        observer.disconnect();
    }

    #[test]
    fn removal_hook_for_deleted_entity_is_dropped() {
        let world = World::new();
        let entity = world.spawn_with(&[5, 9]).unwrap();

        let (seen, callback) = recorder();
        let _observer = Observer::new(world.query(&[5]).without(&[9]), callback).unwrap();

        let source = world.record(entity).unwrap();
        world.delete(entity).unwrap();
        seen.borrow_mut().clear();

        world.emit(HookKind::Removed, &ComponentEvent { entity, id: 9, source });

        assert!(seen.borrow().is_empty());
    }
}
