//! # Monitors
//!
//! A [`Monitor`] reports entities entering and leaving a query's result set.
//! Membership is decided purely by the match set: each structural mutation
//! supplies one `(source, destination)` archetype pair and
//! [`transition`] classifies it. No per-entity state is kept.
//!
//! ```text
//!            added                      removed
//! OUTSIDE ───────────▶ INSIDE ───────────▶ OUTSIDE
//! ```
//!
//! ## Subscriptions
//!
//! Terms are taken from the `with` filter when it is non-empty, otherwise from
//! the required ids. Together with the `without` terms they are grouped by
//! hook bucket, and each bucket gets one `Added` and one `Removed` handler:
//!
//! * **presence** terms report both directions. On `Added` the source comes
//!   from the event and the destination from the record table. On `Removed`
//!   the source is the current record and the destination comes from
//!   `traverse_remove`. An entity with no resolvable record is reported as
//!   removed directly.
//! * **absence** (`without`) terms invert the roles. Gaining an excluded term
//!   can only drive the *removed* path, and losing one can only drive the
//!   *added* path. Both still go through [`transition`].
//!
//! ## Callback slots
//!
//! `added` and `removed` callbacks can be set, replaced, or cleared at any
//! time. Transitions observed while a slot is empty are dropped, not queued.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::engine::entity::Entity;
use crate::engine::error::ObserverResult;
use crate::engine::events::ComponentEvent;
use crate::engine::query::Query;
use crate::engine::types::ArchetypeID;
use crate::engine::world::{Subscription, World};
use crate::observers::match_set::{MatchSet, MatchSetCache};
use crate::observers::observer::EntityCallback;
use crate::observers::term::{contexts, group_by_key, KeyedTerms, TermSource};


/// Direction of a result-set membership change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    /// `OUTSIDE -> INSIDE`.
    Entered,
    /// `INSIDE -> OUTSIDE`.
    Left,
}

/// Classifies a move from `source` to `destination` against `match_set`.
///
/// Returns `None` when the entity stayed inside or stayed outside.
pub fn transition(match_set: &MatchSet, source: ArchetypeID, destination: ArchetypeID) -> Option<Transition> {
    match (match_set.contains(source), match_set.contains(destination)) {
        (false, true) => Some(Transition::Entered),
        (true, false) => Some(Transition::Left),
        _ => None,
    }
}

#[derive(Default)]
struct Slots {
    added: RefCell<Option<EntityCallback>>,
    removed: RefCell<Option<EntityCallback>>,
}

impl Slots {
    fn slot(&self, direction: Transition) -> &RefCell<Option<EntityCallback>> {
        match direction {
            Transition::Entered => &self.added,
            Transition::Left => &self.removed,
        }
    }

    fn is_set(&self, direction: Transition) -> bool {
        self.slot(direction).borrow().is_some()
    }

    fn fire(&self, direction: Transition, entity: Entity) {
        // Clone out of the slot first so the callback may replace it.
        let callback = self.slot(direction).borrow().clone();
        if let Some(callback) = callback {
            callback(entity);
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Roles {
    presence: bool,
    absence: bool,
}

impl Roles {
    fn of(terms: &KeyedTerms) -> Self {
        Self {
            presence: terms.has_source(TermSource::Required) || terms.has_source(TermSource::With),
            absence: terms.has_source(TermSource::Without),
        }
    }

    /// Gaining an id: presence terms report both directions, absence terms only exits.
    fn on_added_allows(self, direction: Transition) -> bool {
        self.presence || (self.absence && direction == Transition::Left)
    }

    /// Losing an id: presence terms report both directions, absence terms only entries.
    fn on_removed_allows(self, direction: Transition) -> bool {
        self.presence || (self.absence && direction == Transition::Entered)
    }
}

struct MonitorHandler {
    world: Weak<World>,
    match_set: MatchSet,
    slots: Rc<Slots>,
    roles: Roles,
}

impl MonitorHandler {
    fn archetype_changed(
        &self,
        entity: Entity,
        source: ArchetypeID,
        destination: ArchetypeID,
        allows: impl Fn(Transition) -> bool,
    ) {
        if let Some(direction) = transition(&self.match_set, source, destination) {
            if allows(direction) {
                self.slots.fire(direction, entity);
            }
        }
    }

    fn on_added(&self, event: &ComponentEvent) {
        if !self.roles.presence && !self.slots.is_set(Transition::Left) {
            return;
        }
        let Some(world) = self.world.upgrade() else { return; };
        let Some(destination) = world.record(event.entity) else {
            trace!(entity = ?event.entity, "dropping add event for deleted entity");
            return;
        };

        let roles = self.roles;
        self.archetype_changed(event.entity, event.source, destination, |direction| {
            roles.on_added_allows(direction)
        });
    }

    fn on_removed(&self, event: &ComponentEvent) {
        if !self.roles.presence && !self.slots.is_set(Transition::Entered) {
            return;
        }
        let Some(world) = self.world.upgrade() else { return; };
        let Some(source) = world.record(event.entity) else {
            if self.roles.presence {
                trace!(entity = ?event.entity, "entity left every archetype; reporting removal");
                self.slots.fire(Transition::Left, event.entity);
            }
            return;
        };

        let destination = match world.traverse_remove(source, event.id) {
            Ok(destination) => destination,
            Err(error) => {
                warn!(%error, entity = ?event.entity, id = event.id, "cannot resolve removal destination");
                return;
            }
        };

        let roles = self.roles;
        self.archetype_changed(event.entity, source, destination, |direction| {
            roles.on_removed_allows(direction)
        });
    }
}

/// Bidirectional "entered / left the result set" subscription.
pub struct Monitor {
    cache: MatchSetCache,
    slots: Rc<Slots>,
    cleanup: Vec<Subscription>,
    connected: Cell<bool>,
}

impl Monitor {
    /// Builds a monitor for `query` with both callback slots empty.
    ///
    /// ## Errors
    /// [`ObserverError::EmptyQueryTerms`](crate::engine::error::ObserverError::EmptyQueryTerms)
    /// if the query has no required ids.
    pub fn new(query: Query) -> ObserverResult<Self> {
        let cache = MatchSetCache::build(&query)?;
        let world = query.world();
        let filter = query.filter();
        let slots = Rc::new(Slots::default());

        let (terms, source) = if filter.with.is_empty() {
            (&filter.ids, TermSource::Required)
        } else {
            (&filter.with, TermSource::With)
        };
        let groups = group_by_key(
            contexts(terms, source).chain(contexts(&filter.without, TermSource::Without)),
        );

        let mut cleanup = Vec::with_capacity(groups.len() * 2);
        for terms in &groups {
            let handler = Rc::new(MonitorHandler {
                world: Rc::downgrade(world),
                match_set: cache.match_set().clone(),
                slots: Rc::clone(&slots),
                roles: Roles::of(terms),
            });

            let on_added = Rc::clone(&handler);
            cleanup.push(world.on_added(terms.key, move |event| on_added.on_added(event)));
            cleanup.push(world.on_removed(terms.key, move |event| handler.on_removed(event)));
        }

        debug!(buckets = groups.len(), hooks = cleanup.len(), "monitor connected");
        Ok(Self { cache, slots, cleanup, connected: Cell::new(true) })
    }

    /// Sets or replaces the callback fired when an entity enters the result set.
    pub fn set_added(&self, callback: impl Fn(Entity) + 'static) {
        *self.slots.added.borrow_mut() = Some(Rc::new(callback));
    }

    /// Sets or replaces the callback fired when an entity leaves the result set.
    pub fn set_removed(&self, callback: impl Fn(Entity) + 'static) {
        *self.slots.removed.borrow_mut() = Some(Rc::new(callback));
    }

    /// Empties the `added` slot.
    pub fn clear_added(&self) {
        self.slots.added.borrow_mut().take();
    }

    /// Empties the `removed` slot.
    pub fn clear_removed(&self) {
        self.slots.removed.borrow_mut().take();
    }

    /// Stops all notifications. Calling it again is a no-op.
    pub fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }
        self.cache.disconnect();
        for subscription in &self.cleanup {
            subscription.unsubscribe();
        }
        debug!(hooks = self.cleanup.len(), "monitor disconnected");
    }

    /// `false` once [`Monitor::disconnect`] has run.
    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Archetypes currently satisfying the monitored query.
    pub fn match_set(&self) -> &MatchSet {
        self.cache.match_set()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::engine::events::HookKind;

    #[test]
    fn removal_of_dangling_entity_reports_removed() {
        let world = World::new();
        let entity = world.spawn_with(&[5]).unwrap();
        let source = world.record(entity).unwrap();

        let monitor = Monitor::new(world.query(&[5])).unwrap();
        let removed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&removed);
        monitor.set_removed(move |e| sink.borrow_mut().push(e));

        world.delete(entity).unwrap();
        assert_eq!(*removed.borrow(), vec![entity]);

        // A removal hook arriving after the record is gone still reports the exit.
        world.emit(HookKind::Removed, &ComponentEvent { entity, id: 5, source });
        assert_eq!(*removed.borrow(), vec![entity, entity]);
    }

    #[test]
    fn transition_classifies_membership_changes() {
        let world = World::new();
        let inside = world.archetype_of(&[5]).unwrap();
        let outside = world.archetype_of(&[7]).unwrap();

        let cache = MatchSetCache::build(&world.query(&[5])).unwrap();
        let set = cache.match_set();

        assert_eq!(transition(set, outside, inside), Some(Transition::Entered));
        assert_eq!(transition(set, inside, outside), Some(Transition::Left));
        assert_eq!(transition(set, inside, inside), None);
        assert_eq!(transition(set, outside, outside), None);
    }
}
