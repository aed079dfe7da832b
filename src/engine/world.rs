//! # World: archetype storage and event dispatch
//!
//! The world owns entity records, the archetype table, and the two event
//! registries. It is the storage-engine surface observers and monitors are
//! built against:
//!
//! * per-id hooks: [`World::on_added`], [`World::on_removed`], [`World::on_changed`],
//! * archetype lifecycle: [`World::on_archetype`],
//! * lookups: [`World::record`], [`World::traverse_remove`],
//!   [`World::matching_archetypes`].
//!
//! ## Execution model
//!
//! Single-threaded and synchronous. Every hook fires in-line inside the
//! mutation that caused it. The world is shared as `Rc<World>`; all methods
//! take `&self` and no interior borrow is held while a handler runs, so
//! handlers may look up records, subscribe, unsubscribe, or mutate the world
//! again.
//!
//! ## Event ordering
//!
//! | Operation | Order |
//! |---|---|
//! | `add`, id absent | `Create` (if the destination is new), move, `Added`, `Changed` |
//! | `add`, id present | `Changed` only, with `source` equal to the current archetype |
//! | `remove`, id present | `Removed` (entity still in source), `Create` (if new), move |
//! | `remove`, id absent | nothing |
//! | `delete` | one `remove` per component, then the record is freed |
//!
//! Every structural mutation therefore produces exactly one
//! `(source, destination)` archetype pair. Archetypes emptied by a move are
//! only collected (when [`WorldConfig::auto_cleanup`] is set) after all hooks
//! of that mutation have run.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::engine::archetype::ArchetypeTable;
use crate::engine::entity::{Entities, Entity, EntityLocation};
use crate::engine::error::{WorldError, WorldResult};
use crate::engine::events::{
    ArchetypeEvent, ComponentEvent, HookKind, Registry, SubscriptionKey,
};
use crate::engine::query::{Query, QueryFilter};
use crate::engine::types::{
    hook_key, is_wildcard, ArchetypeID, ComponentID, Signature, ROOT_ARCHETYPE,
};


/// Handler type stored in component-hook buckets.
pub type HookHandler = dyn Fn(&ComponentEvent);

/// Entry stored in archetype-lifecycle buckets.
pub struct ArchetypeObserver {
    filter: QueryFilter,
    callback: Box<dyn Fn(ArchetypeID)>,
}

/// Runtime configuration for a [`World`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldConfig {
    /// Initial capacity of the entity table.
    pub entity_capacity: usize,

    /// Initial capacity of the archetype table.
    pub archetype_capacity: usize,

    /// Delete non-root archetypes as soon as a move leaves them empty.
    pub auto_cleanup: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 1024,
            archetype_capacity: 64,
            auto_cleanup: false,
        }
    }
}

enum SubscriptionTarget {
    Hook(SubscriptionKey<HookKind>),
    Archetype(SubscriptionKey<ArchetypeEvent>),
}

/// Unsubscribe handle returned by every world registration.
///
/// Dropping a `Subscription` does **not** unsubscribe; call
/// [`Subscription::unsubscribe`] explicitly.
pub struct Subscription {
    world: Weak<World>,
    target: SubscriptionTarget,
}

impl Subscription {
    /// Removes the registered handler.
    ///
    /// ## Returns
    /// `false` if it was already removed or the world is gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(world) = self.world.upgrade() else { return false; };
        match &self.target {
            SubscriptionTarget::Hook(key) => world.hooks.borrow_mut().unsubscribe(key),
            SubscriptionTarget::Archetype(key) => world.lifecycle.borrow_mut().unsubscribe(key),
        }
    }
}

/// Archetype-based entity store with synchronous change notification.
pub struct World {
    config: WorldConfig,
    entities: RefCell<Entities>,
    archetypes: RefCell<ArchetypeTable>,
    hooks: RefCell<Registry<HookKind, HookHandler>>,
    lifecycle: RefCell<Registry<ArchetypeEvent, ArchetypeObserver>>,
}

impl World {
    /// Creates a world with the default configuration.
    pub fn new() -> Rc<Self> {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a world with `config`.
    pub fn with_config(config: WorldConfig) -> Rc<Self> {
        Rc::new(Self {
            config,
            entities: RefCell::new(Entities::with_capacity(config.entity_capacity)),
            archetypes: RefCell::new(ArchetypeTable::with_capacity(config.archetype_capacity)),
            hooks: RefCell::new(Registry::new()),
            lifecycle: RefCell::new(Registry::new()),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Begins a query requiring `ids`.
    pub fn query(self: &Rc<Self>, ids: &[ComponentID]) -> Query {
        Query::new(self, ids)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Entities
    // ─────────────────────────────────────────────────────────────────────

    /// Creates an entity with no components (in the root archetype).
    pub fn spawn(&self) -> Entity {
        let mut entities = self.entities.borrow_mut();
        let mut archetypes = self.archetypes.borrow_mut();

        let entity = entities.spawn(EntityLocation { archetype: ROOT_ARCHETYPE, row: 0 });
        let row = archetypes
            .get_mut(ROOT_ARCHETYPE)
            .map(|root| root.push(entity))
            .unwrap_or_default();
        entities.set_location(entity, EntityLocation { archetype: ROOT_ARCHETYPE, row });

        trace!(?entity, "spawned entity");
        entity
    }

    /// Spawns an entity and adds each id in order.
    pub fn spawn_with(&self, ids: &[ComponentID]) -> WorldResult<Entity> {
        let entity = self.spawn();
        for &id in ids {
            self.add(entity, id)?;
        }
        Ok(entity)
    }

    /// Returns `true` if `entity` is live.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.borrow().is_alive(entity)
    }

    /// Current archetype of `entity`, or `None` once it is deleted.
    pub fn record(&self, entity: Entity) -> Option<ArchetypeID> {
        self.entities.borrow().get_location(entity).map(|location| location.archetype)
    }

    /// Returns `true` if `entity` satisfies term `id` (wildcards allowed).
    pub fn has(&self, entity: Entity, id: ComponentID) -> bool {
        self.record(entity).is_some_and(|archetype| self.archetype_has_term(archetype, id))
    }

    /// Adds `id` to `entity`.
    ///
    /// Adding an id that is already present is not a structural change and
    /// only fires [`HookKind::Changed`].
    ///
    /// ## Errors
    /// - [`WorldError::StaleEntity`] if `entity` is not live.
    /// - [`WorldError::WildcardComponent`] if `id` is a wildcard pair.
    pub fn add(&self, entity: Entity, id: ComponentID) -> WorldResult<()> {
        if is_wildcard(id) {
            return Err(WorldError::WildcardComponent(id));
        }

        let source = self.record(entity).ok_or(WorldError::StaleEntity(entity))?;
        let destination = self.traverse_add(source, id)?;
        let event = ComponentEvent { entity, id, source };

        if destination == source {
            self.emit(HookKind::Changed, &event);
            return Ok(());
        }

        self.move_entity(entity, destination)?;
        self.emit(HookKind::Added, &event);
        self.emit(HookKind::Changed, &event);
        self.collect_if_empty(source);
        Ok(())
    }

    /// Removes `id` from `entity`; a no-op if it is absent.
    ///
    /// [`HookKind::Removed`] fires while the entity still sits in its source
    /// archetype. The destination is resolved afterwards, since a handler may
    /// have moved or deleted the entity in the meantime.
    ///
    /// ## Errors
    /// [`WorldError::StaleEntity`] if `entity` is not live.
    pub fn remove(&self, entity: Entity, id: ComponentID) -> WorldResult<()> {
        let source = self.record(entity).ok_or(WorldError::StaleEntity(entity))?;
        if !self.archetype_has(source, id) {
            return Ok(());
        }

        self.emit(HookKind::Removed, &ComponentEvent { entity, id, source });

        let Some(current) = self.record(entity) else {
            trace!(?entity, id, "entity deleted by a removal hook");
            return Ok(());
        };

        let destination = self.traverse_remove(current, id)?;
        if destination != current {
            self.move_entity(entity, destination)?;
            self.collect_if_empty(current);
        }
        Ok(())
    }

    /// Deletes `entity`, removing its components one at a time.
    ///
    /// Components go highest id first, each as its own structural mutation,
    /// and the record is freed afterwards. The intermediate archetypes are
    /// real: an entity holding `{5, 9}` under a query `[5]` without `[9]`
    /// first loses `9` and enters the result set, then loses `5` and leaves
    /// it. Monitors report both transitions and observers fire for the entry.
    ///
    /// ## Errors
    /// [`WorldError::StaleEntity`] if `entity` is not live.
    pub fn delete(&self, entity: Entity) -> WorldResult<()> {
        if !self.is_alive(entity) {
            return Err(WorldError::StaleEntity(entity));
        }

        while let Some(archetype) = self.record(entity) {
            let last = self
                .archetypes
                .borrow()
                .get(archetype)
                .and_then(|a| a.signature().as_slice().last().copied());

            let Some(id) = last else { break; };
            self.remove(entity, id)?;
        }

        let mut entities = self.entities.borrow_mut();
        let Some(location) = entities.get_location(entity) else { return Ok(()); };

        let mut archetypes = self.archetypes.borrow_mut();
        if let Some(archetype) = archetypes.get_mut(location.archetype) {
            if let Some(moved) = archetype.swap_remove(location.row) {
                entities.set_location(moved, location);
            }
        }
        entities.despawn(entity);

        trace!(?entity, "deleted entity");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Archetypes
    // ─────────────────────────────────────────────────────────────────────

    /// Destination archetype after adding `id` to `archetype`.
    ///
    /// Creates (and announces) the destination if needed.
    pub fn traverse_add(&self, archetype: ArchetypeID, id: ComponentID) -> WorldResult<ArchetypeID> {
        let (destination, created) = self.archetypes.borrow_mut().traverse_add(archetype, id)?;
        if created {
            self.announce_created(destination);
        }
        Ok(destination)
    }

    /// Destination archetype after removing `id` from `archetype`.
    ///
    /// Removing an absent id yields `archetype` itself. Creates (and announces)
    /// the destination if needed.
    pub fn traverse_remove(&self, archetype: ArchetypeID, id: ComponentID) -> WorldResult<ArchetypeID> {
        let (destination, created) = self.archetypes.borrow_mut().traverse_remove(archetype, id)?;
        if created {
            self.announce_created(destination);
        }
        Ok(destination)
    }

    /// Returns the archetype holding exactly `ids`, creating it if needed.
    ///
    /// ## Errors
    /// [`WorldError::WildcardComponent`] if any id is a wildcard pair.
    pub fn archetype_of(&self, ids: &[ComponentID]) -> WorldResult<ArchetypeID> {
        if let Some(&wildcard) = ids.iter().find(|&&id| is_wildcard(id)) {
            return Err(WorldError::WildcardComponent(wildcard));
        }

        let signature = Signature::from_ids(ids);
        let (archetype, created) = self.archetypes.borrow_mut().get_or_create(&signature);
        if created {
            self.announce(ArchetypeEvent::Create, archetype, &signature);
        }
        Ok(archetype)
    }

    /// Deletes an empty, non-root archetype and announces it.
    pub fn delete_archetype(&self, archetype: ArchetypeID) -> WorldResult<()> {
        let removed = self.archetypes.borrow_mut().delete(archetype)?;
        self.announce(ArchetypeEvent::Delete, archetype, removed.signature());
        Ok(())
    }

    /// Deletes every empty non-root archetype.
    ///
    /// ## Returns
    /// Number of archetypes deleted.
    pub fn cleanup(&self) -> usize {
        let empty = self.archetypes.borrow().empty_archetypes();
        empty
            .into_iter()
            .filter(|&archetype| self.delete_archetype(archetype).is_ok())
            .count()
    }

    /// Component set of `archetype`, if live.
    pub fn signature(&self, archetype: ArchetypeID) -> Option<Signature> {
        self.archetypes.borrow().get(archetype).map(|a| a.signature().clone())
    }

    /// Entities currently stored in `archetype`.
    pub fn entities_in(&self, archetype: ArchetypeID) -> Vec<Entity> {
        self.archetypes
            .borrow()
            .get(archetype)
            .map(|a| a.entities().to_vec())
            .unwrap_or_default()
    }

    /// Number of live archetypes, root included.
    pub fn archetype_count(&self) -> usize {
        self.archetypes.borrow().len()
    }

    /// Archetypes fully satisfying `filter`.
    pub fn matching_archetypes(&self, filter: &QueryFilter) -> Vec<ArchetypeID> {
        self.archetypes.borrow().matching(|signature| filter.matches(signature))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────

    /// Registers a handler fired after an entity gains `id` (or any pair of
    /// relation `id`).
    pub fn on_added(
        self: &Rc<Self>,
        id: ComponentID,
        handler: impl Fn(&ComponentEvent) + 'static,
    ) -> Subscription {
        self.hook(HookKind::Added, id, Box::new(handler))
    }

    /// Registers a handler fired before an entity loses `id`.
    pub fn on_removed(
        self: &Rc<Self>,
        id: ComponentID,
        handler: impl Fn(&ComponentEvent) + 'static,
    ) -> Subscription {
        self.hook(HookKind::Removed, id, Box::new(handler))
    }

    /// Registers a handler fired whenever `id` is written on an entity.
    pub fn on_changed(
        self: &Rc<Self>,
        id: ComponentID,
        handler: impl Fn(&ComponentEvent) + 'static,
    ) -> Subscription {
        self.hook(HookKind::Changed, id, Box::new(handler))
    }

    fn hook(self: &Rc<Self>, kind: HookKind, id: ComponentID, handler: Box<HookHandler>) -> Subscription {
        let key = self.hooks.borrow_mut().subscribe(kind, hook_key(id), handler);
        trace!(?kind, key = key.term, "registered component hook");
        Subscription { world: Rc::downgrade(self), target: SubscriptionTarget::Hook(key) }
    }

    /// Registers an archetype-lifecycle callback in the `(event, term)` bucket.
    ///
    /// `Create` callbacks fire only for archetypes satisfying `filter`;
    /// `Delete` callbacks fire for every deleted archetype carrying `term`.
    pub fn on_archetype(
        self: &Rc<Self>,
        event: ArchetypeEvent,
        term: ComponentID,
        filter: QueryFilter,
        callback: impl Fn(ArchetypeID) + 'static,
    ) -> Subscription {
        let key = self.lifecycle.borrow_mut().subscribe(
            event,
            term,
            Box::new(ArchetypeObserver { filter, callback: Box::new(callback) }),
        );
        Subscription { world: Rc::downgrade(self), target: SubscriptionTarget::Archetype(key) }
    }

    /// Number of handlers in a component-hook bucket.
    pub fn hook_count(&self, kind: HookKind, id: ComponentID) -> usize {
        self.hooks.borrow().bucket_len(kind, hook_key(id))
    }

    /// Number of callbacks in an archetype-lifecycle bucket.
    pub fn archetype_hook_count(&self, event: ArchetypeEvent, term: ComponentID) -> usize {
        self.lifecycle.borrow().bucket_len(event, term)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn archetype_has(&self, archetype: ArchetypeID, id: ComponentID) -> bool {
        self.archetypes.borrow().get(archetype).is_some_and(|a| a.has(id))
    }

    fn archetype_has_term(&self, archetype: ArchetypeID, id: ComponentID) -> bool {
        self.archetypes
            .borrow()
            .get(archetype)
            .is_some_and(|a| a.signature().has_term(id))
    }

    fn move_entity(&self, entity: Entity, destination: ArchetypeID) -> WorldResult<()> {
        let mut entities = self.entities.borrow_mut();
        let mut archetypes = self.archetypes.borrow_mut();

        let location = entities.get_location(entity).ok_or(WorldError::StaleEntity(entity))?;
        if archetypes.get(destination).is_none() {
            return Err(WorldError::UnknownArchetype(destination));
        }

        if let Some(source) = archetypes.get_mut(location.archetype) {
            if let Some(moved) = source.swap_remove(location.row) {
                entities.set_location(moved, location);
            }
        }

        if let Some(target) = archetypes.get_mut(destination) {
            let row = target.push(entity);
            entities.set_location(entity, EntityLocation { archetype: destination, row });
        }
        Ok(())
    }

    fn collect_if_empty(&self, archetype: ArchetypeID) {
        if !self.config.auto_cleanup || archetype == ROOT_ARCHETYPE {
            return;
        }

        let empty = self.archetypes.borrow().get(archetype).is_some_and(|a| a.length() == 0);
        if empty {
            if let Err(error) = self.delete_archetype(archetype) {
                warn!(archetype, %error, "failed to collect empty archetype");
            }
        }
    }

    pub(crate) fn emit(&self, kind: HookKind, event: &ComponentEvent) {
        let snapshot = self.hooks.borrow().snapshot(kind, hook_key(event.id));
        for entry in snapshot {
            if entry.is_alive() {
                (entry.handler())(event);
            }
        }
    }

    fn announce_created(&self, archetype: ArchetypeID) {
        if let Some(signature) = self.signature(archetype) {
            self.announce(ArchetypeEvent::Create, archetype, &signature);
        }
    }

    fn announce(&self, event: ArchetypeEvent, archetype: ArchetypeID, signature: &Signature) {
        debug!(?event, archetype, components = signature.len(), "archetype lifecycle");

        for key in signature.dispatch_keys() {
            let snapshot = self.lifecycle.borrow().snapshot(event, key);
            for entry in snapshot {
                if !entry.is_alive() {
                    continue;
                }
                let observer = entry.handler();
                if event == ArchetypeEvent::Delete || observer.filter.matches(signature) {
                    (observer.callback)(archetype);
                }
            }
        }
    }
}
