//! # Match-set cache
//!
//! A [`MatchSet`] records which archetypes currently satisfy a query. It is
//! seeded from the archetypes that exist when the cache is built and kept
//! current through the world's archetype-lifecycle registry, in the buckets
//! keyed by the query's **first** required term:
//!
//! * `Create`: the new archetype is inserted if it satisfies the query,
//! * `Delete`: the archetype id is dropped.
//!
//! Only archetypes carrying the first term are ever announced to those
//! buckets, so many queries can share the per-id buckets without rescanning
//! the whole archetype table on every mutation. Entity mutations never touch
//! the cache; handlers only perform O(1) membership checks against it.
//!
//! ## Ownership
//! Each observer or monitor owns exactly one cache. The lifecycle callbacks
//! hold clones of the same [`MatchSet`] handle; [`MatchSetCache::disconnect`]
//! unregisters them and clears the set.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::engine::error::{ObserverError, ObserverResult};
use crate::engine::events::ArchetypeEvent;
use crate::engine::query::Query;
use crate::engine::types::ArchetypeID;
use crate::engine::world::Subscription;


/// Shared `ArchetypeID -> bool` membership table.
#[derive(Clone, Default)]
pub struct MatchSet {
    archetypes: Rc<RefCell<HashMap<ArchetypeID, bool>>>,
}

impl MatchSet {
    /// Returns `true` if `archetype` is a member.
    #[inline]
    pub fn contains(&self, archetype: ArchetypeID) -> bool {
        self.archetypes.borrow().get(&archetype).copied().unwrap_or(false)
    }

    /// Member archetype ids in ascending order.
    pub fn ids(&self) -> Vec<ArchetypeID> {
        let mut ids: Vec<ArchetypeID> = self
            .archetypes
            .borrow()
            .iter()
            .filter(|(_, &member)| member)
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of member archetypes.
    pub fn len(&self) -> usize {
        self.archetypes.borrow().len()
    }

    /// Returns `true` when no archetype matches.
    pub fn is_empty(&self) -> bool {
        self.archetypes.borrow().is_empty()
    }

    fn insert(&self, archetype: ArchetypeID) {
        self.archetypes.borrow_mut().insert(archetype, true);
    }

    fn remove(&self, archetype: ArchetypeID) {
        self.archetypes.borrow_mut().remove(&archetype);
    }

    fn clear(&self) {
        self.archetypes.borrow_mut().clear();
    }
}

/// A [`MatchSet`] together with the lifecycle subscriptions that maintain it.
pub struct MatchSetCache {
    match_set: MatchSet,
    on_create: Subscription,
    on_delete: Subscription,
}

impl MatchSetCache {
    /// Seeds a match set for `query` and subscribes it to archetype lifecycle
    /// events keyed by the query's first term.
    ///
    /// ## Errors
    /// [`ObserverError::EmptyQueryTerms`] if the query has no required ids.
    pub fn build(query: &Query) -> ObserverResult<Self> {
        let filter = query.filter();
        let first = filter.first().ok_or(ObserverError::EmptyQueryTerms)?;
        let world = query.world();

        let match_set = MatchSet::default();
        for archetype in world.matching_archetypes(filter) {
            match_set.insert(archetype);
        }

        let on_create = {
            let match_set = match_set.clone();
            world.on_archetype(ArchetypeEvent::Create, first, filter.clone(), move |archetype| {
                match_set.insert(archetype)
            })
        };

        let on_delete = {
            let match_set = match_set.clone();
            world.on_archetype(ArchetypeEvent::Delete, first, filter.clone(), move |archetype| {
                match_set.remove(archetype)
            })
        };

        debug!(first, seeded = match_set.len(), "built match set");
        Ok(Self { match_set, on_create, on_delete })
    }

    /// The live membership table.
    pub fn match_set(&self) -> &MatchSet {
        &self.match_set
    }

    /// Unregisters both lifecycle callbacks and clears the set.
    ///
    /// Safe to call repeatedly.
    pub fn disconnect(&self) {
        self.on_create.unsubscribe();
        self.on_delete.unsubscribe();
        self.match_set.clear();
    }
}
