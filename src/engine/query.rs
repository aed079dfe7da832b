//! Query definitions consumed by observers and monitors.
//!
//! A query names:
//! * `ids`: required terms, in order; the first one keys archetype-lifecycle
//!   events,
//! * `with`: additional required terms,
//! * `without`: forbidden terms.
//!
//! Pair terms whose target is [`WILDCARD`](crate::engine::types::WILDCARD) are
//! satisfied by any target of the relation.
//!
//! ## Example
//! ```ignore
//! let query = world
//!     .query(&[position])
//!     .with(&[pair(likes, WILDCARD)])
//!     .without(&[frozen]);
//! ```

use std::rc::Rc;

use crate::engine::types::{ArchetypeID, ComponentID, Signature};
use crate::engine::world::World;


/// World-independent term lists of a query.
///
/// This is the part of a query stored in archetype-lifecycle registries; it
/// holds no reference back to the world.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryFilter {
    /// Required terms, in declaration order.
    pub ids: Vec<ComponentID>,

    /// Additional required terms.
    pub with: Vec<ComponentID>,

    /// Forbidden terms.
    pub without: Vec<ComponentID>,
}

impl QueryFilter {
    /// Creates a filter requiring `ids`.
    pub fn new(ids: &[ComponentID]) -> Self {
        Self { ids: ids.to_vec(), with: Vec::new(), without: Vec::new() }
    }

    /// First required term, if any.
    pub fn first(&self) -> Option<ComponentID> {
        self.ids.first().copied()
    }

    /// Returns `true` if an archetype with `signature` fully satisfies the query.
    pub fn matches(&self, signature: &Signature) -> bool {
        self.ids.iter().all(|&id| signature.has_term(id))
            && self.with.iter().all(|&id| signature.has_term(id))
            && !self.without.iter().any(|&id| signature.has_term(id))
    }
}

/// A query bound to its owning world.
///
/// The query is consumed when an observer or monitor is built from it.
#[derive(Clone)]
pub struct Query {
    world: Rc<World>,
    filter: QueryFilter,
}

impl Query {
    /// Creates a query over `world` requiring `ids`.
    pub fn new(world: &Rc<World>, ids: &[ComponentID]) -> Self {
        Self { world: Rc::clone(world), filter: QueryFilter::new(ids) }
    }

    /// Adds terms that must also be present.
    pub fn with(mut self, ids: &[ComponentID]) -> Self {
        self.filter.with.extend_from_slice(ids);
        self
    }

    /// Adds terms that must be absent.
    pub fn without(mut self, ids: &[ComponentID]) -> Self {
        self.filter.without.extend_from_slice(ids);
        self
    }

    /// Required terms.
    pub fn ids(&self) -> &[ComponentID] {
        &self.filter.ids
    }

    /// Term lists of this query.
    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    /// Owning world.
    pub fn world(&self) -> &Rc<World> {
        &self.world
    }

    /// Archetypes that currently satisfy the query.
    pub fn archetypes(&self) -> Vec<ArchetypeID> {
        self.world.matching_archetypes(&self.filter)
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query").field("filter", &self.filter).finish_non_exhaustive()
    }
}
