//! Error types for the storage engine and the observer layer.
//!
//! This module declares small, focused error types. Each carries enough
//! context to make a failure actionable in logs.
//!
//! ## Goals
//! * **Specificity:** each variant models a single failure mode (stale entity
//!   handles, unknown archetypes, deleting a populated archetype).
//! * **Locality:** the observer layer only surfaces constructor-time
//!   validation errors. Conditions that arise while a hook is dispatching
//!   (an entity deleted mid-chain, a second `disconnect`) are resolved inside
//!   the engine and never reach the caller.
//!
//! ## Typical flow
//! ```ignore
//! let query = world.query(&[position]).without(&[frozen]);
//! let observer = Observer::new(query, |entity| println!("{entity:?} moved in"))?;
//! // ...
//! observer.disconnect();
//! ```
//!
//! ## Display vs. Debug
//! * `Display` is short and suitable for operator logs.
//! * `Debug` (derived) retains full structure for diagnostics.

use thiserror::Error;

use crate::engine::entity::Entity;
use crate::engine::types::{ArchetypeID, ComponentID};


/// Errors raised while building an observer or monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ObserverError {
    /// The query has no required ids, so there is no first term to key
    /// archetype-lifecycle events on.
    #[error("query has no required terms")]
    EmptyQueryTerms,
}

/// Errors raised by structural world operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorldError {
    /// An entity handle was despawned or its version no longer matches.
    #[error("stale or dead entity reference {0:?}")]
    StaleEntity(Entity),

    /// No live archetype exists with this id.
    #[error("unknown archetype {0}")]
    UnknownArchetype(ArchetypeID),

    /// Archetypes can only be deleted once no entity lives in them.
    #[error("archetype {archetype} still holds {entities} entities")]
    ArchetypeNotEmpty {
        /// Archetype the caller tried to delete.
        archetype: ArchetypeID,
        /// Number of entities still stored in it.
        entities: usize,
    },

    /// Wildcard pairs are query terms only and cannot be stored on entities.
    #[error("component id {0} is a wildcard pair and cannot be stored")]
    WildcardComponent(ComponentID),

    /// The root (empty) archetype is permanent.
    #[error("the root archetype cannot be deleted")]
    RootArchetype,
}

/// Result alias for observer construction.
pub type ObserverResult<T> = Result<T, ObserverError>;

/// Result alias for structural world operations.
pub type WorldResult<T> = Result<T, WorldError>;
