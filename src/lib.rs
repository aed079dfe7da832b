//! # ABM Observers
//!
//! Edge-triggered change notification for an archetype-based
//! Entity-Component store.
//!
//! ## Design Goals
//! - Translate per-component add/remove/change hooks into query-level events
//! - Never rescan the archetype universe on entity mutation
//! - No double-firing or missed transitions with wildcard pairs and exclusions
//! - Explicit, idempotent disconnection
//!
//! Two subscription kinds are provided:
//! - [`Observer`] fires once each time an entity starts satisfying a query.
//! - [`Monitor`] fires `added` / `removed` as entities enter and leave the
//!   result set.
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use abm_observers::prelude::*;
//!
//! let world = World::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//!
//! let observer = Observer::new(world.query(&[5]), move |e| sink.borrow_mut().push(e)).unwrap();
//! let entity = world.spawn_with(&[7, 5]).unwrap();
//! assert_eq!(*seen.borrow(), vec![entity]);
//!
//! observer.disconnect();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(dead_code)]
#![allow(clippy::module_inception)]

pub mod engine;
pub mod observers;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::world::{
    World,
    WorldConfig,
    Subscription,
};

pub use engine::entity::Entity;

pub use engine::query::{
    Query,
    QueryFilter,
};

pub use engine::events::{
    ArchetypeEvent,
    ComponentEvent,
    HookKind,
};

pub use engine::error::{
    ObserverError,
    ObserverResult,
    WorldError,
    WorldResult,
};

pub use engine::types::{
    ArchetypeID,
    ComponentID,
    Signature,
    Term,
    WILDCARD,
    ROOT_ARCHETYPE,
    pair,
    is_pair,
    pair_relation,
    pair_target,
    is_wildcard,
    hook_key,
};

pub use observers::match_set::{MatchSet, MatchSetCache};
pub use observers::observer::Observer;
pub use observers::monitor::{Monitor, Transition};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used types.
///
/// Import with:
/// ```rust
/// use abm_observers::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        World,
        Entity,
        Query,
        Observer,
        Monitor,
        ComponentID,
        WILDCARD,
        pair,
    };
}
