//! Core Identifiers, Pair Encoding, and Signatures
//!
//! This module defines the **fundamental identifiers and component sets** used
//! by the storage engine and by the observer layer built on top of it.
//!
//! ## Component identifiers
//!
//! A [`ComponentID`] is a signed integer:
//!
//! - non-negative values name a plain component or tag,
//! - negative values encode a relationship *pair* `(relation, target)`.
//!
//! Pairs are packed as follows:
//!
//! ```text
//! |id| = | relation (high 16 bits) | target (low 16 bits) |
//! id   = -|id|
//! ```
//!
//! The target value [`WILDCARD`] is reserved and means "any target of this
//! relation". Wildcard pairs never occur on entities; they only appear as
//! query terms.
//!
//! ## Hook keys
//!
//! Per-component event hooks are keyed by [`hook_key`]: the relation for pairs,
//! the id itself for plain components. All pairs of one relation therefore
//! share one event bucket, and handlers decide which concrete pair they care
//! about (see [`Term::accepts`]).
//!
//! ## Signatures
//!
//! Archetypes are identified by a [`Signature`], a sorted and deduplicated set
//! of component ids. Unlike a fixed bitset, a sorted set can carry packed pair
//! ids, which may be arbitrarily large negative numbers.

/// Identifier for a plain component (non-negative) or a packed pair (negative).
pub type ComponentID = i64;

/// Unique identifier for an archetype.
pub type ArchetypeID = u32;

/// Relation or target half of a packed pair.
pub type PairHalf = u16;

/// Target sentinel meaning "any target for this relation".
pub const WILDCARD: PairHalf = PairHalf::MAX;

/// Identifier of the archetype holding entities with no components.
pub const ROOT_ARCHETYPE: ArchetypeID = 0;

/// Number of bits reserved for the target half of a pair.
pub const PAIR_TARGET_BITS: u32 = 16;

const PAIR_TARGET_MASK: i64 = (1 << PAIR_TARGET_BITS) - 1;

/// Packs `(relation, target)` into a pair id.
///
/// ## Notes
/// Relation `0` is reserved: `pair(0, 0)` would collide with plain id `0`.
#[inline]
pub const fn pair(relation: PairHalf, target: PairHalf) -> ComponentID {
    -(((relation as i64) << PAIR_TARGET_BITS) | (target as i64))
}

/// Returns `true` if `id` encodes a relationship pair.
#[inline]
pub const fn is_pair(id: ComponentID) -> bool {
    id < 0
}

/// Returns the relation half of a pair id.
#[inline]
pub const fn pair_relation(id: ComponentID) -> PairHalf {
    (id.unsigned_abs() >> PAIR_TARGET_BITS) as PairHalf
}

/// Returns the target half of a pair id.
#[inline]
pub const fn pair_target(id: ComponentID) -> PairHalf {
    (id.unsigned_abs() as i64 & PAIR_TARGET_MASK) as PairHalf
}

/// Returns `true` if `id` is a pair whose target is [`WILDCARD`].
#[inline]
pub const fn is_wildcard(id: ComponentID) -> bool {
    is_pair(id) && pair_target(id) == WILDCARD
}

/// Returns the event-hook bucket key for `id`.
///
/// Pairs are keyed by their relation, plain ids by themselves.
#[inline]
pub const fn hook_key(id: ComponentID) -> ComponentID {
    if is_pair(id) { pair_relation(id) as ComponentID } else { id }
}

/// Decoded kind of a query term.
///
/// ## Purpose
/// Handlers capture a `Term` by value at registration time, so each handler
/// carries its own decoded relation/target instead of re-reading shared state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// Plain component or tag.
    Plain(ComponentID),

    /// Pair with a concrete target.
    Pair {
        /// Relation half.
        relation: PairHalf,
        /// Target half.
        target: PairHalf,
    },

    /// Pair matching any target of `relation`.
    WildcardPair {
        /// Relation half.
        relation: PairHalf,
    },
}

impl Term {
    /// Decodes a raw term id.
    pub const fn decode(id: ComponentID) -> Self {
        if !is_pair(id) {
            Term::Plain(id)
        } else if pair_target(id) == WILDCARD {
            Term::WildcardPair { relation: pair_relation(id) }
        } else {
            Term::Pair { relation: pair_relation(id), target: pair_target(id) }
        }
    }

    /// Re-encodes this term as a raw id.
    pub const fn id(self) -> ComponentID {
        match self {
            Term::Plain(id) => id,
            Term::Pair { relation, target } => pair(relation, target),
            Term::WildcardPair { relation } => pair(relation, WILDCARD),
        }
    }

    /// Returns the hook bucket this term listens on.
    pub const fn key(self) -> ComponentID {
        match self {
            Term::Plain(id) => id,
            Term::Pair { relation, .. } | Term::WildcardPair { relation } => relation as ComponentID,
        }
    }

    /// Returns `true` if an event for `changed` in this term's bucket concerns the term.
    ///
    /// Plain and wildcard terms accept every event of their bucket; a concrete
    /// pair accepts only its exact id.
    pub const fn accepts(self, changed: ComponentID) -> bool {
        match self {
            Term::Plain(_) | Term::WildcardPair { .. } => true,
            Term::Pair { relation, target } => changed == pair(relation, target),
        }
    }
}

/// Sorted, deduplicated set of component ids describing an archetype.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    ids: Vec<ComponentID>,
}

impl Signature {
    /// Builds a signature from an arbitrary list of ids.
    pub fn from_ids(ids: &[ComponentID]) -> Self {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    /// Inserts `id`; returns `false` if it was already present.
    #[inline]
    pub fn set(&mut self, id: ComponentID) -> bool {
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(index) => {
                self.ids.insert(index, id);
                true
            }
        }
    }

    /// Removes `id`; returns `false` if it was absent.
    #[inline]
    pub fn clear(&mut self, id: ComponentID) -> bool {
        match self.ids.binary_search(&id) {
            Ok(index) => {
                self.ids.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns a copy of this signature with `id` added.
    pub fn with(&self, id: ComponentID) -> Self {
        let mut next = self.clone();
        next.set(id);
        next
    }

    /// Returns a copy of this signature with `id` removed.
    pub fn without(&self, id: ComponentID) -> Self {
        let mut next = self.clone();
        next.clear(id);
        next
    }

    /// Returns `true` if `id` is present exactly.
    #[inline]
    pub fn has(&self, id: ComponentID) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Returns `true` if the signature satisfies a query term.
    ///
    /// Wildcard pairs are satisfied by any pair sharing the relation.
    pub fn has_term(&self, term: ComponentID) -> bool {
        if is_wildcard(term) {
            let relation = pair_relation(term);
            self.ids
                .iter()
                .take_while(|&&id| is_pair(id))
                .any(|&id| pair_relation(id) == relation)
        } else {
            self.has(term)
        }
    }

    /// Iterates over the ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentID> + '_ {
        self.ids.iter().copied()
    }

    /// Returns the ids as a sorted slice.
    pub fn as_slice(&self) -> &[ComponentID] {
        &self.ids
    }

    /// Number of ids in the signature.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` for the empty (root) signature.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the hook and lifecycle keys an archetype with this signature
    /// dispatches to: every id, plus one wildcard pair per relation present.
    pub fn dispatch_keys(&self) -> Vec<ComponentID> {
        let mut keys = self.ids.clone();
        for &id in &self.ids {
            if is_pair(id) {
                keys.push(pair(pair_relation(id), WILDCARD));
            }
        }
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}
