//! # Event registries
//!
//! The storage engine announces two families of events:
//!
//! * **component hooks** ([`HookKind`]): an entity gained, lost, or rewrote a
//!   component id; bucketed by [`hook_key`](crate::engine::types::hook_key);
//! * **archetype lifecycle** ([`ArchetypeEvent`]): an archetype was created or
//!   deleted; bucketed by every id the archetype carries.
//!
//! Both are stored in a [`Registry`]: an explicit two-level mapping
//! `(kind, term) -> ordered entries`.
//!
//! ## Dispatch model
//! Dispatch is *snapshot-then-iterate*: the dispatcher copies a bucket
//! ([`Registry::snapshot`]) and releases the registry before invoking any
//! handler, so handlers may subscribe or unsubscribe freely. Every entry also
//! carries a liveness flag that [`Registry::unsubscribe`] clears; a snapshot
//! taken before the unsubscribe still skips the entry.
//!
//! ## Invariants
//! - Entries in one bucket are kept in registration order.
//! - Sequence numbers are unique per registry, so keys never alias between
//!   subscribers that share a bucket.
//! - Removing an absent key is a no-op.

use std::cell::Cell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::engine::entity::Entity;
use crate::engine::types::{ArchetypeID, ComponentID};


/// Per-component hook kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// The entity gained the id; fired after it moved to its new archetype.
    Added,
    /// The entity is about to lose the id; fired before it moves.
    Removed,
    /// The id was written on the entity, whether newly added or rewritten.
    Changed,
}

/// Archetype lifecycle events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchetypeEvent {
    /// A new archetype was created.
    Create,
    /// An empty archetype was deleted.
    Delete,
}

/// Payload handed to component hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentEvent {
    /// Entity whose component set changed.
    pub entity: Entity,

    /// Exact id involved; a concrete pair for relation buckets.
    pub id: ComponentID,

    /// Archetype the entity occupied before the mutation.
    ///
    /// For [`HookKind::Removed`] the entity is still there when the hook fires.
    /// For a [`HookKind::Changed`] rewrite of an id already present this equals
    /// the current archetype.
    pub source: ArchetypeID,
}

/// Identifies one registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionKey<K> {
    /// Event kind of the bucket.
    pub kind: K,
    /// Term id of the bucket.
    pub term: ComponentID,
    sequence: u64,
}

/// A registered handler.
pub struct Entry<H: ?Sized> {
    sequence: u64,
    alive: Cell<bool>,
    handler: Box<H>,
}

impl<H: ?Sized> Entry<H> {
    /// `false` once the entry has been unsubscribed.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    /// The registered handler.
    #[inline]
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Two-level mapping from `(kind, term)` to ordered handler entries.
pub struct Registry<K, H: ?Sized> {
    buckets: HashMap<(K, ComponentID), Vec<Rc<Entry<H>>>>,
    next_sequence: u64,
}

impl<K, H: ?Sized> Default for Registry<K, H> {
    fn default() -> Self {
        Self { buckets: HashMap::new(), next_sequence: 0 }
    }
}

impl<K, H> Registry<K, H>
where
    K: Copy + Eq + Hash,
    H: ?Sized,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the `(kind, term)` bucket.
    pub fn subscribe(&mut self, kind: K, term: ComponentID, handler: Box<H>) -> SubscriptionKey<K> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.buckets.entry((kind, term)).or_default().push(Rc::new(Entry {
            sequence,
            alive: Cell::new(true),
            handler,
        }));

        SubscriptionKey { kind, term, sequence }
    }

    /// Removes the entry named by `key`.
    ///
    /// ## Returns
    /// `false` if the entry was already gone.
    pub fn unsubscribe(&mut self, key: &SubscriptionKey<K>) -> bool {
        let bucket_key = (key.kind, key.term);
        let Some(bucket) = self.buckets.get_mut(&bucket_key) else { return false; };
        let Some(index) = bucket.iter().position(|entry| entry.sequence == key.sequence) else {
            return false;
        };

        let entry = bucket.remove(index);
        entry.alive.set(false);

        if bucket.is_empty() {
            self.buckets.remove(&bucket_key);
        }
        true
    }

    /// Copies the `(kind, term)` bucket for dispatch.
    pub fn snapshot(&self, kind: K, term: ComponentID) -> Vec<Rc<Entry<H>>> {
        self.buckets
            .get(&(kind, term))
            .map(|bucket| bucket.to_vec())
            .unwrap_or_default()
    }

    /// Number of live entries in the `(kind, term)` bucket.
    pub fn bucket_len(&self, kind: K, term: ComponentID) -> usize {
        self.buckets.get(&(kind, term)).map_or(0, Vec::len)
    }
}
