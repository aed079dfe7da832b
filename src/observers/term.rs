//! Per-term subscription plans.
//!
//! Before any handler is registered, each query term is decoded once into a
//! [`TermContext`] and the contexts are grouped by hook bucket. Every handler
//! then owns a copy of its [`KeyedTerms`] group, so no handler ever reads a
//! term through shared, mutable state.
//!
//! Grouping by bucket also guarantees that one mutation reaches at most one
//! handler per subscription. Two terms of the same relation, or a term listed
//! both as required and as a `with` filter, share a single handler.

use crate::engine::types::{ComponentID, Term};


/// Which list of the query a term came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TermSource {
    /// Primary required ids.
    Required,
    /// `with` filter.
    With,
    /// `without` filter.
    Without,
}

/// A decoded term and its origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TermContext {
    /// Decoded term.
    pub term: Term,
    /// List the term was declared in.
    pub source: TermSource,
}

impl TermContext {
    /// Decodes `id` as a term from `source`.
    pub fn new(id: ComponentID, source: TermSource) -> Self {
        Self { term: Term::decode(id), source }
    }

    /// Hook bucket of this term.
    #[inline]
    pub fn key(&self) -> ComponentID {
        self.term.key()
    }
}

/// All terms of one subscription that listen on the same hook bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyedTerms {
    /// Hook bucket shared by every term of the group.
    pub key: ComponentID,
    /// Terms in declaration order, without duplicates.
    pub terms: Vec<TermContext>,
}

impl KeyedTerms {
    /// Returns `true` if an event for `changed` concerns any term of the group.
    pub fn accepts(&self, changed: ComponentID) -> bool {
        self.terms.iter().any(|context| context.term.accepts(changed))
    }

    /// Returns `true` if any term of the group came from `source`.
    pub fn has_source(&self, source: TermSource) -> bool {
        self.terms.iter().any(|context| context.source == source)
    }
}

/// Decodes `ids` as terms from `source`.
pub fn contexts(ids: &[ComponentID], source: TermSource) -> impl Iterator<Item = TermContext> + '_ {
    ids.iter().map(move |&id| TermContext::new(id, source))
}

/// Groups contexts by hook bucket, keeping buckets in order of first appearance.
pub fn group_by_key(contexts: impl IntoIterator<Item = TermContext>) -> Vec<KeyedTerms> {
    let mut groups: Vec<KeyedTerms> = Vec::new();
    for context in contexts {
        match groups.iter_mut().find(|group| group.key == context.key()) {
            Some(group) => {
                if !group.terms.contains(&context) {
                    group.terms.push(context);
                }
            }
            None => groups.push(KeyedTerms { key: context.key(), terms: vec![context] }),
        }
    }
    groups
}
