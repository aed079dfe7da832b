//! # Archetypes and the archetype transition graph
//!
//! An [`Archetype`] groups every entity that owns exactly the same set of
//! component ids. Adding or removing a component therefore moves the entity
//! to a neighbouring archetype; [`ArchetypeTable`] owns all archetypes and
//! walks that graph.
//!
//! ## Design
//! - Archetypes are created lazily the first time a signature is reached.
//! - Ids are assigned monotonically and never reused, so an id held by a
//!   match set can never silently start naming a different component set.
//! - Transition edges (`+id` / `-id`) are cached per archetype and purged
//!   when either end is deleted.
//! - Entity rows are dense; removal swap-removes and reports which entity
//!   moved into the vacated row.
//!
//! ## Invariants
//! - `signature_map[sig] == id` iff `archetypes[id]` is live with signature `sig`.
//! - [`ROOT_ARCHETYPE`] (the empty signature) always exists.

use std::collections::HashMap;

use crate::engine::entity::{Entity, RowID};
use crate::engine::error::{WorldError, WorldResult};
use crate::engine::types::{ArchetypeID, ComponentID, Signature, ROOT_ARCHETYPE};


/// Stores the entities that share an identical component signature.
///
/// ## Invariants
/// - `entities[row]` is the entity whose record points at `(self.id, row)`.
/// - Cached edges only point at live archetypes.
#[derive(Debug)]
pub struct Archetype {
    archetype_id: ArchetypeID,
    signature: Signature,
    entities: Vec<Entity>,
    add_edges: HashMap<ComponentID, ArchetypeID>,
    remove_edges: HashMap<ComponentID, ArchetypeID>,
}

impl Archetype {
    /// Creates an empty archetype for `signature`.
    pub fn new(archetype_id: ArchetypeID, signature: Signature) -> Self {
        Self {
            archetype_id,
            signature,
            entities: Vec::new(),
            add_edges: HashMap::new(),
            remove_edges: HashMap::new(),
        }
    }

    /// Returns the `ArchetypeID` associated with this archetype.
    pub fn archetype_id(&self) -> ArchetypeID {
        self.archetype_id
    }

    /// Returns the component set of this archetype.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns `true` if this archetype contains `component_id` exactly.
    #[inline]
    pub fn has(&self, component_id: ComponentID) -> bool {
        self.signature.has(component_id)
    }

    /// Number of entities currently stored.
    pub fn length(&self) -> usize {
        self.entities.len()
    }

    /// Entities stored in this archetype, in row order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Appends `entity` and returns its row.
    pub fn push(&mut self, entity: Entity) -> RowID {
        self.entities.push(entity);
        (self.entities.len() - 1) as RowID
    }

    /// Swap-removes the entity at `row`.
    ///
    /// ## Returns
    /// The entity that was moved into `row` to keep storage dense, if any.
    pub fn swap_remove(&mut self, row: RowID) -> Option<Entity> {
        let row = row as usize;
        if row >= self.entities.len() {
            return None;
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }
}

/// Owner of every archetype plus the signature index and transition cache.
#[derive(Debug)]
pub struct ArchetypeTable {
    archetypes: Vec<Option<Archetype>>,
    signature_map: HashMap<Signature, ArchetypeID>,
}

impl Default for ArchetypeTable {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl ArchetypeTable {
    /// Creates a table holding only the root archetype.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut archetypes = Vec::with_capacity(capacity.max(1));
        archetypes.push(Some(Archetype::new(ROOT_ARCHETYPE, Signature::default())));

        let mut signature_map = HashMap::with_capacity(capacity.max(1));
        signature_map.insert(Signature::default(), ROOT_ARCHETYPE);

        Self { archetypes, signature_map }
    }

    /// Returns the live archetype with this id.
    pub fn get(&self, archetype_id: ArchetypeID) -> Option<&Archetype> {
        self.archetypes.get(archetype_id as usize).and_then(Option::as_ref)
    }

    /// Returns the live archetype with this id, mutably.
    pub fn get_mut(&mut self, archetype_id: ArchetypeID) -> Option<&mut Archetype> {
        self.archetypes.get_mut(archetype_id as usize).and_then(Option::as_mut)
    }

    /// Retrieves the archetype for `signature`, creating it if necessary.
    ///
    /// ## Returns
    /// `(id, created)`; the caller is responsible for announcing creations.
    pub fn get_or_create(&mut self, signature: &Signature) -> (ArchetypeID, bool) {
        if let Some(&id) = self.signature_map.get(signature) {
            return (id, false);
        }

        let id = self.archetypes.len() as ArchetypeID;
        self.signature_map.insert(signature.clone(), id);
        self.archetypes.push(Some(Archetype::new(id, signature.clone())));
        (id, true)
    }

    /// Destination archetype after adding `component_id` to `source`.
    ///
    /// Returns `(destination, created)`. Adding an id already present
    /// yields `source` itself.
    pub fn traverse_add(
        &mut self,
        source: ArchetypeID,
        component_id: ComponentID,
    ) -> WorldResult<(ArchetypeID, bool)> {
        self.traverse(source, component_id, true)
    }

    /// Destination archetype after removing `component_id` from `source`.
    ///
    /// Returns `(destination, created)`. Removing an absent id yields
    /// `source` itself.
    pub fn traverse_remove(
        &mut self,
        source: ArchetypeID,
        component_id: ComponentID,
    ) -> WorldResult<(ArchetypeID, bool)> {
        self.traverse(source, component_id, false)
    }

    fn traverse(
        &mut self,
        source: ArchetypeID,
        component_id: ComponentID,
        adding: bool,
    ) -> WorldResult<(ArchetypeID, bool)> {
        let archetype = self.get(source).ok_or(WorldError::UnknownArchetype(source))?;
        if archetype.has(component_id) == adding {
            return Ok((source, false));
        }

        let edges = if adding { &archetype.add_edges } else { &archetype.remove_edges };
        if let Some(&cached) = edges.get(&component_id) {
            return Ok((cached, false));
        }

        let signature = if adding {
            archetype.signature.with(component_id)
        } else {
            archetype.signature.without(component_id)
        };

        let (destination, created) = self.get_or_create(&signature);

        if let Some(archetype) = self.get_mut(source) {
            let edges = if adding { &mut archetype.add_edges } else { &mut archetype.remove_edges };
            edges.insert(component_id, destination);
        }
        if let Some(archetype) = self.get_mut(destination) {
            let edges = if adding { &mut archetype.remove_edges } else { &mut archetype.add_edges };
            edges.insert(component_id, source);
        }

        Ok((destination, created))
    }

    /// Deletes an empty, non-root archetype.
    ///
    /// ## Errors
    /// - [`WorldError::RootArchetype`] for the root.
    /// - [`WorldError::UnknownArchetype`] if the id is not live.
    /// - [`WorldError::ArchetypeNotEmpty`] if entities still live in it.
    pub fn delete(&mut self, archetype_id: ArchetypeID) -> WorldResult<Archetype> {
        if archetype_id == ROOT_ARCHETYPE {
            return Err(WorldError::RootArchetype);
        }

        let archetype = self.get(archetype_id).ok_or(WorldError::UnknownArchetype(archetype_id))?;
        if archetype.length() > 0 {
            return Err(WorldError::ArchetypeNotEmpty {
                archetype: archetype_id,
                entities: archetype.length(),
            });
        }

        let removed = self.archetypes[archetype_id as usize]
            .take()
            .ok_or(WorldError::UnknownArchetype(archetype_id))?;
        self.signature_map.remove(&removed.signature);

        for archetype in self.archetypes.iter_mut().flatten() {
            archetype.add_edges.retain(|_, target| *target != archetype_id);
            archetype.remove_edges.retain(|_, target| *target != archetype_id);
        }

        Ok(removed)
    }

    /// Ids of live archetypes whose signature satisfies `predicate`.
    pub fn matching(&self, predicate: impl Fn(&Signature) -> bool) -> Vec<ArchetypeID> {
        self.iter()
            .filter(|archetype| predicate(archetype.signature()))
            .map(Archetype::archetype_id)
            .collect()
    }

    /// Ids of live, empty, non-root archetypes.
    pub fn empty_archetypes(&self) -> Vec<ArchetypeID> {
        self.iter()
            .filter(|archetype| archetype.archetype_id() != ROOT_ARCHETYPE && archetype.length() == 0)
            .map(Archetype::archetype_id)
            .collect()
    }

    /// Iterates over live archetypes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter().flatten()
    }

    /// Number of live archetypes, root included.
    pub fn len(&self) -> usize {
        self.signature_map.len()
    }

    /// Always `false` while the root archetype exists.
    pub fn is_empty(&self) -> bool {
        self.signature_map.is_empty()
    }
}
