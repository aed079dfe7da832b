//! Entity handles and the entity-to-archetype record table.
//!
//! Entities are packed 64-bit handles:
//!
//! ```text
//! | version (32 bits) | index (32 bits) |
//! ```
//!
//! The index addresses a slot in [`Entities`]; the version is bumped every time
//! the slot is freed, so handles held past a despawn are detected as stale.
//! The slot's [`EntityLocation`] is the *record* observers consult to find an
//! entity's current archetype.

use crate::engine::types::ArchetypeID;

/// Raw packed entity identifier.
pub type EntityID = u64;
/// Slot index within the entity table.
pub type IndexID = u32;
/// Generation counter used to detect stale handles.
pub type VersionID = u32;
/// Row index of an entity inside its archetype.
pub type RowID = u32;

const INDEX_BITS: u32 = 32;
const INDEX_MASK: EntityID = (1 << INDEX_BITS) - 1;

/// Opaque entity handle.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Entity(pub EntityID);

#[inline]
const fn make_entity(index: IndexID, version: VersionID) -> Entity {
    Entity(((version as EntityID) << INDEX_BITS) | index as EntityID)
}

impl Entity {
    /// Slot index of this handle.
    #[inline] pub fn index(self) -> IndexID { (self.0 & INDEX_MASK) as IndexID }
    /// Generation of this handle.
    #[inline] pub fn version(self) -> VersionID { (self.0 >> INDEX_BITS) as VersionID }
}

/// Where an entity currently lives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityLocation {
    /// Archetype holding the entity.
    pub archetype: ArchetypeID,
    /// Row inside that archetype.
    pub row: RowID,
}

/// Slot allocator and record table for entities.
#[derive(Default)]
pub struct Entities {
    versions: Vec<VersionID>,
    free_store: Vec<IndexID>,
    alive: Vec<bool>,
    locations: Vec<EntityLocation>,
}

impl Entities {
    /// Creates an empty table with room for `capacity` entities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            versions: Vec::with_capacity(capacity),
            free_store: Vec::new(),
            alive: Vec::with_capacity(capacity),
            locations: Vec::with_capacity(capacity),
        }
    }

    /// Allocates a slot (reusing a freed one if possible) placed at `location`.
    pub fn spawn(&mut self, location: EntityLocation) -> Entity {
        let index = match self.free_store.pop() {
            Some(i) => i,
            None => {
                self.versions.push(0);
                self.alive.push(false);
                self.locations.push(EntityLocation::default());
                (self.versions.len() - 1) as IndexID
            }
        };

        let slot = index as usize;
        self.alive[slot] = true;
        self.locations[slot] = location;
        make_entity(index, self.versions[slot])
    }

    /// Frees the slot and bumps its version.
    ///
    /// ## Returns
    /// `false` if `entity` was already stale.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) { return false; }
        let slot = entity.index() as usize;
        self.versions[slot] = self.versions[slot].wrapping_add(1);
        self.alive[slot] = false;
        self.locations[slot] = EntityLocation::default();
        self.free_store.push(entity.index());
        true
    }

    /// Returns `true` if `entity` is live and its version is current.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let slot = entity.index() as usize;
        slot < self.versions.len()
            && self.alive[slot]
            && self.versions[slot] == entity.version()
    }

    /// Record of a live entity.
    pub fn get_location(&self, entity: Entity) -> Option<EntityLocation> {
        if self.is_alive(entity) {
            Some(self.locations[entity.index() as usize])
        } else {
            None
        }
    }

    /// Updates the record of a live entity; ignored for stale handles.
    pub fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        debug_assert!(
            self.is_alive(entity),
            "set_location was called on a dead or stale entity. Entity: {:?}, Location: {:?}",
            entity, location
        );
        if self.is_alive(entity) {
            self.locations[entity.index() as usize] = location;
        }
    }
}
