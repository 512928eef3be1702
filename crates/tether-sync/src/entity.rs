//! The synchronizable item model: composite entities with typed attributes,
//! named single-occupancy slots, and a positional container.
//!
//! Entities live in an [`EntityStore`] arena and reference each other by
//! [`LocalId`] handle. Slot and container relations are exclusive-ownership,
//! so a well-formed store holds a forest; the codec relies on callers
//! upholding that.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Process-local handle for an entity in an [`EntityStore`]. Also used as the
/// payload-scoped instance id inside a wire payload; the two namespaces meet
/// only in the codec, which remaps on decode.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LocalId(pub u64);

/// Identifies which concrete item kind to instantiate on the receiving side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Boolean flag.
    Bool(bool),
}

/// A keyed, typed attribute on an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute key (e.g. `"count"`, `"durability"`).
    pub key: String,
    /// Attribute value.
    pub value: AttributeValue,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A composite synchronizable object: a type id, an ordered attribute list,
/// named single-occupancy slots, and a positional multi-occupancy container
/// with an auxiliary set of locked positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Which concrete item kind this is.
    pub type_id: ItemTypeId,
    attributes: Vec<Attribute>,
    slots: BTreeMap<String, LocalId>,
    container: BTreeMap<u32, LocalId>,
    locked_positions: BTreeSet<u32>,
}

impl Entity {
    /// Creates an empty entity of the given type.
    pub fn new(type_id: ItemTypeId) -> Self {
        Self {
            type_id,
            attributes: Vec::new(),
            slots: BTreeMap::new(),
            container: BTreeMap::new(),
            locked_positions: BTreeSet::new(),
        }
    }

    /// The ordered attribute list.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Looks up an attribute value by key.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| &a.value)
    }

    /// Sets an attribute, replacing any existing value under the same key
    /// while preserving its position in the attribute order.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        match self.attributes.iter_mut().find(|a| a.key == key) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { key, value }),
        }
    }

    /// Iterates over occupied slots as `(slot name, child)` pairs.
    pub fn slots(&self) -> impl Iterator<Item = (&str, LocalId)> {
        self.slots.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// The child held in a named slot, if any.
    pub fn slot(&self, name: &str) -> Option<LocalId> {
        self.slots.get(name).copied()
    }

    /// Number of occupied slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Puts `child` into the named slot, returning the previous occupant.
    pub fn set_slot(&mut self, name: impl Into<String>, child: LocalId) -> Option<LocalId> {
        self.slots.insert(name.into(), child)
    }

    /// Empties the named slot, returning the previous occupant.
    pub fn clear_slot(&mut self, name: &str) -> Option<LocalId> {
        self.slots.remove(name)
    }

    /// Iterates over container contents as `(position, child)` pairs in
    /// position order.
    pub fn container(&self) -> impl Iterator<Item = (u32, LocalId)> {
        self.container.iter().map(|(pos, id)| (*pos, *id))
    }

    /// The child at a container position, if any.
    pub fn container_at(&self, position: u32) -> Option<LocalId> {
        self.container.get(&position).copied()
    }

    /// Number of occupied container positions.
    pub fn container_len(&self) -> usize {
        self.container.len()
    }

    /// Places `child` at a container position, returning the previous
    /// occupant of that position.
    pub fn place_in_container(&mut self, position: u32, child: LocalId) -> Option<LocalId> {
        self.container.insert(position, child)
    }

    /// Removes the child at a container position.
    pub fn remove_from_container(&mut self, position: u32) -> Option<LocalId> {
        self.container.remove(&position)
    }

    /// The set of locked container positions.
    pub fn locked_positions(&self) -> &BTreeSet<u32> {
        &self.locked_positions
    }

    /// Marks a container position as locked.
    pub fn lock_position(&mut self, position: u32) {
        self.locked_positions.insert(position);
    }

    /// Unmarks a locked container position.
    pub fn unlock_position(&mut self, position: u32) {
        self.locked_positions.remove(&position);
    }

    /// `true` if this entity holds no sub-entities in any relation.
    pub fn is_leaf(&self) -> bool {
        self.slots.is_empty() && self.container.is_empty()
    }

    /// Iterates over every child reference (slots first, then container).
    pub fn children(&self) -> impl Iterator<Item = LocalId> {
        self.slots
            .values()
            .copied()
            .chain(self.container.values().copied())
    }
}

// ---------------------------------------------------------------------------
// EntityStore
// ---------------------------------------------------------------------------

/// Arena of live entities keyed by [`LocalId`]. Handles are never reused
/// within a store's lifetime.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: HashMap<LocalId, Entity>,
    next_id: u64,
}

impl EntityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entity and returns its fresh handle.
    pub fn insert(&mut self, entity: Entity) -> LocalId {
        self.next_id += 1;
        let id = LocalId(self.next_id);
        self.entities.insert(id, entity);
        id
    }

    /// Returns the entity behind a handle.
    pub fn get(&self, id: LocalId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns the entity behind a handle, mutably.
    pub fn get_mut(&mut self, id: LocalId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// `true` if the handle refers to a live entity.
    pub fn contains(&self, id: LocalId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// `true` if the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Removes a single entity, leaving its children live.
    pub fn remove(&mut self, id: LocalId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Removes an entity and everything transitively reachable through its
    /// slot and container relations. Returns how many entities were removed.
    pub fn remove_subtree(&mut self, root: LocalId) -> usize {
        let mut removed = 0;
        let mut worklist = vec![root];
        while let Some(id) = worklist.pop() {
            if let Some(entity) = self.entities.remove(&id) {
                removed += 1;
                worklist.extend(entity.children());
            }
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// TypeTable
// ---------------------------------------------------------------------------

/// Constructs a fresh default entity of one item kind.
pub type EntityFactory = fn() -> Entity;

/// The type-id → factory table resolved at startup. The codec instantiates
/// received entries exclusively through this table.
#[derive(Debug, Default)]
pub struct TypeTable {
    factories: HashMap<ItemTypeId, EntityFactory>,
}

impl TypeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for one item kind, replacing any previous entry.
    pub fn register(&mut self, type_id: ItemTypeId, factory: EntityFactory) {
        if self.factories.insert(type_id, factory).is_some() {
            tracing::debug!(type_id = type_id.0, "replaced entity factory");
        }
    }

    /// `true` if a factory is registered for the given kind.
    pub fn contains(&self, type_id: ItemTypeId) -> bool {
        self.factories.contains_key(&type_id)
    }

    /// Instantiates a fresh default entity of the given kind, or `None` if
    /// no factory is registered.
    pub fn instantiate(&self, type_id: ItemTypeId) -> Option<Entity> {
        self.factories.get(&type_id).map(|factory| factory())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
