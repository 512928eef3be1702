//! Tree codec: flattens a rooted item graph into a relocatable payload of
//! flat entries, and rebuilds the graph on the receiving side.
//!
//! Encoding visits the root and every slot/container-referenced entity
//! exactly once and emits one [`FlatEntry`] per distinct entity. Decoding is
//! two-phase: instantiate every entry by type id, then relink references.
//! A payload that cannot be decoded in full is rejected in full; no partial
//! graph is ever left live.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::attribute::{AttributeRecord, decode_attribute, encode_attribute};
use crate::entity::{EntityStore, ItemTypeId, LocalId, TypeTable};
use crate::pool::CodecObjectPool;

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

/// One occupied slot: slot name plus the payload-scoped id of its occupant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    /// Slot name.
    pub slot: String,
    /// Instance id of the occupant, resolved within the same payload.
    pub child: LocalId,
}

/// One occupied container position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Container position.
    pub position: u32,
    /// Instance id of the occupant, resolved within the same payload.
    pub child: LocalId,
}

/// The wire-level projection of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatEntry {
    /// Payload-scoped instance id of this entry.
    pub instance_id: LocalId,
    /// Which item kind to instantiate on the receiving side.
    pub type_id: ItemTypeId,
    /// Attribute records.
    pub attributes: Vec<AttributeRecord>,
    /// Occupied slots.
    pub slot_contents: Vec<SlotRecord>,
    /// Occupied container positions.
    pub container_contents: Vec<ContainerRecord>,
    /// Locked container positions.
    pub locked_positions: Vec<u32>,
}

/// A flattened item subtree. Closed-graph invariant: every instance id
/// referenced by any entry appears as some entry's `instance_id` in the same
/// payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreePayload {
    /// Instance id of the root entry.
    pub root: LocalId,
    /// Unordered flat entries, one per distinct entity in the subtree.
    pub entries: Vec<FlatEntry>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural violations that reject a whole payload at decode time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// No factory is registered for a type id in the payload.
    #[error("no factory registered for type id {}", .0.0)]
    UnknownType(ItemTypeId),
    /// An entry references an instance id with no entry of its own.
    #[error("reference to instance id {} absent from the payload", .0.0)]
    DanglingReference(LocalId),
    /// Two entries claim the same instance id.
    #[error("instance id {} appears more than once in the payload", .0.0)]
    DuplicateInstance(LocalId),
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Flattens the subtree rooted at `root` into a [`TreePayload`].
///
/// Returns `None` (with a warning) if `root` is not live in `store`. A child
/// reference to a missing entity is skipped with a warning so the emitted
/// payload stays closed. Entry and payload records are drawn from `pool`.
pub fn encode(store: &EntityStore, root: LocalId, pool: &CodecObjectPool) -> Option<TreePayload> {
    if !store.contains(root) {
        warn!(instance = root.0, "cannot encode: root entity not live");
        return None;
    }

    let mut payload = pool.acquire_payload();
    payload.root = root;

    let mut visited: HashSet<LocalId> = HashSet::new();
    let mut worklist = vec![root];
    while let Some(id) = worklist.pop() {
        if !visited.insert(id) {
            continue;
        }
        // Live by construction: ids only enter the worklist after the
        // contains() check below.
        let Some(entity) = store.get(id) else {
            continue;
        };

        let mut entry = pool.acquire_entry();
        entry.instance_id = id;
        entry.type_id = entity.type_id;

        for attribute in entity.attributes() {
            if let Some(record) = encode_attribute(attribute) {
                entry.attributes.push(record);
            }
        }
        for (slot, child) in entity.slots() {
            if store.contains(child) {
                entry.slot_contents.push(SlotRecord {
                    slot: slot.to_string(),
                    child,
                });
                worklist.push(child);
            } else {
                warn!(
                    instance = id.0,
                    slot, "slot references dead entity; omitting from payload"
                );
            }
        }
        for (position, child) in entity.container() {
            if store.contains(child) {
                entry
                    .container_contents
                    .push(ContainerRecord { position, child });
                worklist.push(child);
            } else {
                warn!(
                    instance = id.0,
                    position, "container references dead entity; omitting from payload"
                );
            }
        }
        entry
            .locked_positions
            .extend(entity.locked_positions().iter().copied());

        payload.entries.push(entry);
    }

    debug!(
        root = root.0,
        entries = payload.entries.len(),
        "encoded item tree"
    );
    Some(payload)
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Rebuilds an item graph from a payload and returns the handle of its root.
///
/// Phase 1 instantiates every entry through `types` and validates the whole
/// payload; `store` is untouched until validation passes, so a rejected
/// payload leaves no partial graph. Phase 2 inserts the staged entities and
/// relinks slot references, container references, and locked positions.
///
/// Decode is pure with respect to the identity registry; registration is the
/// caller's responsibility.
pub fn decode(
    store: &mut EntityStore,
    types: &TypeTable,
    payload: &TreePayload,
) -> Result<LocalId, DecodeError> {
    // Phase 1: instantiate and stage.
    let mut staged = HashMap::with_capacity(payload.entries.len());
    for entry in &payload.entries {
        if staged.contains_key(&entry.instance_id) {
            warn!(instance = entry.instance_id.0, "duplicate entry in payload");
            return Err(DecodeError::DuplicateInstance(entry.instance_id));
        }
        let Some(mut entity) = types.instantiate(entry.type_id) else {
            warn!(type_id = entry.type_id.0, "cannot instantiate type id");
            return Err(DecodeError::UnknownType(entry.type_id));
        };
        for record in &entry.attributes {
            if let Some(attribute) = decode_attribute(record) {
                entity.set_attribute(attribute.key, attribute.value);
            }
        }
        staged.insert(entry.instance_id, entity);
    }

    // Closed-graph validation before anything goes live.
    if !staged.contains_key(&payload.root) {
        warn!(instance = payload.root.0, "payload root has no entry");
        return Err(DecodeError::DanglingReference(payload.root));
    }
    for entry in &payload.entries {
        for record in &entry.slot_contents {
            if !staged.contains_key(&record.child) {
                warn!(instance = record.child.0, "dangling slot reference");
                return Err(DecodeError::DanglingReference(record.child));
            }
        }
        for record in &entry.container_contents {
            if !staged.contains_key(&record.child) {
                warn!(instance = record.child.0, "dangling container reference");
                return Err(DecodeError::DanglingReference(record.child));
            }
        }
    }

    // Phase 2: insert and relink. Wire instance ids are payload-scoped, so
    // every staged entity gets a fresh local handle.
    let mut id_map: HashMap<LocalId, LocalId> = HashMap::with_capacity(staged.len());
    for (wire_id, entity) in staged {
        let local = store.insert(entity);
        id_map.insert(wire_id, local);
    }
    for entry in &payload.entries {
        let Some(&local) = id_map.get(&entry.instance_id) else {
            continue;
        };
        let Some(entity) = store.get_mut(local) else {
            continue;
        };
        for record in &entry.slot_contents {
            if let Some(&child) = id_map.get(&record.child) {
                entity.set_slot(record.slot.clone(), child);
            }
        }
        for record in &entry.container_contents {
            if let Some(&child) = id_map.get(&record.child) {
                entity.place_in_container(record.position, child);
            }
        }
        for &position in &entry.locked_positions {
            entity.lock_position(position);
        }
    }

    let root = id_map
        .get(&payload.root)
        .copied()
        .ok_or(DecodeError::DanglingReference(payload.root))?;
    debug!(
        root = root.0,
        entries = payload.entries.len(),
        "decoded item tree"
    );
    Ok(root)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
