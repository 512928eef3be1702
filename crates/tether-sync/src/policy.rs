//! Incremental sync policy: a root that is "default" needs no payload at
//! all. The sender transmits only the type id plus a default flag; the
//! receiver synthesizes a fresh default instance from the factory table.
//!
//! The predicate and the synthesize path must stay observably equivalent to
//! encode-then-decode for any default root; the tests pin that.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::{self, DecodeError, TreePayload};
use crate::entity::{AttributeValue, EntityStore, ItemTypeId, LocalId, TypeTable};
use crate::pool::CodecObjectPool;

/// Key of the one attribute a default entity may carry (case-insensitive).
pub const DEFAULT_COUNT_KEY: &str = "count";

/// What travels with a drop announcement: either the bare type id of a
/// default item, or a full flattened subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DropPayload {
    /// Default item: receiver synthesizes from the type id alone.
    Default {
        /// Which item kind to synthesize.
        type_id: ItemTypeId,
    },
    /// Non-default item: full flattened subtree.
    Tree(TreePayload),
}

fn is_default_attribute(key: &str, value: &AttributeValue) -> bool {
    key.eq_ignore_ascii_case(DEFAULT_COUNT_KEY) && *value == AttributeValue::Int(1)
}

/// `true` iff the root carries no slot contents, no container contents, no
/// locked positions, and no attribute other than the well-known `count = 1`
/// default. A dead handle is not default.
pub fn is_default(store: &EntityStore, root: LocalId) -> bool {
    let Some(entity) = store.get(root) else {
        return false;
    };
    entity.slot_count() == 0
        && entity.container_len() == 0
        && entity.locked_positions().is_empty()
        && entity
            .attributes()
            .iter()
            .all(|a| is_default_attribute(&a.key, &a.value))
}

/// Builds the cheapest payload that reproduces `root` on a receiver:
/// type-id-only for a default root, a full tree otherwise. `None` (with a
/// warning) if `root` is not live.
pub fn build_payload(
    store: &EntityStore,
    root: LocalId,
    pool: &CodecObjectPool,
) -> Option<DropPayload> {
    let Some(entity) = store.get(root) else {
        warn!(instance = root.0, "cannot build payload: entity not live");
        return None;
    };
    if is_default(store, root) {
        Some(DropPayload::Default {
            type_id: entity.type_id,
        })
    } else {
        codec::encode(store, root, pool).map(DropPayload::Tree)
    }
}

/// Receiver side: turns a payload into a live entity subtree and returns its
/// root handle. Synthesizes through the factory table for a default payload,
/// runs the full decode otherwise.
pub fn materialize(
    store: &mut EntityStore,
    types: &TypeTable,
    payload: &DropPayload,
) -> Result<LocalId, DecodeError> {
    match payload {
        DropPayload::Default { type_id } => {
            let entity = types
                .instantiate(*type_id)
                .ok_or(DecodeError::UnknownType(*type_id))?;
            Ok(store.insert(entity))
        }
        DropPayload::Tree(tree) => codec::decode(store, types, tree),
    }
}
