//! Identity registry: the bidirectional mapping between server-assigned drop
//! identities and local entity handles. Single source of truth for "is this
//! network object known locally."
//!
//! Both directions are kept in step inside one lock, so no caller can ever
//! observe an orphaned half-mapping.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entity::LocalId;

// ---------------------------------------------------------------------------
// DropId
// ---------------------------------------------------------------------------

/// Server-allocated handle identifying one networked drop across all actors
/// for the lifetime of the shared session. `0` is reserved to mean "not
/// networked" (no shared session; the object stays local-only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DropId(pub u32);

impl DropId {
    /// The reserved "not networked" value.
    pub const LOCAL_ONLY: DropId = DropId(0);

    /// `true` for every id except the reserved [`DropId::LOCAL_ONLY`].
    pub fn is_networked(self) -> bool {
        self.0 != 0
    }
}

/// Which side of the session produced a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingSource {
    /// This actor dropped the item and received the id from its own submit.
    Local,
    /// The id arrived in a remote drop notification.
    Remote,
}

// ---------------------------------------------------------------------------
// IdentityRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RegistryInner {
    by_drop: HashMap<DropId, (LocalId, MappingSource)>,
    by_local: HashMap<LocalId, DropId>,
}

/// Bidirectional `DropId ↔ LocalId` map. Every public method performs its
/// mutation atomically; at most one drop id per local handle and vice versa
/// at any time.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    inner: Mutex<RegistryInner>,
}

impl IdentityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts both directions of a mapping. Last write wins: any prior
    /// mapping involving either side is evicted first, so the two maps can
    /// never disagree. A reserved id is refused with a warning.
    pub fn register(&self, id: DropId, local: LocalId, source: MappingSource) {
        if !id.is_networked() {
            warn!(local = local.0, "refusing to register reserved drop id 0");
            return;
        }
        let mut inner = self.lock();
        if let Some((stale_local, _)) = inner.by_drop.remove(&id) {
            inner.by_local.remove(&stale_local);
        }
        if let Some(stale_id) = inner.by_local.remove(&local) {
            inner.by_drop.remove(&stale_id);
        }
        inner.by_drop.insert(id, (local, source));
        inner.by_local.insert(local, id);
        debug!(drop_id = id.0, local = local.0, ?source, "registered drop");
    }

    /// The local handle behind a drop id, if known.
    pub fn lookup_local(&self, id: DropId) -> Option<LocalId> {
        self.lock().by_drop.get(&id).map(|(local, _)| *local)
    }

    /// The drop id assigned to a local handle, if any.
    pub fn lookup_drop_id(&self, local: LocalId) -> Option<DropId> {
        self.lock().by_local.get(&local).copied()
    }

    /// Removes both directions of the `id ↔ local` mapping. A miss, or a
    /// pair that does not match the live mapping, is a no-op (idempotent).
    pub fn unregister(&self, id: DropId, local: LocalId) {
        let mut inner = self.lock();
        match inner.by_drop.get(&id) {
            Some((mapped, _)) if *mapped == local => {
                inner.by_drop.remove(&id);
                inner.by_local.remove(&local);
                debug!(drop_id = id.0, local = local.0, "unregistered drop");
            }
            _ => {}
        }
    }

    /// Number of live mappings that originated from local submits.
    pub fn local_count(&self) -> usize {
        self.count(MappingSource::Local)
    }

    /// Number of live mappings that originated from remote notifications.
    pub fn remote_count(&self) -> usize {
        self.count(MappingSource::Remote)
    }

    /// Total live mappings.
    pub fn len(&self) -> usize {
        self.lock().by_drop.len()
    }

    /// `true` if no mappings are live.
    pub fn is_empty(&self) -> bool {
        self.lock().by_drop.is_empty()
    }

    fn count(&self, source: MappingSource) -> usize {
        self.lock()
            .by_drop
            .values()
            .filter(|(_, s)| *s == source)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
