//! Drop coordinator: the local-actor side of the protocol. Builds payloads,
//! submits them through the session transport, guards against duplicate
//! in-flight submissions, and records allocated identities.
//!
//! Every failure is absorbed here: a transport error or an inactive session
//! degrades to "the item stays local," never to a caller-visible error, and
//! never destroys caller state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::entity::{EntityStore, LocalId};
use crate::policy::{self, DropPayload};
use crate::pool::CodecObjectPool;
use crate::registry::{DropId, IdentityRegistry, MappingSource};
use crate::transport::{ActorId, DropRequest, PickupRequest, Placement, SessionTransport};

/// Live-mapping and in-flight counts, for diagnostics overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    /// Registry mappings that originated from this actor's submits.
    pub local_mappings: usize,
    /// Registry mappings that arrived in remote notifications.
    pub remote_mappings: usize,
    /// Local objects awaiting an identity for an in-flight drop request.
    pub pending_ops: usize,
}

/// Orchestrates local drop and pickup submissions over a [`SessionTransport`].
pub struct DropCoordinator<T: SessionTransport> {
    transport: T,
    registry: Arc<IdentityRegistry>,
    pool: Arc<CodecObjectPool>,
    local_actor: ActorId,
    pending: Mutex<HashSet<LocalId>>,
}

impl<T: SessionTransport> DropCoordinator<T> {
    /// Creates a coordinator for one actor.
    pub fn new(
        transport: T,
        registry: Arc<IdentityRegistry>,
        pool: Arc<CodecObjectPool>,
        local_actor: ActorId,
    ) -> Self {
        Self {
            transport,
            registry,
            pool,
            local_actor,
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Submits a local drop and resolves with its allocated identity.
    ///
    /// Returns `None` without contacting the transport if `entity` already
    /// has a submission in flight (caller error, logged). Also `None` when
    /// no shared session is active (the server answers with the reserved id)
    /// or on transport failure; in every `None` case the entity remains
    /// valid and purely local. On `Some`, the caller must follow up with
    /// [`register_local_result`](Self::register_local_result).
    pub async fn submit_drop(
        &self,
        store: &EntityStore,
        entity: LocalId,
        placement: Placement,
    ) -> Option<DropId> {
        if !self.pending_lock().insert(entity) {
            warn!(
                local = entity.0,
                "drop already in flight for this entity; ignoring duplicate submit"
            );
            return None;
        }

        let result = self.submit_pending(store, entity, placement).await;
        self.pending_lock().remove(&entity);
        result
    }

    /// The guarded body of [`submit_drop`](Self::submit_drop); the caller
    /// owns the pending-set entry around it.
    async fn submit_pending(
        &self,
        store: &EntityStore,
        entity: LocalId,
        placement: Placement,
    ) -> Option<DropId> {
        let payload = policy::build_payload(store, entity, &self.pool)?;
        let type_id = store.get(entity)?.type_id;

        let request = DropRequest {
            actor: self.local_actor,
            type_id,
            payload,
            placement,
        };
        let result = self.transport.submit_drop(&request).await;

        // The request has been serialized; recycle its codec records.
        if let DropPayload::Tree(tree) = request.payload {
            self.pool.release_payload(tree);
        }

        match result {
            Ok(response) if response.drop_id.is_networked() => {
                debug!(
                    local = entity.0,
                    drop_id = response.drop_id.0,
                    "drop acknowledged"
                );
                Some(response.drop_id)
            }
            Ok(_) => {
                debug!(local = entity.0, "no shared session; item stays local");
                None
            }
            Err(error) => {
                warn!(local = entity.0, %error, "drop submit failed; item stays local");
                None
            }
        }
    }

    /// Records the identity returned by a successful submit, tagged as
    /// locally sourced.
    pub fn register_local_result(&self, id: DropId, entity: LocalId) {
        self.registry.register(id, entity, MappingSource::Local);
    }

    /// Submits a pickup claim for a networked drop. `false` on transport
    /// failure or server refusal; the registry is untouched either way (the
    /// caller unregisters once the local object is actually removed).
    pub async fn submit_pickup(&self, drop_id: DropId) -> bool {
        let request = PickupRequest {
            actor: self.local_actor,
            drop_id,
        };
        match self.transport.submit_pickup(&request).await {
            Ok(honored) => honored,
            Err(error) => {
                warn!(drop_id = drop_id.0, %error, "pickup submit failed");
                false
            }
        }
    }

    /// Entry point for the game-event collaborator: one call per
    /// user-initiated drop. Submits and, on success, registers the result.
    pub async fn notify_local_drop(
        &self,
        store: &EntityStore,
        entity: LocalId,
        placement: Placement,
    ) -> Option<DropId> {
        let drop_id = self.submit_drop(store, entity, placement).await?;
        self.register_local_result(drop_id, entity);
        Some(drop_id)
    }

    /// Entry point for the game-event collaborator: one call per pickup
    /// interaction on a networked object.
    pub async fn notify_local_pickup_attempt(&self, drop_id: DropId) -> bool {
        self.submit_pickup(drop_id).await
    }

    /// The network identity assigned to a local object, if any.
    pub fn network_id(&self, entity: LocalId) -> Option<DropId> {
        self.registry.lookup_drop_id(entity)
    }

    /// The actor this coordinator submits as.
    pub fn local_actor(&self) -> ActorId {
        self.local_actor
    }

    /// Number of objects with a submission in flight.
    pub fn pending_count(&self) -> usize {
        self.pending_lock().len()
    }

    /// Registry and pending counts in one snapshot.
    pub fn stats(&self) -> SyncStats {
        SyncStats {
            local_mappings: self.registry.local_count(),
            remote_mappings: self.registry.remote_count(),
            pending_ops: self.pending_count(),
        }
    }

    fn pending_lock(&self) -> std::sync::MutexGuard<'_, HashSet<LocalId>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
