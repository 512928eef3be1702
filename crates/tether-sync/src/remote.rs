//! Remote event applier: the remote-actor side of the protocol. Materializes
//! other actors' drops locally and retires their pickups, while marking
//! in-progress materializations so the game-event layer can tell a network
//! echo from a genuine new local action.
//!
//! The remote-origin marker is scoped: it is set immediately before local
//! materialization side effects fire and cleared when the scope exits,
//! success or failure.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::entity::{EntityStore, LocalId, TypeTable};
use crate::policy::{self, DropPayload};
use crate::registry::{DropId, IdentityRegistry, MappingSource};
use crate::transport::{ActorId, Placement, RemoteEvent};

// ---------------------------------------------------------------------------
// Materializer
// ---------------------------------------------------------------------------

/// Failure of an external materialization side effect.
#[derive(Debug, Clone, thiserror::Error)]
#[error("materialization failed: {0}")]
pub struct MaterializeError(pub String);

/// The seam to the game-engine integration layer: spawning and removing the
/// world-side representation of a synchronized item. Both calls are
/// synchronous and complete before the applier proceeds.
pub trait Materializer {
    /// Spawn the world representation for a freshly decoded subtree.
    fn spawn_dropped(
        &mut self,
        store: &EntityStore,
        root: LocalId,
        placement: Placement,
    ) -> Result<(), MaterializeError>;

    /// Remove the world representation of a retired subtree. The entities
    /// are still live in `store` during this call.
    fn despawn_picked_up(&mut self, store: &EntityStore, root: LocalId);
}

// ---------------------------------------------------------------------------
// RemoteEventApplier
// ---------------------------------------------------------------------------

/// Applies inbound session notifications to the local world.
pub struct RemoteEventApplier {
    registry: Arc<IdentityRegistry>,
    types: Arc<TypeTable>,
    local_actor: ActorId,
    remote_origin: Mutex<HashSet<LocalId>>,
}

impl RemoteEventApplier {
    /// Creates an applier for one actor.
    pub fn new(registry: Arc<IdentityRegistry>, types: Arc<TypeTable>, local_actor: ActorId) -> Self {
        Self {
            registry,
            types,
            local_actor,
            remote_origin: Mutex::new(HashSet::new()),
        }
    }

    /// Dispatches one inbound notification.
    pub fn apply<M: Materializer>(
        &self,
        store: &mut EntityStore,
        materializer: &mut M,
        event: RemoteEvent,
    ) {
        match event {
            RemoteEvent::Dropped {
                drop_id,
                origin,
                payload,
                placement,
            } => self.on_remote_dropped(store, materializer, drop_id, origin, &payload, placement),
            RemoteEvent::PickedUp { drop_id, origin } => {
                self.on_remote_picked_up(store, materializer, drop_id, origin);
            }
        }
    }

    /// Handles a drop notification. An echo of this actor's own drop is a
    /// no-op; otherwise the payload is materialized, spawned, and registered
    /// as remotely sourced. Any failure drops the notification whole: no
    /// partial state is registered or left live.
    pub fn on_remote_dropped<M: Materializer>(
        &self,
        store: &mut EntityStore,
        materializer: &mut M,
        drop_id: DropId,
        origin: ActorId,
        payload: &DropPayload,
        placement: Placement,
    ) {
        if origin == self.local_actor {
            debug!(drop_id = drop_id.0, "ignoring echo of own drop");
            return;
        }

        let root = match policy::materialize(store, &self.types, payload) {
            Ok(root) => root,
            Err(error) => {
                warn!(drop_id = drop_id.0, %error, "rejecting remote drop payload");
                return;
            }
        };

        let spawned = {
            let _token = OriginToken::enter(&self.remote_origin, root);
            materializer.spawn_dropped(store, root, placement)
        };
        match spawned {
            Ok(()) => {
                self.registry.register(drop_id, root, MappingSource::Remote);
                debug!(drop_id = drop_id.0, local = root.0, "applied remote drop");
            }
            Err(error) => {
                warn!(drop_id = drop_id.0, %error, "materialization failed; discarding subtree");
                store.remove_subtree(root);
            }
        }
    }

    /// Handles a pickup notification. An echo of this actor's own pickup is
    /// a no-op. A pickup for an id not in the registry is a tolerated miss:
    /// the matching drop notification may still be in flight, or the object
    /// was already cleaned up. It is logged and not retried.
    pub fn on_remote_picked_up<M: Materializer>(
        &self,
        store: &mut EntityStore,
        materializer: &mut M,
        drop_id: DropId,
        origin: ActorId,
    ) {
        if origin == self.local_actor {
            debug!(drop_id = drop_id.0, "ignoring echo of own pickup");
            return;
        }

        let Some(root) = self.registry.lookup_local(drop_id) else {
            debug!(
                drop_id = drop_id.0,
                "pickup for unknown drop id; tolerating (drop notification may be in flight)"
            );
            return;
        };

        {
            let _token = OriginToken::enter(&self.remote_origin, root);
            materializer.despawn_picked_up(store, root);
        }
        store.remove_subtree(root);
        self.registry.unregister(drop_id, root);
        debug!(drop_id = drop_id.0, local = root.0, "applied remote pickup");
    }

    /// `true` while `entity` is being materialized or retired as a result of
    /// a remote notification. Presentation code uses this to skip effects
    /// meant only for locally initiated actions.
    pub fn is_remote_sourced(&self, entity: LocalId) -> bool {
        self.origin_lock().contains(&entity)
    }

    fn origin_lock(&self) -> std::sync::MutexGuard<'_, HashSet<LocalId>> {
        self.remote_origin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// OriginToken
// ---------------------------------------------------------------------------

/// Scoped membership in the remote-origin set: inserted on entry, removed on
/// drop, so the marker cannot leak past its side-effect scope even on
/// unwind.
struct OriginToken<'a> {
    set: &'a Mutex<HashSet<LocalId>>,
    entity: LocalId,
}

impl<'a> OriginToken<'a> {
    fn enter(set: &'a Mutex<HashSet<LocalId>>, entity: LocalId) -> Self {
        set.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity);
        Self { set, entity }
    }
}

impl Drop for OriginToken<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.entity);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
