//! End-to-end tests: two actors exchanging a drop and a pickup through an
//! in-memory session transport.

use std::sync::{Arc, Mutex};

use crate::coordinator::DropCoordinator;
use crate::entity::{AttributeValue, Entity, EntityStore, ItemTypeId, TypeTable};
use crate::pool::CodecObjectPool;
use crate::registry::{DropId, IdentityRegistry};
use crate::remote::{MaterializeError, Materializer, RemoteEventApplier};
use crate::transport::{
    ActorId, DropRequest, DropResponse, PickupRequest, Placement, RemoteEvent, SessionTransport,
    TransportError,
};

/// Allocates ids sequentially and captures every request so the test can
/// republish it to the other actor, the way the session server would.
#[derive(Default)]
struct InMemorySession {
    drops: Mutex<Vec<(DropId, DropRequest)>>,
    next_id: Mutex<u32>,
}

impl InMemorySession {
    fn last_drop(&self) -> (DropId, DropRequest) {
        self.drops.lock().unwrap().last().cloned().unwrap()
    }
}

impl SessionTransport for InMemorySession {
    async fn submit_drop(&self, request: &DropRequest) -> Result<DropResponse, TransportError> {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let drop_id = DropId(*next);
        self.drops.lock().unwrap().push((drop_id, request.clone()));
        Ok(DropResponse { drop_id })
    }

    async fn submit_pickup(&self, _request: &PickupRequest) -> Result<bool, TransportError> {
        Ok(true)
    }
}

#[derive(Default)]
struct CountingMaterializer {
    spawns: usize,
    despawns: usize,
}

impl Materializer for CountingMaterializer {
    fn spawn_dropped(
        &mut self,
        _store: &EntityStore,
        _root: crate::entity::LocalId,
        _placement: Placement,
    ) -> Result<(), MaterializeError> {
        self.spawns += 1;
        Ok(())
    }

    fn despawn_picked_up(&mut self, _store: &EntityStore, _root: crate::entity::LocalId) {
        self.despawns += 1;
    }
}

fn shared_types() -> Arc<TypeTable> {
    let mut types = TypeTable::new();
    types.register(ItemTypeId(2), || {
        let mut e = Entity::new(ItemTypeId(2));
        e.set_attribute("count", AttributeValue::Int(1));
        e
    });
    types.register(ItemTypeId(7), || Entity::new(ItemTypeId(7)));
    Arc::new(types)
}

/// One actor's full engine: store, registry, coordinator, applier.
struct Actor {
    store: EntityStore,
    registry: Arc<IdentityRegistry>,
    coordinator: DropCoordinator<Arc<InMemorySession>>,
    applier: RemoteEventApplier,
    materializer: CountingMaterializer,
}

impl Actor {
    fn new(id: ActorId, session: Arc<InMemorySession>, types: Arc<TypeTable>) -> Self {
        let registry = Arc::new(IdentityRegistry::new());
        Self {
            store: EntityStore::new(),
            registry: Arc::clone(&registry),
            coordinator: DropCoordinator::new(
                session,
                Arc::clone(&registry),
                Arc::new(CodecObjectPool::new()),
                id,
            ),
            applier: RemoteEventApplier::new(registry, types, id),
            materializer: CountingMaterializer::default(),
        }
    }

    fn apply(&mut self, event: RemoteEvent) {
        self.applier
            .apply(&mut self.store, &mut self.materializer, event);
    }
}

#[tokio::test]
async fn test_drop_travels_from_one_actor_to_the_other() {
    let session = Arc::new(InMemorySession::default());
    let types = shared_types();
    let mut alice = Actor::new(ActorId(1), Arc::clone(&session), Arc::clone(&types));
    let mut bob = Actor::new(ActorId(2), Arc::clone(&session), types);

    // Alice drops a rifle holding ammo.
    let mut ammo = Entity::new(ItemTypeId(2));
    ammo.set_attribute("count", AttributeValue::Int(30));
    let ammo = alice.store.insert(ammo);
    let mut rifle = Entity::new(ItemTypeId(7));
    rifle.place_in_container(3, ammo);
    let rifle = alice.store.insert(rifle);

    let drop_id = alice
        .coordinator
        .notify_local_drop(&alice.store, rifle, Placement::default())
        .await
        .unwrap();

    // The session publishes the drop to everyone, Alice included.
    let (published_id, request) = session.last_drop();
    assert_eq!(published_id, drop_id);
    let event = RemoteEvent::Dropped {
        drop_id,
        origin: ActorId(1),
        payload: request.payload,
        placement: request.placement,
    };

    alice.apply(event.clone());
    bob.apply(event);

    // Alice's echo changed nothing; Bob materialized exactly one tree.
    assert_eq!(alice.materializer.spawns, 0);
    assert_eq!(alice.store.len(), 2);
    assert_eq!(bob.materializer.spawns, 1);
    assert_eq!(bob.store.len(), 2);

    let bob_root = bob.registry.lookup_local(drop_id).unwrap();
    let bob_rifle = bob.store.get(bob_root).unwrap();
    assert_eq!(bob_rifle.type_id, ItemTypeId(7));
    let bob_ammo = bob.store.get(bob_rifle.container_at(3).unwrap()).unwrap();
    assert_eq!(bob_ammo.attribute("count"), Some(&AttributeValue::Int(30)));
}

#[tokio::test]
async fn test_pickup_retires_the_drop_on_the_other_actor() {
    let session = Arc::new(InMemorySession::default());
    let types = shared_types();
    let mut alice = Actor::new(ActorId(1), Arc::clone(&session), Arc::clone(&types));
    let mut bob = Actor::new(ActorId(2), Arc::clone(&session), types);

    // Alice drops a default item; Bob materializes it.
    let item = alice.store.insert(Entity::new(ItemTypeId(2)));
    let drop_id = alice
        .coordinator
        .notify_local_drop(&alice.store, item, Placement::default())
        .await
        .unwrap();
    let (_, request) = session.last_drop();
    bob.apply(RemoteEvent::Dropped {
        drop_id,
        origin: ActorId(1),
        payload: request.payload,
        placement: request.placement,
    });
    assert_eq!(bob.store.len(), 1);

    // Bob picks it up; the session notifies both actors. Once Bob's visual
    // object is gone he unregisters his own mapping.
    let bob_root = bob.registry.lookup_local(drop_id).unwrap();
    assert!(bob.coordinator.notify_local_pickup_attempt(drop_id).await);
    bob.store.remove_subtree(bob_root);
    bob.registry.unregister(drop_id, bob_root);

    let pickup = RemoteEvent::PickedUp {
        drop_id,
        origin: ActorId(2),
    };
    bob.apply(pickup.clone());
    alice.apply(pickup);

    // Alice's copy is retired; Bob's echo was a no-op.
    assert_eq!(alice.materializer.despawns, 1);
    assert!(alice.store.is_empty());
    assert!(alice.registry.is_empty());
    assert_eq!(bob.materializer.despawns, 0);
}
