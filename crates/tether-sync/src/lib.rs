//! Item synchronization engine for the Tether co-op overlay: flattens
//! composite item graphs into relocatable payloads, keeps server-assigned
//! drop identities consistent with local objects, and guards against
//! feedback loops between local actions and their own network echoes.

pub mod attribute;
pub mod codec;
pub mod coordinator;
pub mod entity;
pub mod policy;
pub mod pool;
pub mod registry;
pub mod remote;
pub mod transport;

#[cfg(test)]
#[path = "sync_flow_tests.rs"]
mod sync_flow_tests;

pub use attribute::AttributeRecord;
pub use codec::{DecodeError, FlatEntry, TreePayload};
pub use coordinator::{DropCoordinator, SyncStats};
pub use entity::{Attribute, AttributeValue, Entity, EntityStore, ItemTypeId, LocalId, TypeTable};
pub use policy::DropPayload;
pub use pool::CodecObjectPool;
pub use registry::{DropId, IdentityRegistry, MappingSource};
pub use remote::{MaterializeError, Materializer, RemoteEventApplier};
pub use transport::{
    ActorId, DropRequest, DropResponse, PickupRequest, Placement, RemoteEvent, SessionTransport,
    TransportError,
};
