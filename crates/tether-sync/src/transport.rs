//! The external transport boundary: request/response messages for the drop
//! service, inbound notification events, and the abstract async channel the
//! coordinator submits through.
//!
//! Wire encoding of these messages is the transport's concern; this engine
//! only requires that every field round-trips losslessly (all types here are
//! plain serde data).

use serde::{Deserialize, Serialize};

use crate::entity::ItemTypeId;
use crate::policy::DropPayload;
use crate::registry::DropId;

// ---------------------------------------------------------------------------
// Identifiers & placement
// ---------------------------------------------------------------------------

/// Identifies one session member (actor). Assigned by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

/// Where a dropped item lands in the world, in millimeters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// World X in millimeters.
    pub x_mm: i64,
    /// World Y in millimeters.
    pub y_mm: i64,
    /// World Z in millimeters.
    pub z_mm: i64,
}

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

/// Announces a local drop and asks the server to allocate an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropRequest {
    /// The submitting actor.
    pub actor: ActorId,
    /// Item kind of the dropped root.
    pub type_id: ItemTypeId,
    /// Default flag or full subtree.
    pub payload: DropPayload,
    /// Where the item landed.
    pub placement: Placement,
}

/// Server response to a [`DropRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropResponse {
    /// The allocated identity; [`DropId::LOCAL_ONLY`] means no shared
    /// session is active and the item stays local.
    pub drop_id: DropId,
}

/// Asks the server to retire a networked drop this actor picked up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PickupRequest {
    /// The picking-up actor.
    pub actor: ActorId,
    /// Which drop is being claimed.
    pub drop_id: DropId,
}

// ---------------------------------------------------------------------------
// Inbound notifications
// ---------------------------------------------------------------------------

/// A notification published by the session about another actor's action
/// (the transport also echoes this actor's own actions back, tagged with its
/// origin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemoteEvent {
    /// An actor dropped an item.
    Dropped {
        /// Identity allocated for the drop.
        drop_id: DropId,
        /// Who dropped it.
        origin: ActorId,
        /// Default flag or full subtree.
        payload: DropPayload,
        /// Where it landed.
        placement: Placement,
    },
    /// An actor picked a drop up.
    PickedUp {
        /// Which drop was claimed.
        drop_id: DropId,
        /// Who picked it up.
        origin: ActorId,
    },
}

// ---------------------------------------------------------------------------
// Transport channel
// ---------------------------------------------------------------------------

/// Failures of the external channel. Always recoverable: the engine degrades
/// to "stayed local" or "notification dropped" and never surfaces these to
/// its own callers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The session channel is closed or was never established.
    #[error("session channel closed")]
    ChannelClosed,
    /// The request did not resolve within the transport's deadline.
    #[error("request timed out")]
    Timeout,
    /// The server refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// Underlying I/O failure.
    #[error("transport I/O failure: {0}")]
    Io(String),
}

/// The abstract asynchronous request/response primitive the coordinator
/// submits through. Implementations serialize the borrowed request however
/// they like; timeouts and cancellation are theirs too.
pub trait SessionTransport: Send + Sync {
    /// Submits a drop announcement and resolves with the allocated identity.
    fn submit_drop(
        &self,
        request: &DropRequest,
    ) -> impl Future<Output = Result<DropResponse, TransportError>> + Send;

    /// Submits a pickup claim and resolves with whether the server honored
    /// it.
    fn submit_pickup(
        &self,
        request: &PickupRequest,
    ) -> impl Future<Output = Result<bool, TransportError>> + Send;
}

impl<T: SessionTransport> SessionTransport for std::sync::Arc<T> {
    async fn submit_drop(&self, request: &DropRequest) -> Result<DropResponse, TransportError> {
        (**self).submit_drop(request).await
    }

    async fn submit_pickup(&self, request: &PickupRequest) -> Result<bool, TransportError> {
        (**self).submit_pickup(request).await
    }
}
