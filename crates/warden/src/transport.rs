use async_trait::async_trait;

use crate::error::WardenError;
use crate::replication::ReplicationMessage;
use crate::types::NodeId;

/// Endpoint discovery and byte delivery toward a peer node.
///
/// Used by the flush loops and by targeted sends; the commit path never
/// blocks on it. Wire framing is the transport's business.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the destination currently has a connected endpoint.
    fn has_endpoint(&self, node: &NodeId) -> bool;

    /// Deliver one message to the destination. At-least-once: a partially
    /// successful send may be retried by the caller.
    async fn send(&self, node: &NodeId, message: &ReplicationMessage) -> Result<(), WardenError>;
}
