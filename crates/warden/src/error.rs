use crate::types::{NodeId, RecordId};

/// Errors that can occur in the moderation layer.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("failed to persist record {record_id}: {reason}")]
    PersistenceFailed {
        record_id: RecordId,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("transport send to {node} failed: {reason}")]
    TransportFailed {
        node: NodeId,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("no replication queue registered for node {node}")]
    UnknownNode { node: NodeId },

    #[error("malformed replication notice: {reason}")]
    MalformedNotice {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("replication channel is shutting down")]
    ShuttingDown,
}
