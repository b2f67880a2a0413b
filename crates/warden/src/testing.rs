//! In-memory deployment for unit and integration testing.
//!
//! Provides an in-memory transport with per-node availability toggles, an
//! in-memory record store, and a one-call bundle wiring them to a bus and
//! replication channel with test-friendly flush timing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::commit::{Committer, CommitterMode};
use crate::config::WardenConfig;
use crate::error::WardenError;
use crate::event::EventBus;
use crate::metrics::WardenMetrics;
use crate::replication::{ReplicationChannel, ReplicationMessage};
use crate::storage::MemoryRecordStore;
use crate::transport::Transport;
use crate::types::NodeId;

/// In-memory transport. Every node starts unreachable; tests flip
/// availability with [`set_available`](MemoryTransport::set_available) and
/// inspect deliveries with [`sent_to`](MemoryTransport::sent_to).
#[derive(Default)]
pub struct MemoryTransport {
    available: DashMap<NodeId, bool>,
    sent: DashMap<NodeId, Vec<ReplicationMessage>>,
    fail_counts: DashMap<NodeId, u32>,
    send_delays: DashMap<NodeId, Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, node: &NodeId, available: bool) {
        self.available.insert(node.clone(), available);
    }

    /// Everything delivered to this node so far, in arrival order.
    pub fn sent_to(&self, node: &NodeId) -> Vec<ReplicationMessage> {
        self.sent.get(node).map(|e| e.clone()).unwrap_or_default()
    }

    /// Make the next `count` sends to this node fail while the endpoint
    /// stays nominally available (partial outage).
    pub fn fail_sends(&self, node: &NodeId, count: u32) {
        self.fail_counts.insert(node.clone(), count);
    }

    /// Make every send to this node take `delay` (a slow link), to widen
    /// race windows around in-flight sends.
    pub fn set_send_delay(&self, node: &NodeId, delay: Duration) {
        self.send_delays.insert(node.clone(), delay);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn has_endpoint(&self, node: &NodeId) -> bool {
        self.available.get(node).is_some_and(|e| *e)
    }

    async fn send(&self, node: &NodeId, message: &ReplicationMessage) -> Result<(), WardenError> {
        let delay = self.send_delays.get(node).map(|e| *e);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(mut remaining) = self.fail_counts.get_mut(node) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(WardenError::TransportFailed {
                    node: node.clone(),
                    reason: "injected failure".into(),
                    source: None,
                });
            }
        }
        self.sent.entry(node.clone()).or_default().push(message.clone());
        Ok(())
    }
}

/// A fully wired single-node deployment over in-memory collaborators.
///
/// # Example
///
/// ```ignore
/// let deploy = TestDeployment::new();
/// let node = deploy.add_peer("lobby");
/// let committer = deploy.committer(CommitterMode::default());
/// let result = committer.commit(record, None).await.unwrap();
/// ```
pub struct TestDeployment {
    pub config: WardenConfig,
    pub bus: Arc<EventBus>,
    pub store: Arc<MemoryRecordStore>,
    pub transport: Arc<MemoryTransport>,
    pub channel: Arc<ReplicationChannel>,
    pub metrics: Arc<WardenMetrics>,
}

impl TestDeployment {
    /// Deployment with fast flush timing (10ms initial delay, 40ms
    /// interval) so delivery tests finish quickly.
    pub fn new() -> Self {
        Self::with_config(WardenConfig {
            flush_initial_delay: Duration::from_millis(10),
            flush_interval: Duration::from_millis(40),
            ..Default::default()
        })
    }

    pub fn with_config(config: WardenConfig) -> Self {
        let metrics = Arc::new(WardenMetrics::unregistered());
        let transport = Arc::new(MemoryTransport::new());
        let channel = ReplicationChannel::new(
            config.clone(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&metrics),
        )
        .expect("TestDeployment config should be valid");

        Self {
            config,
            bus: Arc::new(EventBus::new()),
            store: Arc::new(MemoryRecordStore::new()),
            transport,
            channel,
            metrics,
        }
    }

    /// Register a peer node (initially unreachable) and return its id.
    pub fn add_peer(&self, name: &str) -> NodeId {
        let node = NodeId::new(name);
        self.channel.add_peer(node.clone());
        node
    }

    /// Build a committer over this deployment's collaborators.
    pub fn committer(&self, mode: CommitterMode) -> Committer {
        Committer::new(
            mode,
            Arc::clone(&self.bus),
            Arc::clone(&self.store) as Arc<dyn crate::store::RecordStore>,
            Arc::clone(&self.channel),
            Arc::clone(&self.metrics),
        )
    }

    pub fn shutdown(&self) {
        self.channel.shutdown();
    }
}

impl Default for TestDeployment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CommentRecord, RecordHeader};
    use crate::types::{PlayerId, RecordId};

    #[tokio::test]
    async fn deployment_wires_a_working_committer() {
        let deploy = TestDeployment::new();
        let committer = deploy.committer(CommitterMode::default());

        let record = CommentRecord::new(
            RecordHeader::new(RecordId::new("c-1"), PlayerId::new("p-1"), None),
            false,
        );
        let result = committer.commit(record.into(), None).await.unwrap();
        assert!(result.is_committed());
        assert_eq!(deploy.store.len(), 1);
    }

    #[tokio::test]
    async fn transport_starts_unreachable() {
        let transport = MemoryTransport::new();
        let node = NodeId::new("lobby");
        assert!(!transport.has_endpoint(&node));

        transport.set_available(&node, true);
        assert!(transport.has_endpoint(&node));
    }

    #[tokio::test]
    async fn fail_sends_is_consumed() {
        let transport = MemoryTransport::new();
        let node = NodeId::new("lobby");
        transport.set_available(&node, true);
        transport.fail_sends(&node, 1);

        let message = ReplicationMessage::new("warden:records", vec![1]);
        assert!(transport.send(&node, &message).await.is_err());
        assert!(transport.send(&node, &message).await.is_ok());
        assert_eq!(transport.sent_to(&node).len(), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_the_channel() {
        let deploy = TestDeployment::new();
        deploy.shutdown();
        assert!(deploy.channel.is_shutdown());
    }
}
