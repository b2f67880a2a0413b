//! Cross-node reliable replication channel.
//!
//! Each peer node owns a FIFO queue of pending [`ReplicationMessage`]s and
//! a self-arming, self-disarming flush loop. Enqueueing is a pure in-memory
//! append — commit operations never block on network I/O. The flush loop
//! wakes shortly after arming (so near-simultaneous enqueues share one
//! flush), then retries on a fixed interval until the queue drains, at
//! which point it deactivates until the next enqueue.
//!
//! Delivery is at-least-once: a message leaves the queue only for the
//! duration of its send attempt and is put back at the head on failure, so
//! a partially successful send may be retried. Ordering is FIFO per
//! destination; nothing is guaranteed across destinations.

use crate::config::WardenConfig;
use crate::error::WardenError;
use crate::metrics::WardenMetrics;
use crate::record::ModerationRecord;
use crate::transport::Transport;
use crate::types::NodeId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Channel tag carried by record replication messages.
pub const RECORD_CHANNEL: &str = "warden:records";

/// An opaque byte payload tagged with a channel identifier. Immutable
/// after creation; owned by exactly one destination queue until delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationMessage {
    channel: String,
    payload: Vec<u8>,
}

impl ReplicationMessage {
    pub fn new(channel: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Wire notice carried in a replication message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplicationNotice {
    /// A moderation record was committed on the sending node.
    RecordCommitted(ModerationRecord),
}

impl ReplicationNotice {
    /// Encode into a message on [`RECORD_CHANNEL`].
    pub fn encode(&self) -> Result<ReplicationMessage, WardenError> {
        let payload = rmp_serde::to_vec(self).map_err(|e| WardenError::MalformedNotice {
            reason: format!("encode failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(ReplicationMessage::new(RECORD_CHANNEL, payload))
    }

    /// Decode a message received from a peer node.
    pub fn decode(message: &ReplicationMessage) -> Result<Self, WardenError> {
        if message.channel() != RECORD_CHANNEL {
            return Err(WardenError::MalformedNotice {
                reason: format!("unexpected channel '{}'", message.channel()),
                source: None,
            });
        }
        rmp_serde::from_slice(message.payload()).map_err(|e| WardenError::MalformedNotice {
            reason: format!("decode failed: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

/// Outcome of a targeted send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the transport immediately.
    Sent,
    /// Queued for the flush loop; eventual delivery guaranteed.
    Queued,
    /// No endpoint available and the send was best-effort: dropped.
    Dropped,
}

/// Pending messages and flush-loop state for one peer node.
struct DestinationQueue {
    node: NodeId,
    pending: Mutex<VecDeque<ReplicationMessage>>,
    /// True while a flush loop is scheduled for this destination. All
    /// false→true transitions go through `compare_exchange` so at most one
    /// loop ever runs per destination.
    armed: AtomicBool,
    /// How many times a flush loop has been armed; test observability.
    loop_starts: AtomicU64,
}

impl DestinationQueue {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            pending: Mutex::new(VecDeque::new()),
            armed: AtomicBool::new(false),
            loop_starts: AtomicU64::new(0),
        }
    }

    /// Append a message, evicting the oldest when a capacity is configured
    /// and reached.
    fn push(&self, message: ReplicationMessage, capacity: Option<usize>, metrics: &WardenMetrics) {
        let mut pending = self.pending.lock();
        if let Some(cap) = capacity {
            while pending.len() >= cap {
                pending.pop_front();
                metrics.replication_pending.dec();
                tracing::warn!(node = %self.node, cap, "replication queue full, dropped oldest message");
            }
        }
        pending.push_back(message);
        metrics.replication_pending.inc();
    }

    fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Per-destination reliable delivery of serialized moderation notices.
pub struct ReplicationChannel {
    config: WardenConfig,
    transport: Arc<dyn Transport>,
    destinations: dashmap::DashMap<NodeId, Arc<DestinationQueue>>,
    metrics: Arc<WardenMetrics>,
    shutdown: CancellationToken,
}

impl ReplicationChannel {
    pub fn new(
        config: WardenConfig,
        transport: Arc<dyn Transport>,
        metrics: Arc<WardenMetrics>,
    ) -> Result<Arc<Self>, WardenError> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            transport,
            destinations: dashmap::DashMap::new(),
            metrics,
            shutdown: CancellationToken::new(),
        }))
    }

    /// Register a peer node. Idempotent; an existing queue is kept.
    pub fn add_peer(&self, node: NodeId) {
        self.destinations
            .entry(node.clone())
            .or_insert_with(|| Arc::new(DestinationQueue::new(node)));
    }

    /// Forget a peer node. Pending messages for it are discarded.
    pub fn remove_peer(&self, node: &NodeId) {
        if let Some((_, dest)) = self.destinations.remove(node) {
            let dropped = dest.len();
            if dropped > 0 {
                self.metrics.replication_pending.sub(dropped as i64);
                tracing::info!(node = %node, dropped, "removed peer with pending messages");
            }
        }
    }

    pub fn peers(&self) -> Vec<NodeId> {
        self.destinations.iter().map(|e| e.key().clone()).collect()
    }

    /// Queue a message for guaranteed eventual delivery (must-send).
    ///
    /// Pure in-memory append plus arming the destination's flush loop;
    /// never touches the network on the caller's path.
    pub fn enqueue(
        self: &Arc<Self>,
        node: &NodeId,
        message: ReplicationMessage,
    ) -> Result<(), WardenError> {
        if self.shutdown.is_cancelled() {
            return Err(WardenError::ShuttingDown);
        }
        let dest = self
            .destinations
            .get(node)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| WardenError::UnknownNode { node: node.clone() })?;

        dest.push(message, self.config.queue_capacity, &self.metrics);
        self.arm(&dest);
        Ok(())
    }

    /// Send to one destination, immediately when an endpoint is reachable.
    ///
    /// With `must_send`, an unreachable or failing destination falls back
    /// to the queue ([`SendOutcome::Queued`]); otherwise the message is
    /// dropped ([`SendOutcome::Dropped`]) or the transport error surfaces.
    pub async fn send_to(
        self: &Arc<Self>,
        node: &NodeId,
        message: ReplicationMessage,
        must_send: bool,
    ) -> Result<SendOutcome, WardenError> {
        if self.shutdown.is_cancelled() {
            return Err(WardenError::ShuttingDown);
        }
        if !self.destinations.contains_key(node) {
            return Err(WardenError::UnknownNode { node: node.clone() });
        }

        if self.transport.has_endpoint(node) {
            match self.transport.send(node, &message).await {
                Ok(()) => {
                    self.metrics.replication_sent.inc();
                    return Ok(SendOutcome::Sent);
                }
                Err(err) if must_send => {
                    tracing::warn!(node = %node, error = %err, "immediate send failed, queueing");
                }
                Err(err) => return Err(err),
            }
        } else if !must_send {
            return Ok(SendOutcome::Dropped);
        }

        self.enqueue(node, message)?;
        Ok(SendOutcome::Queued)
    }

    /// Queue a copy of the message for every registered peer.
    ///
    /// Each destination is handled independently: one unreachable peer
    /// never blocks or loses another peer's copy.
    pub fn broadcast(self: &Arc<Self>, message: &ReplicationMessage) -> Result<(), WardenError> {
        if self.shutdown.is_cancelled() {
            return Err(WardenError::ShuttingDown);
        }
        for entry in self.destinations.iter() {
            let dest = Arc::clone(entry.value());
            dest.push(message.clone(), self.config.queue_capacity, &self.metrics);
            self.arm(&dest);
        }
        Ok(())
    }

    /// Pending message count for one destination.
    pub fn pending(&self, node: &NodeId) -> usize {
        self.destinations.get(node).map_or(0, |e| e.value().len())
    }

    /// How many times a flush loop has been armed for this destination.
    pub fn flush_loop_starts(&self, node: &NodeId) -> u64 {
        self.destinations
            .get(node)
            .map_or(0, |e| e.value().loop_starts.load(Ordering::Relaxed))
    }

    /// Stop all flush loops. Pending messages are lost with the process —
    /// this layer makes no durability promise.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Arm the destination's flush loop if it is not already armed.
    /// The CAS makes re-arming while armed a no-op.
    fn arm(self: &Arc<Self>, dest: &Arc<DestinationQueue>) {
        if dest
            .armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        dest.loop_starts.fetch_add(1, Ordering::Relaxed);
        self.metrics.flush_loops_active.inc();

        let channel = Arc::clone(self);
        let dest = Arc::clone(dest);
        tokio::spawn(async move {
            channel.run_flush_loop(dest).await;
        });
    }

    async fn run_flush_loop(&self, dest: Arc<DestinationQueue>) {
        tracing::debug!(node = %dest.node, "flush loop armed");
        let first = tokio::time::Instant::now() + self.config.flush_initial_delay;
        let mut ticks = tokio::time::interval_at(first, self.config.flush_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticks.tick() => {}
            }

            if !self.transport.has_endpoint(&dest.node) {
                tracing::debug!(node = %dest.node, pending = dest.len(), "destination unreachable, staying armed");
                continue;
            }

            self.drain(&dest).await;

            if dest.len() > 0 {
                continue;
            }
            // Disarm, then re-check: an enqueue racing the final drain sees
            // armed=true until this store and would otherwise be stranded.
            dest.armed.store(false, Ordering::Release);
            if dest.len() > 0
                && dest
                    .armed
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                dest.loop_starts.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            break;
        }

        self.metrics.flush_loops_active.dec();
        tracing::debug!(node = %dest.node, "flush loop deactivated");
    }

    /// Deliver from the head until the queue empties or the endpoint goes
    /// away mid-drain. The head is popped before the send so a concurrent
    /// capacity eviction can only touch messages still queued, never the
    /// one in flight; on failure it goes back to the head for the next tick.
    async fn drain(&self, dest: &DestinationQueue) {
        while self.transport.has_endpoint(&dest.node) {
            let head = dest.pending.lock().pop_front();
            let Some(message) = head else { break };
            self.metrics.replication_pending.dec();

            match self.transport.send(&dest.node, &message).await {
                Ok(()) => {
                    self.metrics.replication_sent.inc();
                }
                Err(err) => {
                    tracing::warn!(node = %dest.node, error = %err, "send failed mid-drain, retrying next tick");
                    dest.pending.lock().push_front(message);
                    self.metrics.replication_pending.inc();
                    break;
                }
            }
        }
    }
}
