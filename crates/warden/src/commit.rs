//! The moderation commit pipeline.
//!
//! A proposed record enters [`Committer::commit`], is vetted by the event
//! bus according to the configured [`CommitterMode`], and leaves as a
//! terminal [`CommitResult`] — committed or cancelled, never partial. On a
//! committed outcome the record is persisted and a replication notice is
//! queued for every peer node.

use crate::error::WardenError;
use crate::event::{EventBus, ModerationEvent};
use crate::metrics::WardenMetrics;
use crate::record::ModerationRecord;
use crate::replication::{ReplicationChannel, ReplicationNotice};
use crate::store::RecordStore;
use crate::types::ActorId;
use std::sync::Arc;

/// Flags controlling how strictly the pipeline vets a record.
///
/// Flags compose freely; `dummy` takes precedence over everything else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitterMode {
    /// Short-circuit: always commit, no dispatch, no side effects.
    pub dummy: bool,
    /// Bypass event dispatch and go straight to finalize.
    pub skip_events: bool,
    /// Observers may veto the record.
    pub allow_cancellations: bool,
    /// Observers may replace the record. Without this flag any observer
    /// mutation is discarded, not merely discouraged.
    pub allow_modifications: bool,
}

impl CommitterMode {
    /// Observers may both veto and modify.
    pub fn permissive() -> Self {
        Self {
            allow_cancellations: true,
            allow_modifications: true,
            ..Self::default()
        }
    }
}

/// Terminal status of a commit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// Persisted and queued for replication.
    Committed,
    /// Vetoed by an observer; nothing was persisted or replicated.
    Cancelled,
}

/// The (possibly modified) record plus its terminal status.
#[derive(Debug, Clone)]
pub struct CommitResult {
    pub record: ModerationRecord,
    pub status: CommitStatus,
}

impl CommitResult {
    pub fn is_committed(&self) -> bool {
        self.status == CommitStatus::Committed
    }
}

/// Vets proposed records and finalizes the ones that survive.
///
/// Owns nothing: the bus, store, and channel are shared collaborators
/// injected at construction. The pipeline never retains a record after
/// returning its [`CommitResult`].
pub struct Committer {
    mode: CommitterMode,
    bus: Arc<EventBus>,
    store: Arc<dyn RecordStore>,
    channel: Arc<ReplicationChannel>,
    metrics: Arc<WardenMetrics>,
}

impl Committer {
    pub fn new(
        mode: CommitterMode,
        bus: Arc<EventBus>,
        store: Arc<dyn RecordStore>,
        channel: Arc<ReplicationChannel>,
        metrics: Arc<WardenMetrics>,
    ) -> Self {
        Self {
            mode,
            bus,
            store,
            channel,
            metrics,
        }
    }

    pub fn mode(&self) -> CommitterMode {
        self.mode
    }

    /// Commit a proposed record issued by `executor` (`None` = console).
    ///
    /// Cancellation is a legitimate outcome, reported through the result
    /// status. An `Err` means persistence failed; the record is then
    /// neither stored nor replicated and the caller must not assume
    /// success. Replication itself never fails a commit — transient
    /// transport unavailability is absorbed by the flush loops.
    pub async fn commit(
        &self,
        record: ModerationRecord,
        executor: Option<ActorId>,
    ) -> Result<CommitResult, WardenError> {
        if self.mode.dummy {
            return Ok(CommitResult {
                record,
                status: CommitStatus::Committed,
            });
        }

        let record = if self.mode.skip_events {
            record
        } else {
            let snapshot = record.clone();
            let mut event = ModerationEvent::new(
                record,
                executor,
                self.mode.allow_cancellations,
                self.mode.allow_modifications,
            );
            self.bus.dispatch(&mut event);

            // The capability flag is a real restriction: without it, the
            // pre-dispatch record is retained no matter what the event
            // reports.
            let record = if self.mode.allow_modifications {
                event.record().clone()
            } else {
                snapshot
            };

            if event.is_cancelled() {
                self.metrics.records_cancelled.inc();
                tracing::debug!(record_id = %record.id(), kind = %record.kind(), "commit cancelled by observer");
                return Ok(CommitResult {
                    record,
                    status: CommitStatus::Cancelled,
                });
            }
            record
        };

        self.store.persist(&record).await?;

        match ReplicationNotice::RecordCommitted(record.clone()).encode() {
            Ok(message) => {
                if let Err(err) = self.channel.broadcast(&message) {
                    tracing::warn!(record_id = %record.id(), error = %err, "replication broadcast failed");
                }
            }
            Err(err) => {
                tracing::warn!(record_id = %record.id(), error = %err, "replication notice encoding failed");
            }
        }

        self.metrics.records_committed.inc();
        tracing::info!(record_id = %record.id(), kind = %record.kind(), "record committed");
        Ok(CommitResult {
            record,
            status: CommitStatus::Committed,
        })
    }
}
