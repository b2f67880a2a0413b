//! Cluster-wide moderation layer.
//!
//! Moderation decisions — bans, mutes, kicks, comments — taken on one node
//! of a server cluster are vetted through a cancellable, mutation-aware
//! commit pipeline and then replicated to every peer node, even peers with
//! no connected endpoint at the moment of the decision.
//!
//! The two load-bearing pieces:
//!
//! - [`commit::Committer`] — validates a proposed [`record::ModerationRecord`]
//!   against a [`commit::CommitterMode`], dispatches a cancellable event on
//!   an explicit [`event::EventBus`], and on survival persists the record
//!   and queues replication notices.
//! - [`replication::ReplicationChannel`] — per-destination FIFO queues
//!   drained by self-arming, self-disarming flush loops; at-least-once
//!   delivery with FIFO ordering per destination.
//!
//! Persistence ([`store::RecordStore`]) and the wire ([`transport::Transport`])
//! are collaborator traits; in-memory implementations for tests and
//! standalone servers live in [`storage`] and [`testing`].

pub mod commit;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod record;
pub mod replication;
pub mod storage;
pub mod store;
pub mod testing;
pub mod transport;
pub mod types;

pub use commit::{CommitResult, CommitStatus, Committer, CommitterMode};
pub use config::WardenConfig;
pub use error::WardenError;
pub use event::{EventBus, EventPriority, ModerationEvent, SubscriptionHandle};
pub use record::{
    BanRecord, CommentRecord, KickRecord, ModerationRecord, MuteRecord, PunishmentStatus,
    RecordHeader, RecordKind,
};
pub use replication::{
    ReplicationChannel, ReplicationMessage, ReplicationNotice, SendOutcome, RECORD_CHANNEL,
};
pub use store::RecordStore;
pub use transport::Transport;
pub use types::{ActorId, NodeId, PlayerId, RecordId};
