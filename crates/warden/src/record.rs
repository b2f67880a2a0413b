//! Typed moderation records: bans, mutes, kicks, and comments.
//!
//! A record's kind never changes after construction (it is fixed by the
//! [`ModerationRecord`] variant) and its identity is immutable once
//! assigned. Expiry on bans and mutes is a live property: moving it into
//! the past ends the punishment, moving it into the future reinstates it.

use crate::types::{ActorId, PlayerId, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four kinds of moderation action.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum RecordKind {
    Ban,
    Mute,
    Kick,
    Comment,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Ban => write!(f, "ban"),
            RecordKind::Mute => write!(f, "mute"),
            RecordKind::Kick => write!(f, "kick"),
            RecordKind::Comment => write!(f, "comment"),
        }
    }
}

/// Enforcement state of a ban or mute.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum PunishmentStatus {
    /// Still in force and should be enforced.
    Active,
    /// Ran out on its own (expiry passed) and should be ignored.
    Expired,
    /// Manually terminated by staff and should be ignored.
    Ended,
}

/// Fields shared by every record kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub id: RecordId,
    /// Player the decision targets.
    pub player: PlayerId,
    /// Issuing staff member. `None` = console / system issued.
    pub author: Option<ActorId>,
    pub reason: Option<String>,
    /// Server context the record applies in. `None` = the whole network.
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RecordHeader {
    pub fn new(id: RecordId, player: PlayerId, author: Option<ActorId>) -> Self {
        Self {
            id,
            player,
            author,
            reason: None,
            context: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// A ban decision, optionally temporary and optionally bound to an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
    pub header: RecordHeader,
    pub status: PunishmentStatus,
    /// IP address the player connected from when the ban was issued.
    pub ip_address: Option<String>,
    /// Automatic expiry. `None` = permanent until manually ended.
    pub expires_at: Option<DateTime<Utc>>,
    pub ended_by: Option<ActorId>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ended_reason: Option<String>,
}

/// A mute decision; identical temporal shape to [`BanRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuteRecord {
    pub header: RecordHeader,
    pub status: PunishmentStatus,
    /// IP address the player connected from when the mute was issued.
    pub ip_address: Option<String>,
    /// Automatic expiry. `None` = permanent until manually ended.
    pub expires_at: Option<DateTime<Utc>>,
    pub ended_by: Option<ActorId>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ended_reason: Option<String>,
}

/// A kick: instantaneous, no temporal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickRecord {
    pub header: RecordHeader,
    /// Kicked from the whole network rather than a single server.
    pub is_global: bool,
    /// Server the player was kicked from, when not global.
    pub server_name: Option<String>,
}

/// A staff note attached to a player, optionally flagged as a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub header: RecordHeader,
    pub is_warning: bool,
}

// Ban and mute share their temporal behavior. The methods are duplicated
// rather than abstracted so each record type reads standalone.
macro_rules! impl_temporal {
    ($ty:ident) => {
        impl $ty {
            pub fn new(header: RecordHeader) -> Self {
                Self {
                    header,
                    status: PunishmentStatus::Active,
                    ip_address: None,
                    expires_at: None,
                    ended_by: None,
                    ended_at: None,
                    ended_reason: None,
                }
            }

            pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
                self.ip_address = Some(ip.into());
                self
            }

            pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
                self.set_expiry(at);
                self
            }

            /// Move the automatic expiry. A past instant ends the punishment
            /// immediately; a future instant reinstates it as active even if
            /// it had previously ended. Either way the ending metadata is
            /// cleared: once an expiry is set, expiry governs the record,
            /// not any earlier manual termination.
            pub fn set_expiry(&mut self, at: DateTime<Utc>) {
                self.status = if at <= Utc::now() {
                    PunishmentStatus::Expired
                } else {
                    PunishmentStatus::Active
                };
                self.ended_by = None;
                self.ended_at = None;
                self.ended_reason = None;
                self.expires_at = Some(at);
            }

            /// Terminate now. Always overwrites the ending metadata, even if
            /// the record is already ended: idempotent in effect, not in
            /// audit trail.
            pub fn end_now(&mut self, staff: Option<ActorId>, reason: Option<String>) {
                self.status = PunishmentStatus::Ended;
                self.ended_by = staff;
                self.ended_at = Some(Utc::now());
                self.ended_reason = reason;
            }

            /// Return to active with no expiry, clearing ending metadata.
            pub fn reinstate(&mut self) {
                self.status = PunishmentStatus::Active;
                self.expires_at = None;
                self.ended_by = None;
                self.ended_at = None;
                self.ended_reason = None;
            }

            pub fn is_active(&self) -> bool {
                self.status == PunishmentStatus::Active
            }
        }
    };
}

impl_temporal!(BanRecord);
impl_temporal!(MuteRecord);

impl KickRecord {
    /// A kick scoped to one server.
    pub fn new(header: RecordHeader, server_name: impl Into<String>) -> Self {
        Self {
            header,
            is_global: false,
            server_name: Some(server_name.into()),
        }
    }

    /// A kick from every server on the network.
    pub fn global(header: RecordHeader) -> Self {
        Self {
            header,
            is_global: true,
            server_name: None,
        }
    }
}

impl CommentRecord {
    pub fn new(header: RecordHeader, is_warning: bool) -> Self {
        Self { header, is_warning }
    }
}

/// A moderation decision of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModerationRecord {
    Ban(BanRecord),
    Mute(MuteRecord),
    Kick(KickRecord),
    Comment(CommentRecord),
}

impl ModerationRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            ModerationRecord::Ban(_) => RecordKind::Ban,
            ModerationRecord::Mute(_) => RecordKind::Mute,
            ModerationRecord::Kick(_) => RecordKind::Kick,
            ModerationRecord::Comment(_) => RecordKind::Comment,
        }
    }

    pub fn header(&self) -> &RecordHeader {
        match self {
            ModerationRecord::Ban(r) => &r.header,
            ModerationRecord::Mute(r) => &r.header,
            ModerationRecord::Kick(r) => &r.header,
            ModerationRecord::Comment(r) => &r.header,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.header().id
    }

    pub fn player(&self) -> &PlayerId {
        &self.header().player
    }

    pub fn author(&self) -> Option<&ActorId> {
        self.header().author.as_ref()
    }
}

impl From<BanRecord> for ModerationRecord {
    fn from(r: BanRecord) -> Self {
        ModerationRecord::Ban(r)
    }
}

impl From<MuteRecord> for ModerationRecord {
    fn from(r: MuteRecord) -> Self {
        ModerationRecord::Mute(r)
    }
}

impl From<KickRecord> for ModerationRecord {
    fn from(r: KickRecord) -> Self {
        ModerationRecord::Kick(r)
    }
}

impl From<CommentRecord> for ModerationRecord {
    fn from(r: CommentRecord) -> Self {
        ModerationRecord::Comment(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn header(id: &str) -> RecordHeader {
        RecordHeader::new(
            RecordId::new(id),
            PlayerId::new("p-1"),
            Some(ActorId::new("staff-1")),
        )
        .with_reason("griefing")
    }

    #[test]
    fn mute_expiry_in_past_ends_it() {
        let mut mute = MuteRecord::new(header("m-1"));
        assert!(mute.is_active());

        mute.set_expiry(Utc::now() - Duration::minutes(5));
        assert_eq!(mute.status, PunishmentStatus::Expired);
        assert!(!mute.is_active());
    }

    #[test]
    fn mute_expiry_in_future_reinstates_ended_mute() {
        let mut mute = MuteRecord::new(header("m-2"));
        mute.end_now(Some(ActorId::new("staff-2")), Some("appealed".into()));
        assert_eq!(mute.status, PunishmentStatus::Ended);
        assert!(mute.ended_by.is_some());

        // Expiry is live: a future instant brings the mute back.
        mute.set_expiry(Utc::now() + Duration::hours(1));
        assert_eq!(mute.status, PunishmentStatus::Active);
        assert!(mute.ended_by.is_none());
        assert!(mute.ended_reason.is_none());
    }

    #[test]
    fn past_expiry_on_ended_mute_clears_ending_metadata() {
        let mut mute = MuteRecord::new(header("m-4"));
        mute.end_now(Some(ActorId::new("staff-2")), Some("appealed".into()));

        // The record is now governed by expiry, not by the manual ending.
        mute.set_expiry(Utc::now() - Duration::minutes(5));
        assert_eq!(mute.status, PunishmentStatus::Expired);
        assert!(mute.ended_by.is_none());
        assert!(mute.ended_at.is_none());
        assert!(mute.ended_reason.is_none());
    }

    #[test]
    fn mute_past_then_future_expiry() {
        let mut mute = MuteRecord::new(header("m-3"));

        mute.set_expiry(Utc::now() - Duration::seconds(1));
        assert!(!mute.is_active());

        mute.set_expiry(Utc::now() + Duration::seconds(60));
        assert!(mute.is_active());
    }

    #[test]
    fn end_now_overwrites_audit_trail_when_already_ended() {
        let mut ban = BanRecord::new(header("b-1"));
        ban.end_now(Some(ActorId::new("staff-2")), Some("first".into()));
        let first_ended_at = ban.ended_at;

        ban.end_now(Some(ActorId::new("staff-3")), Some("second".into()));
        assert_eq!(ban.status, PunishmentStatus::Ended);
        assert_eq!(ban.ended_by, Some(ActorId::new("staff-3")));
        assert_eq!(ban.ended_reason.as_deref(), Some("second"));
        assert!(ban.ended_at >= first_ended_at);
    }

    #[test]
    fn reinstate_clears_expiry_and_ending_metadata() {
        let mut ban = BanRecord::new(header("b-2"))
            .with_expiry(Utc::now() + Duration::hours(2));
        ban.end_now(None, Some("oops".into()));

        ban.reinstate();
        assert!(ban.is_active());
        assert!(ban.expires_at.is_none());
        assert!(ban.ended_by.is_none());
        assert!(ban.ended_at.is_none());
        assert!(ban.ended_reason.is_none());
    }

    #[test]
    fn kind_and_header_accessors() {
        let record: ModerationRecord = KickRecord::global(header("k-1")).into();
        assert_eq!(record.kind(), RecordKind::Kick);
        assert_eq!(record.id(), &RecordId::new("k-1"));
        assert_eq!(record.player(), &PlayerId::new("p-1"));
        assert_eq!(record.author(), Some(&ActorId::new("staff-1")));
    }

    #[test]
    fn comment_record_serde_roundtrip() {
        let record: ModerationRecord =
            CommentRecord::new(header("c-1").with_context("lobby"), true).into();
        let bytes = rmp_serde::to_vec(&record).unwrap();
        let decoded: ModerationRecord = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn ban_record_serde_roundtrip() {
        let record: ModerationRecord = BanRecord::new(header("b-3"))
            .with_ip_address("198.51.100.7")
            .with_expiry(Utc::now() + Duration::days(7))
            .into();
        let bytes = rmp_serde::to_vec(&record).unwrap();
        let decoded: ModerationRecord = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(record, decoded);
    }
}
