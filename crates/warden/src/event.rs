//! Synchronous moderation event bus.
//!
//! An explicit bus object, owned by whoever wires the deployment together
//! and handed to the commit pipeline by `Arc` — there is no process-global
//! registration. Observers subscribe per [`RecordKind`] and run on the
//! committing thread; dispatch returns once every observer has run, so a
//! cancellation is always observed before any side effect happens.

use crate::record::{ModerationRecord, RecordKind};
use crate::types::ActorId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Priority of an observer. Lower priorities run first, so the highest
/// priority gets the final say.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum EventPriority {
    Lowest,
    Low,
    Normal,
    High,
    Highest,
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct SubscriptionHandle(u64);

/// A proposed moderation record in flight through the commit pipeline.
///
/// Observers may inspect the record, veto it (when `cancellable`), or swap
/// in a replacement (when `modifiable`). Capability flags come from the
/// pipeline's [`CommitterMode`](crate::commit::CommitterMode).
#[derive(Debug)]
pub struct ModerationEvent {
    executor: Option<ActorId>,
    original: ModerationRecord,
    current: ModerationRecord,
    cancellable: bool,
    modifiable: bool,
    cancelled: bool,
}

impl ModerationEvent {
    pub fn new(
        record: ModerationRecord,
        executor: Option<ActorId>,
        cancellable: bool,
        modifiable: bool,
    ) -> Self {
        Self {
            executor,
            current: record.clone(),
            original: record,
            cancellable,
            modifiable,
            cancelled: false,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.original.kind()
    }

    /// The record as issued, before any observer modification.
    pub fn original(&self) -> &ModerationRecord {
        &self.original
    }

    /// The record as it currently stands, including observer replacements.
    pub fn record(&self) -> &ModerationRecord {
        &self.current
    }

    pub fn executor(&self) -> Option<&ActorId> {
        self.executor.as_ref()
    }

    pub fn can_cancel(&self) -> bool {
        self.cancellable
    }

    pub fn can_modify(&self) -> bool {
        self.modifiable
    }

    /// Veto the record. Returns false (and does nothing) when the pipeline
    /// did not grant cancellation capability.
    pub fn cancel(&mut self) -> bool {
        if self.cancellable {
            self.cancelled = true;
        }
        self.cancellable
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Swap in a replacement record. Refused (returns false) when the
    /// pipeline did not grant modification capability, or when the
    /// replacement is of a different kind — a record's kind never changes.
    pub fn try_set_record(&mut self, record: ModerationRecord) -> bool {
        if !self.modifiable || record.kind() != self.original.kind() {
            return false;
        }
        self.current = record;
        true
    }

    pub fn is_modified(&self) -> bool {
        self.current != self.original
    }
}

type Observer = Arc<dyn Fn(&mut ModerationEvent) + Send + Sync>;

struct Subscription {
    handle: u64,
    priority: EventPriority,
    /// Keep running this observer even after the event has been cancelled.
    ignore_cancelled: bool,
    observer: Observer,
}

/// Registry of moderation observers, keyed by record kind.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<HashMap<RecordKind, Vec<Subscription>>>,
    next_handle: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of one record kind at [`EventPriority::Normal`].
    pub fn subscribe<F>(&self, kind: RecordKind, observer: F) -> SubscriptionHandle
    where
        F: Fn(&mut ModerationEvent) + Send + Sync + 'static,
    {
        self.subscribe_with(kind, EventPriority::Normal, false, observer)
    }

    /// Subscribe with an explicit priority and cancelled-event policy.
    ///
    /// Observers with `ignore_cancelled` set still run after another
    /// observer has cancelled the event (e.g., for audit logging).
    pub fn subscribe_with<F>(
        &self,
        kind: RecordKind,
        priority: EventPriority,
        ignore_cancelled: bool,
        observer: F,
    ) -> SubscriptionHandle
    where
        F: Fn(&mut ModerationEvent) + Send + Sync + 'static,
    {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subscriptions.write();
        let group = subs.entry(kind).or_default();
        group.push(Subscription {
            handle,
            priority,
            ignore_cancelled,
            observer: Arc::new(observer),
        });
        // Stable sort keeps registration order within a priority.
        group.sort_by_key(|s| s.priority);
        SubscriptionHandle(handle)
    }

    /// Remove an observer. Unknown handles are ignored.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut subs = self.subscriptions.write();
        for group in subs.values_mut() {
            group.retain(|s| s.handle != handle.0);
        }
    }

    /// Dispatch synchronously to every observer of the event's kind, in
    /// priority order. Observers run outside the registry lock, so they
    /// may subscribe or unsubscribe without deadlocking.
    pub fn dispatch(&self, event: &mut ModerationEvent) {
        let observers: Vec<(bool, Observer)> = {
            let subs = self.subscriptions.read();
            match subs.get(&event.kind()) {
                Some(group) => group
                    .iter()
                    .map(|s| (s.ignore_cancelled, Arc::clone(&s.observer)))
                    .collect(),
                None => return,
            }
        };

        for (ignore_cancelled, observer) in observers {
            if event.is_cancelled() && !ignore_cancelled {
                continue;
            }
            observer(event);
        }
    }

    #[cfg(test)]
    fn observer_count(&self, kind: RecordKind) -> usize {
        self.subscriptions
            .read()
            .get(&kind)
            .map_or(0, |group| group.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CommentRecord, MuteRecord, RecordHeader};
    use crate::types::{PlayerId, RecordId};
    use parking_lot::Mutex;

    fn mute_record(id: &str) -> ModerationRecord {
        MuteRecord::new(RecordHeader::new(
            RecordId::new(id),
            PlayerId::new("p-1"),
            None,
        ))
        .into()
    }

    fn event(record: ModerationRecord, cancellable: bool, modifiable: bool) -> ModerationEvent {
        ModerationEvent::new(record, Some(ActorId::new("staff-1")), cancellable, modifiable)
    }

    #[test]
    fn observers_run_in_priority_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (priority, tag) in [
            (EventPriority::Highest, "highest"),
            (EventPriority::Lowest, "lowest"),
            (EventPriority::Normal, "normal"),
        ] {
            let order = Arc::clone(&order);
            bus.subscribe_with(RecordKind::Mute, priority, false, move |_| {
                order.lock().push(tag);
            });
        }

        let mut ev = event(mute_record("m-1"), false, false);
        bus.dispatch(&mut ev);

        assert_eq!(*order.lock(), vec!["lowest", "normal", "highest"]);
    }

    #[test]
    fn dispatch_only_reaches_matching_kind() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0u32));
        let hits_clone = Arc::clone(&hits);
        bus.subscribe(RecordKind::Ban, move |_| {
            *hits_clone.lock() += 1;
        });

        let mut ev = event(mute_record("m-1"), false, false);
        bus.dispatch(&mut ev);
        assert_eq!(*hits.lock(), 0);
    }

    #[test]
    fn cancelled_event_skips_observers_unless_opted_in() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        bus.subscribe_with(RecordKind::Mute, EventPriority::Lowest, false, move |ev| {
            assert!(ev.cancel());
            s.lock().push("canceller");
        });
        let s = Arc::clone(&seen);
        bus.subscribe_with(RecordKind::Mute, EventPriority::Normal, false, move |_| {
            s.lock().push("skipped");
        });
        let s = Arc::clone(&seen);
        bus.subscribe_with(RecordKind::Mute, EventPriority::Highest, true, move |_| {
            s.lock().push("auditor");
        });

        let mut ev = event(mute_record("m-1"), true, false);
        bus.dispatch(&mut ev);

        assert!(ev.is_cancelled());
        assert_eq!(*seen.lock(), vec!["canceller", "auditor"]);
    }

    #[test]
    fn cancel_refused_without_capability() {
        let mut ev = event(mute_record("m-1"), false, false);
        assert!(!ev.cancel());
        assert!(!ev.is_cancelled());
    }

    #[test]
    fn set_record_refused_without_capability() {
        let mut ev = event(mute_record("m-1"), false, false);
        let replacement = mute_record("m-1");
        assert!(!ev.try_set_record(replacement));
        assert!(!ev.is_modified());
    }

    #[test]
    fn set_record_refuses_kind_change() {
        let mut ev = event(mute_record("m-1"), false, true);
        let comment: ModerationRecord = CommentRecord::new(
            RecordHeader::new(RecordId::new("m-1"), PlayerId::new("p-1"), None),
            false,
        )
        .into();
        assert!(!ev.try_set_record(comment));
        assert_eq!(ev.record().kind(), RecordKind::Mute);
    }

    #[test]
    fn set_record_applies_when_permitted() {
        let mut ev = event(mute_record("m-1"), false, true);
        let mut replacement = MuteRecord::new(RecordHeader::new(
            RecordId::new("m-1"),
            PlayerId::new("p-1"),
            None,
        ));
        replacement.header.reason = Some("amended".into());

        assert!(ev.try_set_record(replacement.into()));
        assert!(ev.is_modified());
        assert_eq!(ev.record().header().reason.as_deref(), Some("amended"));
        assert_eq!(ev.original().header().reason, None);
    }

    #[test]
    fn unsubscribe_removes_observer() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0u32));
        let hits_clone = Arc::clone(&hits);
        let handle = bus.subscribe(RecordKind::Mute, move |_| {
            *hits_clone.lock() += 1;
        });

        let mut ev = event(mute_record("m-1"), false, false);
        bus.dispatch(&mut ev);
        bus.unsubscribe(handle);
        bus.dispatch(&mut ev);

        assert_eq!(*hits.lock(), 1);
        assert_eq!(bus.observer_count(RecordKind::Mute), 0);
    }

    #[test]
    fn observer_may_subscribe_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let bus_clone = Arc::clone(&bus);
        bus.subscribe(RecordKind::Mute, move |_| {
            bus_clone.subscribe(RecordKind::Ban, |_| {});
        });

        let mut ev = event(mute_record("m-1"), false, false);
        bus.dispatch(&mut ev);
        assert_eq!(bus.observer_count(RecordKind::Ban), 1);
    }
}
