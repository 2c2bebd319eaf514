//! FIFO waiting line for one region.
//!
//! The underlying sequence is only reachable through the synchronized
//! operations below. Every mutation that changes the line (except `dequeue`,
//! whose caller notifies once the entry is resolved) fans out to the
//! [`ChangeNotifier`] after the lock is released.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use zonegate_core::{ParticipantId, ReplyCommand};

use crate::notify::ChangeNotifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    participant: ParticipantId,
    reply: ReplyCommand,
    enqueued_at: Instant,
}

impl QueueEntry {
    pub fn new(participant: ParticipantId, reply: ReplyCommand) -> Self {
        Self {
            participant,
            reply,
            enqueued_at: Instant::now(),
        }
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    pub fn reply(&self) -> &ReplyCommand {
        &self.reply
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }
}

/// Point-in-time copy of the waiting identities, head first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    participants: Vec<ParticipantId>,
}

impl QueueSnapshot {
    pub fn from_participants(participants: Vec<ParticipantId>) -> Self {
        Self { participants }
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.participants.iter()
    }

    pub fn position_of(&self, participant: ParticipantId) -> Option<usize> {
        self.participants.iter().position(|p| *p == participant)
    }

    pub fn as_slice(&self) -> &[ParticipantId] {
        &self.participants
    }
}

pub struct AdmissionQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    // Mirrors `entries.len()` so diagnostics never contend with a drain.
    len: AtomicUsize,
    notifier: ChangeNotifier,
}

impl AdmissionQueue {
    pub fn new(notifier: ChangeNotifier) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            len: AtomicUsize::new(0),
            notifier,
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Appends `entry` and returns the resulting line length.
    pub fn enqueue(&self, entry: QueueEntry) -> usize {
        let len = {
            let mut entries = self.entries.lock();
            entries.push_back(entry);
            self.publish_len(&entries)
        };
        self.notify_changed();
        len
    }

    pub fn dequeue(&self) -> Option<QueueEntry> {
        let mut entries = self.entries.lock();
        let entry = entries.pop_front();
        self.publish_len(&entries);
        entry
    }

    /// Drops every waiting entry for `participant`.
    ///
    /// Returns `false`, without notifying, when nothing matched.
    pub fn remove(&self, participant: ParticipantId) -> bool {
        let changed = {
            let mut entries = self.entries.lock();
            if entries.is_empty() {
                return false;
            }
            let before = entries.len();
            entries.retain(|entry| entry.participant != participant);
            self.publish_len(&entries) != before
        };
        if changed {
            self.notify_changed();
        }
        changed
    }

    /// Removes entries enqueued at or before `cutoff`, oldest first.
    pub fn expire_older_than(&self, cutoff: Instant) -> Vec<QueueEntry> {
        let expired = {
            let mut entries = self.entries.lock();
            let (expired, kept): (Vec<_>, Vec<_>) = entries
                .drain(..)
                .partition(|entry| entry.enqueued_at <= cutoff);
            *entries = kept.into();
            self.publish_len(&entries);
            expired
        };
        if !expired.is_empty() {
            self.notify_changed();
        }
        expired
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let participants = self
            .entries
            .lock()
            .iter()
            .map(QueueEntry::participant)
            .collect();
        QueueSnapshot { participants }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the registered listeners against a fresh snapshot.
    pub fn notify_changed(&self) {
        let snapshot = self.snapshot();
        self.notifier.notify(&snapshot);
    }

    fn publish_len(&self, entries: &VecDeque<QueueEntry>) -> usize {
        let len = entries.len();
        self.len.store(len, Ordering::Release);
        len
    }
}
