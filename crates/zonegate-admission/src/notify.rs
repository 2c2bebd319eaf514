//! Change fan-out after queue mutations.
//!
//! Listeners run in registration order on whichever thread mutated the queue,
//! always after the queue lock has been released. They only ever see an
//! immutable [`QueueSnapshot`], never the queue itself.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;
use zonegate_core::Outbound;
use zonegate_runtime::panic_message;

use crate::collaborators::ReplyChannel;
use crate::queue::QueueSnapshot;

pub trait QueueListener: Send + Sync {
    fn on_queue_changed(&self, snapshot: &QueueSnapshot);
}

#[derive(Default)]
pub struct ChangeNotifier {
    listeners: RwLock<Vec<Arc<dyn QueueListener>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn QueueListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn notify(&self, snapshot: &QueueSnapshot) {
        // Copy out so a listener registering another listener cannot deadlock.
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            if let Err(payload) =
                catch_unwind(AssertUnwindSafe(|| listener.on_queue_changed(snapshot)))
            {
                error!("queue listener panicked: {}", panic_message(payload));
            }
        }
    }
}

/// Sends every waiting participant its current place in line.
pub struct PositionBroadcaster {
    replies: Arc<dyn ReplyChannel>,
}

impl PositionBroadcaster {
    pub fn new(replies: Arc<dyn ReplyChannel>) -> Self {
        Self { replies }
    }
}

impl QueueListener for PositionBroadcaster {
    fn on_queue_changed(&self, snapshot: &QueueSnapshot) {
        let length = snapshot.len();
        for (current, participant) in snapshot.iter().enumerate() {
            self.replies
                .send(*participant, Outbound::QueueStatus { length, current });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use zonegate_core::{Outbound, ParticipantId};

    use super::{ChangeNotifier, PositionBroadcaster, QueueListener};
    use crate::collaborators::ReplyChannel;
    use crate::queue::QueueSnapshot;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(ParticipantId, Outbound)>>,
    }

    impl ReplyChannel for Recorder {
        fn send(&self, participant: ParticipantId, payload: Outbound) {
            self.sent.lock().push((participant, payload));
        }
    }

    struct Tagged {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl QueueListener for Tagged {
        fn on_queue_changed(&self, _snapshot: &QueueSnapshot) {
            self.log.lock().push(self.tag);
        }
    }

    struct Exploding;

    impl QueueListener for Exploding {
        fn on_queue_changed(&self, _snapshot: &QueueSnapshot) {
            panic!("listener blew up");
        }
    }

    fn snapshot(ids: &[u64]) -> QueueSnapshot {
        QueueSnapshot::from_participants(ids.iter().copied().map(ParticipantId::new).collect())
    }

    #[test]
    fn broadcaster_sends_zero_based_positions_with_length() {
        let recorder = Arc::new(Recorder::default());
        let broadcaster = PositionBroadcaster::new(recorder.clone());
        broadcaster.on_queue_changed(&snapshot(&[10, 20, 30]));

        let sent = recorder.sent.lock().clone();
        assert_eq!(
            sent,
            vec![
                (
                    ParticipantId::new(10),
                    Outbound::QueueStatus {
                        length: 3,
                        current: 0
                    }
                ),
                (
                    ParticipantId::new(20),
                    Outbound::QueueStatus {
                        length: 3,
                        current: 1
                    }
                ),
                (
                    ParticipantId::new(30),
                    Outbound::QueueStatus {
                        length: 3,
                        current: 2
                    }
                ),
            ]
        );
    }

    #[test]
    fn broadcaster_is_silent_for_an_empty_line() {
        let recorder = Arc::new(Recorder::default());
        PositionBroadcaster::new(recorder.clone()).on_queue_changed(&snapshot(&[]));
        assert!(recorder.sent.lock().is_empty());
    }

    #[test]
    fn listeners_run_in_registration_order_and_survive_a_panicking_peer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let notifier = ChangeNotifier::new();
        notifier.register(Arc::new(Tagged {
            tag: "first",
            log: Arc::clone(&log),
        }));
        notifier.register(Arc::new(Exploding));
        notifier.register(Arc::new(Tagged {
            tag: "third",
            log: Arc::clone(&log),
        }));
        assert_eq!(notifier.listener_count(), 3);

        notifier.notify(&snapshot(&[1]));

        assert_eq!(*log.lock(), vec!["first", "third"]);
    }
}
