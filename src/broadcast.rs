//! Fan-out of tally changes to live observers.
//!
//! Observers join per-election rooms. Publishing never waits on an observer:
//! an observer that cannot keep up misses updates rather than holding back
//! the vote path, and one that has gone away is dropped from every room.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rocket::tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

use crate::model::{common::tally::TallyDelta, mongodb::Id};

/// A unique identifier for a connected observer.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Atomically get the next ID.
    fn next() -> ObserverId {
        static OBSERVER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
        ObserverId(OBSERVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for ObserverId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Registry {
    observers: HashMap<ObserverId, Sender<TallyDelta>>,
    rooms: HashMap<Id, HashSet<ObserverId>>,
}

impl Registry {
    fn remove_observer(&mut self, observer: ObserverId) {
        self.observers.remove(&observer);
        self.rooms.retain(|_, members| {
            members.remove(&observer);
            !members.is_empty()
        });
    }
}

/// Shared handle on the observer registry.
#[derive(Debug, Clone, Default)]
pub struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // The registry is left consistent at every step, so a panic while
        // holding the lock does not invalidate it.
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new observer, whose updates will be queued on the returned
    /// receiver, up to `capacity` at a time.
    pub fn connect(&self, capacity: usize) -> (ObserverId, Receiver<TallyDelta>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = ObserverId::next();
        self.registry().observers.insert(id, sender);
        debug!("Observer {id} connected");
        (id, receiver)
    }

    /// Add an observer to an election's room. Joining twice is harmless.
    /// Returns false if the observer is not connected.
    pub fn join(&self, observer: ObserverId, election_id: Id) -> bool {
        let mut registry = self.registry();
        if !registry.observers.contains_key(&observer) {
            return false;
        }
        registry.rooms.entry(election_id).or_default().insert(observer);
        debug!("Observer {observer} joined election {election_id}");
        true
    }

    /// Remove an observer from an election's room. Leaving a room the
    /// observer is not in is harmless.
    pub fn leave(&self, observer: ObserverId, election_id: Id) {
        let mut registry = self.registry();
        if let Some(members) = registry.rooms.get_mut(&election_id) {
            members.remove(&observer);
            if members.is_empty() {
                registry.rooms.remove(&election_id);
            }
        }
        debug!("Observer {observer} left election {election_id}");
    }

    /// Forget an observer entirely.
    pub fn disconnect(&self, observer: ObserverId) {
        self.registry().remove_observer(observer);
        debug!("Observer {observer} disconnected");
    }

    /// Queue a delta for every observer in the election's room, returning how
    /// many observers it was queued for.
    pub fn publish(&self, delta: TallyDelta) -> usize {
        let mut registry = self.registry();
        let Some(members) = registry.rooms.get(&delta.election_id) else {
            return 0;
        };

        let mut delivered = 0;
        let mut gone = Vec::new();
        for observer in members {
            let Some(sender) = registry.observers.get(observer) else {
                gone.push(*observer);
                continue;
            };
            match sender.try_send(delta) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Observer {observer} is lagging, dropping update");
                }
                Err(TrySendError::Closed(_)) => gone.push(*observer),
            }
        }
        for observer in gone {
            registry.remove_observer(observer);
        }
        delivered
    }

    /// Number of observers in an election's room.
    pub fn room_size(&self, election_id: Id) -> usize {
        self.registry()
            .rooms
            .get(&election_id)
            .map_or(0, HashSet::len)
    }

    /// Number of connected observers.
    pub fn observer_count(&self) -> usize {
        self.registry().observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(election_id: Id, votes: u64) -> TallyDelta {
        TallyDelta {
            election_id,
            candidate_id: Id::new(),
            new_candidate_votes: votes,
            new_total_votes: votes,
        }
    }

    #[test]
    fn only_room_members_receive() {
        let broadcaster = Broadcaster::new();
        let (x, e1) = (Id::new(), Id::new());
        let (a, mut a_rx) = broadcaster.connect(8);
        let (b, mut b_rx) = broadcaster.connect(8);
        assert!(broadcaster.join(a, x));
        assert!(broadcaster.join(b, e1));

        assert_eq!(broadcaster.publish(delta(x, 1)), 1);
        assert_eq!(a_rx.try_recv().unwrap().election_id, x);
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn delivery_order_matches_publish_order() {
        let broadcaster = Broadcaster::new();
        let election = Id::new();
        let (a, mut rx) = broadcaster.connect(8);
        broadcaster.join(a, election);

        for votes in 1..=5 {
            broadcaster.publish(delta(election, votes));
        }
        let received: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|d| d.new_total_votes)
            .collect();
        assert_eq!(received, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn joining_twice_delivers_once() {
        let broadcaster = Broadcaster::new();
        let election = Id::new();
        let (a, mut rx) = broadcaster.connect(8);
        broadcaster.join(a, election);
        broadcaster.join(a, election);

        assert_eq!(broadcaster.publish(delta(election, 1)), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn leave_and_disconnect() {
        let broadcaster = Broadcaster::new();
        let (e1, e2) = (Id::new(), Id::new());
        let (a, mut rx) = broadcaster.connect(8);
        broadcaster.join(a, e1);
        broadcaster.join(a, e2);

        broadcaster.leave(a, e1);
        assert_eq!(broadcaster.room_size(e1), 0);
        assert_eq!(broadcaster.publish(delta(e1, 1)), 0);
        assert!(rx.try_recv().is_err());

        broadcaster.disconnect(a);
        assert_eq!(broadcaster.room_size(e2), 0);
        assert_eq!(broadcaster.observer_count(), 0);
        assert!(!broadcaster.join(a, e2));
    }

    #[test]
    fn lagging_observer_does_not_block_others() {
        let broadcaster = Broadcaster::new();
        let election = Id::new();
        let (slow, _slow_rx) = broadcaster.connect(1);
        let (fast, mut fast_rx) = broadcaster.connect(8);
        broadcaster.join(slow, election);
        broadcaster.join(fast, election);

        assert_eq!(broadcaster.publish(delta(election, 1)), 2);
        assert_eq!(broadcaster.publish(delta(election, 2)), 1);
        assert_eq!(fast_rx.try_recv().unwrap().new_total_votes, 1);
        assert_eq!(fast_rx.try_recv().unwrap().new_total_votes, 2);
        // Still subscribed, just behind.
        assert_eq!(broadcaster.room_size(election), 2);
    }

    #[test]
    fn closed_observers_are_pruned() {
        let broadcaster = Broadcaster::new();
        let election = Id::new();
        let (a, rx) = broadcaster.connect(8);
        broadcaster.join(a, election);
        drop(rx);

        assert_eq!(broadcaster.publish(delta(election, 1)), 0);
        assert_eq!(broadcaster.room_size(election), 0);
        assert_eq!(broadcaster.observer_count(), 0);
    }
}
