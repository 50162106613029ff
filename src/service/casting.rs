use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rocket::tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::broadcast::Broadcaster;
use crate::error::{Error, Result};
use crate::model::{
    common::tally::TallyDelta,
    db::ledger::{ClientMeta, LedgerEntry, LedgerEntryCore},
    mongodb::Id,
};
use crate::store::Store;

/// Per-election serialisation point for casts.
///
/// A cast holds its election's lock from before the commit until its delta
/// has been queued, so deltas reach observers in commit order. Casts in
/// different elections never wait on each other. An election's lock is
/// forgotten once nobody holds or waits for it.
#[derive(Debug, Default)]
pub struct CastSequencer {
    locks: Mutex<HashMap<Id, Arc<AsyncMutex<()>>>>,
}

impl CastSequencer {
    fn locks(&self) -> MutexGuard<'_, HashMap<Id, Arc<AsyncMutex<()>>>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait until no other cast in this election is in flight.
    pub async fn acquire(&self, election_id: Id) -> Turn<'_> {
        let lock = self.locks().entry(election_id).or_default().clone();
        let guard = lock.clone().lock_owned().await;
        Turn {
            sequencer: self,
            election_id,
            lock,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks().len()
    }
}

/// Exclusive right to cast in one election, released on drop.
pub struct Turn<'a> {
    sequencer: &'a CastSequencer,
    election_id: Id,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.sequencer.locks();
        // Only the map and this turn still refer to the lock: nobody is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.election_id);
        }
    }
}

/// Casts votes and announces the results.
pub struct VoteService {
    store: Store,
    broadcaster: Broadcaster,
    sequencer: CastSequencer,
}

impl VoteService {
    pub fn new(store: Store, broadcaster: Broadcaster) -> Self {
        Self {
            store,
            broadcaster,
            sequencer: CastSequencer::default(),
        }
    }

    /// Cast a vote on behalf of an authenticated voter.
    ///
    /// On success the vote is durable and its tally delta has been queued for
    /// every observer of the election. On failure nothing has changed and
    /// nothing is broadcast.
    pub async fn cast_vote(
        &self,
        voter_id: Id,
        election_id: Id,
        candidate_id: Id,
        client: ClientMeta,
    ) -> Result<LedgerEntry> {
        let _turn = self.sequencer.acquire(election_id).await;

        let vote = LedgerEntryCore::new(voter_id, election_id, candidate_id, client);
        let recorded = match self.store.record_vote(vote).await {
            Ok(recorded) => recorded,
            Err(e) => {
                log_rejection(election_id, &e);
                return Err(e);
            }
        };

        let delta = TallyDelta {
            election_id,
            candidate_id,
            new_candidate_votes: recorded.candidate_votes,
            new_total_votes: recorded.total_votes,
        };
        let observers = self.broadcaster.publish(delta);
        info!(
            "Vote recorded in election {election_id}: {} total, sent to {observers} observer(s)",
            recorded.total_votes
        );

        Ok(recorded.entry)
    }
}

fn log_rejection(election_id: Id, err: &Error) {
    match err {
        Error::NotFound(_) | Error::InvalidState(_) | Error::Conflict(_) => {
            debug!("Vote in election {election_id} rejected: {err}");
        }
        _ => error!("Vote in election {election_id} failed: {err}"),
    }
}
