use std::cmp::Reverse;
use std::collections::HashMap;

use rocket::tokio::sync::RwLock;

use crate::error::{Entity, Error, Result};
use crate::model::{
    common::election::ElectionStatus,
    db::{
        admin::{Admin, NewAdmin},
        election::{Election, NewElection},
        ledger::{LedgerEntry, NewLedgerEntry},
        voter::{NewVoter, Voter},
    },
    mongodb::Id,
};

use super::{RecordedVote, VoteStore, ALREADY_VOTED, NOT_ACTIVE};

/// A store held entirely in memory. Every operation takes a single lock, so
/// each one is trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    voters: HashMap<Id, Voter>,
    admins: HashMap<Id, Admin>,
    elections: HashMap<Id, Election>,
    /// In insertion order.
    ledger: Vec<LedgerEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryStore {
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let mut inner = self.inner.write().await;
        if inner
            .voters
            .values()
            .any(|v| v.contact_hmac == voter.contact_hmac)
        {
            return Err(Error::conflict("A voter with this phone number already exists"));
        }
        let voter = Voter {
            id: Id::new(),
            voter,
        };
        inner.voters.insert(voter.id, voter.clone());
        Ok(voter)
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.inner.read().await.voters.get(&id).cloned())
    }

    async fn voter_by_contact(&self, contact_hmac: &str) -> Result<Option<Voter>> {
        Ok(self
            .inner
            .read()
            .await
            .voters
            .values()
            .find(|v| v.contact_hmac == contact_hmac)
            .cloned())
    }

    async fn insert_admin(&self, admin: NewAdmin) -> Result<Admin> {
        let mut inner = self.inner.write().await;
        if inner.admins.values().any(|a| a.username == admin.username) {
            return Err(Error::conflict("An admin with this username already exists"));
        }
        let admin = Admin {
            id: Id::new(),
            admin,
        };
        inner.admins.insert(admin.id, admin.clone());
        Ok(admin)
    }

    async fn admin(&self, id: Id) -> Result<Option<Admin>> {
        Ok(self.inner.read().await.admins.get(&id).cloned())
    }

    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        Ok(self
            .inner
            .read()
            .await
            .admins
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn count_admins(&self) -> Result<u64> {
        Ok(self.inner.read().await.admins.len() as u64)
    }

    async fn insert_election(&self, election: NewElection) -> Result<Election> {
        let election = Election {
            id: Id::new(),
            election,
        };
        self.inner
            .write()
            .await
            .elections
            .insert(election.id, election.clone());
        Ok(election)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.inner.read().await.elections.get(&id).cloned())
    }

    async fn elections_with_status(&self, status: ElectionStatus) -> Result<Vec<Election>> {
        let mut elections: Vec<_> = self
            .inner
            .read()
            .await
            .elections
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        elections.sort_by_key(|e| Reverse((e.created_at, e.id)));
        Ok(elections)
    }

    async fn set_election_status(&self, id: Id, status: ElectionStatus) -> Result<Election> {
        let mut inner = self.inner.write().await;
        let election = inner
            .elections
            .get_mut(&id)
            .ok_or(Error::NotFound(Entity::Election))?;
        if !election.status.can_transition_to(status) {
            return Err(Error::invalid_state(format!(
                "Cannot move a {} election to {status}",
                election.status
            )));
        }
        election.status = status;
        Ok(election.clone())
    }

    async fn ledger_entry(&self, voter_id: Id, election_id: Id) -> Result<Option<LedgerEntry>> {
        Ok(self
            .inner
            .read()
            .await
            .ledger
            .iter()
            .find(|e| e.voter_id == voter_id && e.election_id == election_id)
            .cloned())
    }

    async fn ledger_for_voter(&self, voter_id: Id) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<_> = self
            .inner
            .read()
            .await
            .ledger
            .iter()
            .filter(|e| e.voter_id == voter_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| Reverse((e.timestamp, e.id)));
        Ok(entries)
    }

    async fn ledger_for_election(&self, election_id: Id) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .inner
            .read()
            .await
            .ledger
            .iter()
            .filter(|e| e.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn record_vote(&self, vote: NewLedgerEntry) -> Result<RecordedVote> {
        let mut inner = self.inner.write().await;
        let Inner {
            voters,
            elections,
            ledger,
            ..
        } = &mut *inner;

        let election = elections
            .get_mut(&vote.election_id)
            .ok_or(Error::NotFound(Entity::Election))?;
        if !election.is_active() {
            return Err(Error::invalid_state(NOT_ACTIVE));
        }
        if ledger
            .iter()
            .any(|e| e.voter_id == vote.voter_id && e.election_id == vote.election_id)
        {
            return Err(Error::conflict(ALREADY_VOTED));
        }
        let voter = voters
            .get_mut(&vote.voter_id)
            .ok_or(Error::NotFound(Entity::Voter))?;
        let (candidate_votes, total_votes) = election
            .count_vote(vote.candidate_id)
            .ok_or(Error::NotFound(Entity::Candidate))?;

        if !voter.has_voted_in(vote.election_id) {
            voter.voted_elections.push(vote.election_id);
        }
        let entry = LedgerEntry {
            id: Id::new(),
            entry: vote,
        };
        ledger.push(entry.clone());

        Ok(RecordedVote {
            entry,
            candidate_votes,
            total_votes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use crate::model::db::{
        election::ElectionCore,
        ledger::{ClientMeta, LedgerEntryCore},
        voter::VoterCore,
    };

    use super::*;

    async fn setup(store: &MemoryStore, status: ElectionStatus) -> (Voter, Election) {
        let voter = store
            .insert_voter(VoterCore::example("abc"))
            .await
            .unwrap();
        let election = store
            .insert_election(ElectionCore::example_with(status, &[("A", 0), ("B", 0)]))
            .await
            .unwrap();
        (voter, election)
    }

    fn vote(voter: &Voter, election: &Election, candidate: usize) -> NewLedgerEntry {
        LedgerEntryCore::new(
            voter.id,
            election.id,
            election.candidates[candidate].id,
            ClientMeta::default(),
        )
    }

    #[rocket::async_test]
    async fn record_vote_updates_everything() {
        let store = MemoryStore::new();
        let (voter, election) = setup(&store, ElectionStatus::Active).await;

        let recorded = store.record_vote(vote(&voter, &election, 1)).await.unwrap();
        assert_eq!(recorded.candidate_votes, 1);
        assert_eq!(recorded.total_votes, 1);

        let election = store.election(election.id).await.unwrap().unwrap();
        assert_eq!(election.candidates[0].votes, 0);
        assert_eq!(election.candidates[1].votes, 1);
        assert!(election.tally_is_consistent());

        let voter = store.voter(voter.id).await.unwrap().unwrap();
        assert_eq!(voter.voted_elections, [election.id]);

        let entry = store.ledger_entry(voter.id, election.id).await.unwrap();
        assert_eq!(entry, Some(recorded.entry));
    }

    #[rocket::async_test]
    async fn second_vote_conflicts() {
        let store = MemoryStore::new();
        let (voter, election) = setup(&store, ElectionStatus::Active).await;

        store.record_vote(vote(&voter, &election, 0)).await.unwrap();
        let err = store.record_vote(vote(&voter, &election, 1)).await;
        assert!(matches!(err, Err(Error::Conflict(_))));

        let election = store.election(election.id).await.unwrap().unwrap();
        assert_eq!(election.total_votes, 1);
        assert_eq!(store.ledger_for_election(election.id).await.unwrap().len(), 1);
    }

    #[rocket::async_test]
    async fn failed_checks_change_nothing() {
        let store = MemoryStore::new();
        let (voter, upcoming) = setup(&store, ElectionStatus::Upcoming).await;

        let err = store.record_vote(vote(&voter, &upcoming, 0)).await;
        assert!(matches!(err, Err(Error::InvalidState(_))));

        let active = store
            .insert_election(ElectionCore::example())
            .await
            .unwrap();
        let mut bad_candidate = vote(&voter, &active, 0);
        bad_candidate.candidate_id = Id::new();
        let err = store.record_vote(bad_candidate).await;
        assert!(matches!(err, Err(Error::NotFound(Entity::Candidate))));

        let mut bad_election = vote(&voter, &active, 0);
        bad_election.election_id = Id::new();
        let err = store.record_vote(bad_election).await;
        assert!(matches!(err, Err(Error::NotFound(Entity::Election))));

        assert!(store.ledger_for_voter(voter.id).await.unwrap().is_empty());
        let voter = store.voter(voter.id).await.unwrap().unwrap();
        assert!(voter.voted_elections.is_empty());
        let active = store.election(active.id).await.unwrap().unwrap();
        assert_eq!(active.total_votes, 0);
    }

    #[rocket::async_test]
    async fn conflict_reported_before_unknown_candidate() {
        let store = MemoryStore::new();
        let (voter, election) = setup(&store, ElectionStatus::Active).await;
        store.record_vote(vote(&voter, &election, 0)).await.unwrap();

        let mut again = vote(&voter, &election, 0);
        again.candidate_id = Id::new();
        assert!(matches!(
            store.record_vote(again).await,
            Err(Error::Conflict(_))
        ));
    }

    #[rocket::async_test]
    async fn duplicate_voter_conflicts() {
        let store = MemoryStore::new();
        store
            .insert_voter(VoterCore::example("abc"))
            .await
            .unwrap();
        assert!(matches!(
            store.insert_voter(VoterCore::example("abc")).await,
            Err(Error::Conflict(_))
        ));
        assert!(store.voter_by_contact("abc").await.unwrap().is_some());
        assert!(store.voter_by_contact("xyz").await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn active_elections_newest_first() {
        let store = MemoryStore::new();
        let now = chrono::Utc::now();
        let mut ids = Vec::new();
        for age in [3, 1, 2] {
            let mut election = ElectionCore::example();
            election.created_at = now - Duration::hours(age);
            ids.push(store.insert_election(election).await.unwrap().id);
        }
        store
            .insert_election(ElectionCore::example_with(ElectionStatus::Closed, &[]))
            .await
            .unwrap();

        let listed: Vec<_> = store
            .elections_with_status(ElectionStatus::Active)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(listed, [ids[1], ids[2], ids[0]]);
    }

    #[rocket::async_test]
    async fn status_transitions() {
        let store = MemoryStore::new();
        let (_, election) = setup(&store, ElectionStatus::Upcoming).await;

        let opened = store
            .set_election_status(election.id, ElectionStatus::Active)
            .await
            .unwrap();
        assert_eq!(opened.status, ElectionStatus::Active);

        assert!(matches!(
            store
                .set_election_status(election.id, ElectionStatus::Upcoming)
                .await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            store
                .set_election_status(Id::new(), ElectionStatus::Closed)
                .await,
            Err(Error::NotFound(Entity::Election))
        ));
    }

    #[rocket::async_test]
    async fn concurrent_votes_from_one_voter_count_once() {
        let store = Arc::new(MemoryStore::new());
        let (voter, election) = setup(&store, ElectionStatus::Active).await;

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = store.clone();
                let vote = vote(&voter, &election, i % 2);
                rocket::tokio::spawn(async move { store.record_vote(vote).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(successes, 1);

        let election = store.election(election.id).await.unwrap().unwrap();
        assert_eq!(election.total_votes, 1);
        assert!(election.tally_is_consistent());
    }
}
