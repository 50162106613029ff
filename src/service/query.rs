use std::collections::HashMap;

use crate::error::{Entity, Error, Result};
use crate::model::{
    api::{
        election::ElectionResults,
        vote::{VoteCheck, VoterVote},
    },
    common::election::ElectionStatus,
    db::election::Election,
    mongodb::Id,
};
use crate::store::Store;

/// Read-only views over elections and the ledger. Every result is a snapshot
/// of the last committed state the store returned.
pub struct QueryService {
    store: Store,
}

impl QueryService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Active elections, newest first.
    pub async fn list_active(&self) -> Result<Vec<Election>> {
        self.store
            .elections_with_status(ElectionStatus::Active)
            .await
    }

    pub async fn election(&self, id: Id) -> Result<Election> {
        self.store
            .election(id)
            .await?
            .ok_or(Error::NotFound(Entity::Election))
    }

    /// Candidates ranked by votes, with their share of the total.
    pub async fn results(&self, id: Id) -> Result<ElectionResults> {
        Ok(self.election(id).await?.into())
    }

    /// Everything a voter has voted for, newest first.
    pub async fn voter_votes(&self, voter_id: Id) -> Result<Vec<VoterVote>> {
        let entries = self.store.ledger_for_voter(voter_id).await?;
        let mut elections: HashMap<Id, Option<Election>> = HashMap::new();
        let mut votes = Vec::with_capacity(entries.len());
        for entry in entries {
            if !elections.contains_key(&entry.election_id) {
                let election = self.store.election(entry.election_id).await?;
                elections.insert(entry.election_id, election);
            }
            let election = elections.get(&entry.election_id).and_then(Option::as_ref);
            votes.push(VoterVote::new(entry, election));
        }
        Ok(votes)
    }

    /// Whether a voter has voted in an election.
    pub async fn vote_check(&self, voter_id: Id, election_id: Id) -> Result<VoteCheck> {
        Ok(self
            .store
            .ledger_entry(voter_id, election_id)
            .await?
            .into())
    }
}
