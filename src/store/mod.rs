//! Persistence for voters, admins, elections and the vote ledger.
//!
//! Everything above this module talks to a [`Store`], so the same services and
//! routes run against MongoDB in production and against memory in tests.

use std::sync::Arc;

use crate::error::Result;
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

mod memory;
mod mongo;
mod seed;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use seed::seed_sample_elections;

/// The store shared by every request.
pub type Store = Arc<dyn VoteStore>;

/// The outcome of a committed vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedVote {
    pub entry: LedgerEntry,
    /// The candidate's count after this vote.
    pub candidate_votes: u64,
    /// The election's aggregate count after this vote.
    pub total_votes: u64,
}

#[rocket::async_trait]
pub trait VoteStore: Send + Sync {
    /// Insert a voter. Fails with `Conflict` if the contact handle is taken.
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter>;

    async fn voter(&self, id: Id) -> Result<Option<Voter>>;

    async fn voter_by_contact(&self, contact_hmac: &str) -> Result<Option<Voter>>;

    /// Insert an admin. Fails with `Conflict` if the username is taken.
    async fn insert_admin(&self, admin: NewAdmin) -> Result<Admin>;

    async fn admin(&self, id: Id) -> Result<Option<Admin>>;

    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>>;

    async fn count_admins(&self) -> Result<u64>;

    async fn insert_election(&self, election: NewElection) -> Result<Election>;

    async fn election(&self, id: Id) -> Result<Option<Election>>;

    /// All elections with the given status, newest first. Elections created
    /// at the same instant are ordered by ID, highest first.
    async fn elections_with_status(&self, status: ElectionStatus) -> Result<Vec<Election>>;

    /// Move an election to a new status, if its lifecycle allows it.
    async fn set_election_status(&self, id: Id, status: ElectionStatus) -> Result<Election>;

    /// The vote a voter cast in an election, if any.
    async fn ledger_entry(&self, voter_id: Id, election_id: Id) -> Result<Option<LedgerEntry>>;

    /// Every vote a voter has cast, newest first.
    async fn ledger_for_voter(&self, voter_id: Id) -> Result<Vec<LedgerEntry>>;

    /// Every vote cast in an election, oldest first.
    async fn ledger_for_election(&self, election_id: Id) -> Result<Vec<LedgerEntry>>;

    /// Atomically record a vote: append it to the ledger, count it, and mark
    /// the voter as having voted in the election. Either all of that happens
    /// or none of it does.
    ///
    /// Checks are made in this order, and the first failure is reported:
    /// the election exists (`NotFound`), it is active (`InvalidState`), the
    /// voter has not voted in it (`Conflict`), the candidate exists
    /// (`NotFound`).
    async fn record_vote(&self, vote: NewLedgerEntry) -> Result<RecordedVote>;
}

/// Statuses from which an election may move to `next`.
pub(crate) fn statuses_leading_to(next: ElectionStatus) -> Vec<ElectionStatus> {
    [
        ElectionStatus::Upcoming,
        ElectionStatus::Active,
        ElectionStatus::Closed,
    ]
    .into_iter()
    .filter(|status| status.can_transition_to(next))
    .collect()
}

pub(crate) const ALREADY_VOTED: &str = "You have already voted in this election";
pub(crate) const NOT_ACTIVE: &str = "Election is not active";

#[cfg(test)]
mod tests {
    use super::*;

    use ElectionStatus::*;

    #[test]
    fn transition_sources() {
        assert_eq!(statuses_leading_to(Upcoming), [Upcoming]);
        assert_eq!(statuses_leading_to(Active), [Upcoming, Active]);
        assert_eq!(statuses_leading_to(Closed), [Upcoming, Active, Closed]);
    }
}
