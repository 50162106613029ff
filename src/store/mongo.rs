use mongodb::{
    bson::{doc, Document},
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Entity, Error, Result};
use crate::model::{
    common::election::ElectionStatus,
    db::{
        admin::{Admin, NewAdmin},
        election::{Election, NewElection},
        ledger::{LedgerEntry, NewLedgerEntry},
        voter::{NewVoter, Voter},
    },
    mongodb::{ensure_indexes_exist, is_duplicate_key_error, Coll, Id},
};

use super::{statuses_leading_to, RecordedVote, VoteStore, ALREADY_VOTED, NOT_ACTIVE};

/// How many times a vote transaction is attempted before giving up.
const MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// A store backed by MongoDB. Vote recording runs in a multi-document
/// transaction, so the database must be a replica set.
pub struct MongoStore {
    client: Client,
    admins: Coll<Admin>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    ledger: Coll<LedgerEntry>,
}

impl MongoStore {
    /// Connect to the database and make sure its indexes exist.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        Ok(Self::new(client, &db))
    }

    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            admins: Coll::from_db(db),
            voters: Coll::from_db(db),
            elections: Coll::from_db(db),
            ledger: Coll::from_db(db),
        }
    }

    /// One attempt at recording a vote, inside the session's open transaction.
    async fn try_record_vote(
        &self,
        vote: &NewLedgerEntry,
        session: &mut ClientSession,
    ) -> Result<RecordedVote> {
        let election = self
            .elections
            .find_one_with_session(vote.election_id.as_doc(), None, session)
            .await?
            .ok_or(Error::NotFound(Entity::Election))?;
        if !election.is_active() {
            return Err(Error::invalid_state(NOT_ACTIVE));
        }
        let existing = self
            .ledger
            .find_one_with_session(
                doc! { "voter_id": vote.voter_id, "election_id": vote.election_id },
                None,
                session,
            )
            .await?;
        if existing.is_some() {
            return Err(Error::conflict(ALREADY_VOTED));
        }
        if election.candidate(vote.candidate_id).is_none() {
            return Err(Error::NotFound(Entity::Candidate));
        }

        let entry = LedgerEntry {
            id: Id::new(),
            entry: vote.clone(),
        };
        match self
            .ledger
            .insert_one_with_session(&entry, None, session)
            .await
        {
            Ok(_) => {}
            Err(e) if is_duplicate_key_error(&e) => return Err(Error::conflict(ALREADY_VOTED)),
            Err(e) => return Err(e.into()),
        }

        // The status filter guards against the election closing between the
        // read above and this write.
        let filter = doc! {
            "_id": vote.election_id,
            "status": ElectionStatus::Active,
            "candidates._id": vote.candidate_id,
        };
        let update = doc! {
            "$inc": { "candidates.$.votes": 1_i64, "total_votes": 1_i64 },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .elections
            .find_one_and_update_with_session(filter, update, options, session)
            .await?
            .ok_or_else(|| Error::invalid_state(NOT_ACTIVE))?;
        let candidate_votes = updated
            .candidate(vote.candidate_id)
            .map(|c| c.votes)
            .ok_or(Error::NotFound(Entity::Candidate))?;

        let voter = self
            .voters
            .update_one_with_session(
                vote.voter_id.as_doc(),
                doc! { "$addToSet": { "voted_elections": vote.election_id } },
                None,
                session,
            )
            .await?;
        if voter.matched_count == 0 {
            return Err(Error::NotFound(Entity::Voter));
        }

        Ok(RecordedVote {
            entry,
            candidate_votes,
            total_votes: updated.total_votes,
        })
    }
}

/// May the transaction be retried from the start?
fn is_transient(err: &Error) -> bool {
    matches!(err, Error::Db(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR))
}

/// May the commit be retried on its own?
fn is_unknown_commit(err: &DbError) -> bool {
    err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
}

fn newest_first() -> Document {
    doc! { "created_at": -1, "_id": -1 }
}

#[rocket::async_trait]
impl VoteStore for MongoStore {
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let voter = Voter {
            id: Id::new(),
            voter,
        };
        match self.voters.insert_one(&voter, None).await {
            Ok(_) => Ok(voter),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::conflict(
                "A voter with this phone number already exists",
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.voters.find_one(id.as_doc(), None).await?)
    }

    async fn voter_by_contact(&self, contact_hmac: &str) -> Result<Option<Voter>> {
        Ok(self
            .voters
            .find_one(doc! { "contact_hmac": contact_hmac }, None)
            .await?)
    }

    async fn insert_admin(&self, admin: NewAdmin) -> Result<Admin> {
        let admin = Admin {
            id: Id::new(),
            admin,
        };
        match self.admins.insert_one(&admin, None).await {
            Ok(_) => Ok(admin),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::conflict(
                "An admin with this username already exists",
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn admin(&self, id: Id) -> Result<Option<Admin>> {
        Ok(self.admins.find_one(id.as_doc(), None).await?)
    }

    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        Ok(self
            .admins
            .find_one(doc! { "username": username }, None)
            .await?)
    }

    async fn count_admins(&self) -> Result<u64> {
        Ok(self.admins.count_documents(None, None).await?)
    }

    async fn insert_election(&self, election: NewElection) -> Result<Election> {
        let election = Election {
            id: Id::new(),
            election,
        };
        self.elections.insert_one(&election, None).await?;
        Ok(election)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn elections_with_status(&self, status: ElectionStatus) -> Result<Vec<Election>> {
        let options = FindOptions::builder().sort(newest_first()).build();
        Ok(self
            .elections
            .find(doc! { "status": status }, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn set_election_status(&self, id: Id, status: ElectionStatus) -> Result<Election> {
        let sources: Vec<_> = statuses_leading_to(status)
            .into_iter()
            .map(mongodb::bson::Bson::from)
            .collect();
        let filter = doc! { "_id": id, "status": { "$in": sources } };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .elections
            .find_one_and_update(filter, doc! { "$set": { "status": status } }, options)
            .await?;

        match updated {
            Some(election) => Ok(election),
            None => match self.election(id).await? {
                Some(election) => Err(Error::invalid_state(format!(
                    "Cannot move a {} election to {status}",
                    election.status
                ))),
                None => Err(Error::NotFound(Entity::Election)),
            },
        }
    }

    async fn ledger_entry(&self, voter_id: Id, election_id: Id) -> Result<Option<LedgerEntry>> {
        Ok(self
            .ledger
            .find_one(
                doc! { "voter_id": voter_id, "election_id": election_id },
                None,
            )
            .await?)
    }

    async fn ledger_for_voter(&self, voter_id: Id) -> Result<Vec<LedgerEntry>> {
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": -1, "_id": -1 })
            .build();
        Ok(self
            .ledger
            .find(doc! { "voter_id": voter_id }, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn ledger_for_election(&self, election_id: Id) -> Result<Vec<LedgerEntry>> {
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": 1, "_id": 1 })
            .build();
        Ok(self
            .ledger
            .find(doc! { "election_id": election_id }, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn record_vote(&self, vote: NewLedgerEntry) -> Result<RecordedVote> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            session.start_transaction(None).await?;

            let recorded = match self.try_record_vote(&vote, &mut session).await {
                Ok(recorded) => recorded,
                Err(e) => {
                    // Nothing to keep; the abort itself may fail if the
                    // server already dropped the transaction.
                    let _ = session.abort_transaction().await;
                    if is_transient(&e) && attempt < MAX_TRANSACTION_ATTEMPTS {
                        warn!("Retrying vote transaction after transient error: {e}");
                        continue;
                    }
                    return Err(e);
                }
            };

            loop {
                match session.commit_transaction().await {
                    Ok(()) => return Ok(recorded),
                    Err(e) if is_unknown_commit(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                        attempt += 1;
                        warn!("Retrying vote commit after unknown result: {e}");
                    }
                    Err(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR) => break,
                    Err(e) => return Err(e.into()),
                }
            }

            if attempt >= MAX_TRANSACTION_ATTEMPTS {
                return Err(Error::internal("Vote transaction kept failing"));
            }
            warn!("Retrying vote transaction after transient commit error");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use crate::broadcast::Broadcaster;
    use crate::model::db::{election::ElectionCore, ledger::ClientMeta, voter::VoterCore};
    use crate::service::VoteService;
    use crate::store::Store;

    use super::*;

    async fn voter(store: &Store, contact: &str) -> Voter {
        store
            .insert_voter(VoterCore::example(contact))
            .await
            .unwrap()
    }

    async fn election(store: &Store, status: ElectionStatus) -> Election {
        store
            .insert_election(ElectionCore::example_with(status, &[("A", 0), ("B", 0)]))
            .await
            .unwrap()
    }

    fn vote(voter: &Voter, election: &Election, candidate_id: Id) -> NewLedgerEntry {
        NewLedgerEntry::new(voter.id, election.id, candidate_id, ClientMeta::default())
    }

    /// Counts of an election as stored: `(per candidate, total)`.
    async fn counts(store: &Store, election: &Election) -> (Vec<u64>, u64) {
        let election = store.election(election.id).await.unwrap().unwrap();
        assert!(election.tally_is_consistent());
        let votes = election.candidates.iter().map(|c| c.votes).collect();
        (votes, election.total_votes)
    }

    #[test]
    fn only_db_errors_are_transient() {
        assert!(!is_transient(&Error::conflict(ALREADY_VOTED)));
        assert!(!is_transient(&Error::invalid_state(NOT_ACTIVE)));
        assert!(!is_transient(&Error::NotFound(Entity::Candidate)));
    }

    #[backend_test(mongodb)]
    async fn vote_commits_everything(store: Store) {
        let voter = voter(&store, "v1").await;
        let election = election(&store, ElectionStatus::Active).await;
        let b = election.candidates[1].id;

        let recorded = store.record_vote(vote(&voter, &election, b)).await.unwrap();
        assert_eq!((recorded.candidate_votes, recorded.total_votes), (1, 1));
        assert_eq!(counts(&store, &election).await, (vec![0, 1], 1));

        let entry = store.ledger_entry(voter.id, election.id).await.unwrap();
        assert_eq!(entry.map(|e| e.id), Some(recorded.entry.id));
        let voter = store.voter(voter.id).await.unwrap().unwrap();
        assert_eq!(voter.voted_elections, [election.id]);
    }

    #[backend_test(mongodb)]
    async fn racing_duplicates_count_once(store: Store) {
        let voter = voter(&store, "v1").await;
        let election = election(&store, ElectionStatus::Active).await;

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let store = store.clone();
                let vote = vote(&voter, &election, election.candidates[i % 2].id);
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
        assert_eq!(counts(&store, &election).await.1, 1);
        assert_eq!(store.ledger_for_voter(voter.id).await.unwrap().len(), 1);
        let voter = store.voter(voter.id).await.unwrap().unwrap();
        assert_eq!(voter.voted_elections, [election.id]);
    }

    #[backend_test(mongodb)]
    async fn concurrent_casts_are_all_counted(store: Store) {
        let service = Arc::new(VoteService::new(store.clone(), Broadcaster::new()));
        let election = election(&store, ElectionStatus::Active).await;

        let mut handles = Vec::new();
        for i in 0..20 {
            let voter = voter(&store, &format!("voter{i}")).await;
            let service = service.clone();
            let (election_id, candidate_id) = (election.id, election.candidates[i % 2].id);
            handles.push(rocket::tokio::spawn(async move {
                service
                    .cast_vote(voter.id, election_id, candidate_id, ClientMeta::default())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(counts(&store, &election).await, (vec![10, 10], 20));
        assert_eq!(
            store.ledger_for_election(election.id).await.unwrap().len(),
            20
        );
    }

    #[backend_test(mongodb)]
    async fn rejected_votes_leave_no_trace(store: Store) {
        let voter = voter(&store, "v1").await;

        let closed = election(&store, ElectionStatus::Closed).await;
        let err = store
            .record_vote(vote(&voter, &closed, closed.candidates[0].id))
            .await;
        assert!(matches!(err, Err(Error::InvalidState(_))));
        assert_eq!(counts(&store, &closed).await, (vec![0, 0], 0));

        let active = election(&store, ElectionStatus::Active).await;
        let err = store.record_vote(vote(&voter, &active, Id::new())).await;
        assert!(matches!(err, Err(Error::NotFound(Entity::Candidate))));
        assert_eq!(counts(&store, &active).await, (vec![0, 0], 0));

        // The ledger insert and the count both happen before the voter is
        // found missing; the abort must undo them.
        let mut ghost = voter.clone();
        ghost.id = Id::new();
        let err = store
            .record_vote(vote(&ghost, &active, active.candidates[0].id))
            .await;
        assert!(matches!(err, Err(Error::NotFound(Entity::Voter))));
        assert_eq!(counts(&store, &active).await, (vec![0, 0], 0));

        assert!(store.ledger_for_voter(voter.id).await.unwrap().is_empty());
        assert!(store.ledger_for_voter(ghost.id).await.unwrap().is_empty());
        let voter = store.voter(voter.id).await.unwrap().unwrap();
        assert!(voter.voted_elections.is_empty());
    }

    #[backend_test(mongodb)]
    async fn status_changes_follow_lifecycle(store: Store) {
        let upcoming = election(&store, ElectionStatus::Upcoming).await;

        let opened = store
            .set_election_status(upcoming.id, ElectionStatus::Active)
            .await
            .unwrap();
        assert_eq!(opened.status, ElectionStatus::Active);
        let closed = store
            .set_election_status(upcoming.id, ElectionStatus::Closed)
            .await
            .unwrap();
        assert_eq!(closed.status, ElectionStatus::Closed);

        let err = store
            .set_election_status(upcoming.id, ElectionStatus::Active)
            .await;
        assert!(matches!(err, Err(Error::InvalidState(_))));
        let err = store
            .set_election_status(Id::new(), ElectionStatus::Closed)
            .await;
        assert!(matches!(err, Err(Error::NotFound(Entity::Election))));
    }

    #[backend_test(mongodb)]
    async fn active_elections_newest_first(store: Store) {
        let now = Utc::now();
        let mut ids = Vec::new();
        for days in [3, 1, 2] {
            let mut election = ElectionCore::example();
            election.created_at = now - Duration::days(days);
            ids.push(store.insert_election(election).await.unwrap().id);
        }
        election(&store, ElectionStatus::Closed).await;

        let listed: Vec<_> = store
            .elections_with_status(ElectionStatus::Active)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(listed, [ids[1], ids[2], ids[0]]);
    }
}
