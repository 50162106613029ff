use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{admin::Admin, election::Election, ledger::LedgerEntry, voter::Voter};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Admin collection
const ADMINS: &str = "admins";
impl MongoCollection for Admin {
    const NAME: &'static str = ADMINS;
}

// Voter collection
const VOTERS: &str = "voters";
impl MongoCollection for Voter {
    const NAME: &'static str = VOTERS;
}

// Election collection
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}

// Vote ledger collection
const LEDGER: &str = "ledger";
impl MongoCollection for LedgerEntry {
    const NAME: &'static str = LEDGER;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Voter collection: one identity per contact handle.
    let voter_index = IndexModel::builder()
        .keys(doc! {"contact_hmac": 1})
        .options(unique.clone())
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    // Admin collection.
    let admin_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<Admin>::from_db(db)
        .create_index(admin_index, None)
        .await?;

    // Election collection: the active list is filtered by status, newest first.
    let election_index = IndexModel::builder()
        .keys(doc! {"status": 1, "created_at": -1})
        .build();
    Coll::<Election>::from_db(db)
        .create_index(election_index, None)
        .await?;

    // Ledger collection: the one-person-one-vote constraint.
    let ledger_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "election_id": 1})
        .options(unique)
        .build();
    Coll::<LedgerEntry>::from_db(db)
        .create_index(ledger_index, None)
        .await?;

    Ok(())
}
