use std::convert::Infallible;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use rocket::{
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Where a vote came from. Kept for audit only; never used in any decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub origin: Option<String>,
    pub user_agent: Option<String>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientMeta {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ClientMeta {
            origin: req.client_ip().map(|ip| ip.to_string()),
            user_agent: req.headers().get_one("User-Agent").map(str::to_string),
        })
    }
}

/// Core ledger entry data, as stored in the database.
///
/// There is at most one entry per `(voter_id, election_id)`; entries are
/// never modified or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntryCore {
    pub voter_id: Id,
    pub election_id: Id,
    pub candidate_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    pub client: ClientMeta,
}

impl LedgerEntryCore {
    /// A vote submitted now.
    pub fn new(voter_id: Id, election_id: Id, candidate_id: Id, client: ClientMeta) -> Self {
        Self {
            voter_id,
            election_id,
            candidate_id,
            timestamp: Utc::now(),
            client,
        }
    }
}

/// A ledger entry without an ID.
pub type NewLedgerEntry = LedgerEntryCore;

/// A ledger entry from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: LedgerEntryCore,
}

impl Deref for LedgerEntry {
    type Target = LedgerEntryCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}
