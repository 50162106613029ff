use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use hmac::Hmac;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::model::{
    api::auth::{Rights, User},
    mongodb::Id,
};

pub type HmacSha256 = Hmac<Sha256>;

/// Core voter identity data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// Display name; absent for anonymous voters.
    pub name: Option<String>,
    /// Hex-encoded HMAC of the voter's normalised phone number. This is the
    /// dedup key: we never store the number itself.
    pub contact_hmac: String,
    pub is_anonymous: bool,
    /// Elections this voter has cast a vote in, in the order they voted.
    pub voted_elections: Vec<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoterCore {
    /// Create a new voter who has not voted yet.
    pub fn new(name: Option<String>, contact_hmac: String, is_anonymous: bool) -> Self {
        Self {
            name: if is_anonymous { None } else { name },
            contact_hmac,
            is_anonymous,
            voted_elections: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Has this voter already voted in the given election?
    pub fn has_voted_in(&self, election_id: Id) -> bool {
        self.voted_elections.contains(&election_id)
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;

    fn id(&self) -> Id {
        self.id
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterCore {
        pub fn example(contact_hmac: &str) -> Self {
            Self::new(Some("Rahim Uddin".to_string()), contact_hmac.to_string(), false)
        }
    }
}
