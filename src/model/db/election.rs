use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{ElectionKind, ElectionStatus},
    mongodb::{optional_chrono_datetime, Id},
};

/// A selectable option within an election. Candidates only exist embedded in
/// their [`Election`], and are only mutated through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique within the election, and stable for its lifetime.
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    /// Party or affiliation label.
    pub party: String,
    /// Display glyph.
    pub image: String,
    /// Display colour.
    pub color: String,
    pub votes: u64,
}

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: String,
    pub kind: ElectionKind,
    pub category: String,
    pub icon: String,
    pub status: ElectionStatus,
    /// Candidates, in the order they were created.
    pub candidates: Vec<Candidate>,
    /// Always equal to the sum of the candidates' votes.
    pub total_votes: u64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(default, with = "optional_chrono_datetime")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// The admin who created the election.
    pub created_by: Option<Id>,
}

impl ElectionCore {
    /// Find a candidate of this election.
    pub fn candidate(&self, candidate_id: Id) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Is this election currently accepting votes?
    pub fn is_active(&self) -> bool {
        self.status == ElectionStatus::Active
    }

    /// Count one vote for the given candidate, returning the candidate's new
    /// count and the election's new total, or `None` if there is no such
    /// candidate (in which case nothing changes).
    pub fn count_vote(&mut self, candidate_id: Id) -> Option<(u64, u64)> {
        let candidate = self.candidates.iter_mut().find(|c| c.id == candidate_id)?;
        candidate.votes += 1;
        self.total_votes += 1;
        Some((candidate.votes, self.total_votes))
    }

    /// Does the aggregate count match the candidates' counts?
    pub fn tally_is_consistent(&self) -> bool {
        self.candidates.iter().map(|c| c.votes).sum::<u64>() == self.total_votes
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::common::election::{DEFAULT_CANDIDATE_COLOR, DEFAULT_CANDIDATE_IMAGE};

    impl Candidate {
        pub fn example(name: &str, votes: u64) -> Self {
            Self {
                id: Id::new(),
                name: name.to_string(),
                party: format!("{name} Party"),
                image: DEFAULT_CANDIDATE_IMAGE.to_string(),
                color: DEFAULT_CANDIDATE_COLOR.to_string(),
                votes,
            }
        }
    }

    impl ElectionCore {
        /// An election with the given status and candidate counts.
        pub fn example_with(status: ElectionStatus, votes: &[(&str, u64)]) -> Self {
            let candidates: Vec<_> = votes
                .iter()
                .map(|(name, votes)| Candidate::example(name, *votes))
                .collect();
            Self {
                title: "City Council".to_string(),
                description: "Elect the next council chair".to_string(),
                kind: ElectionKind::Election,
                category: "Local".to_string(),
                icon: "🏛️".to_string(),
                status,
                total_votes: candidates.iter().map(|c| c.votes).sum(),
                candidates,
                start_date: Utc::now(),
                end_date: None,
                created_at: Utc::now(),
                created_by: None,
            }
        }

        /// An active election with two candidates and no votes.
        pub fn example() -> Self {
            Self::example_with(ElectionStatus::Active, &[("A", 0), ("B", 0)])
        }
    }
}
