use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::election::{ElectionKind, ElectionStatus},
    db::election::{Candidate, Election},
};

/// An API-friendly description of an election, including its live tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub kind: ElectionKind,
    pub category: String,
    pub icon: String,
    pub status: ElectionStatus,
    pub candidates: Vec<CandidateDescription>,
    pub total_votes: u64,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<ApiId>,
}

/// An API-friendly description of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub party: String,
    pub image: String,
    pub color: String,
    pub votes: u64,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name,
            party: candidate.party,
            image: candidate.image,
            color: candidate.color,
            votes: candidate.votes,
        }
    }
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        let id = election.id.into();
        let election = election.election;
        Self {
            id,
            title: election.title,
            description: election.description,
            kind: election.kind,
            category: election.category,
            icon: election.icon,
            status: election.status,
            candidates: election.candidates.into_iter().map(Into::into).collect(),
            total_votes: election.total_votes,
            start_date: election.start_date,
            end_date: election.end_date,
            created_at: election.created_at,
            created_by: election.created_by.map(Into::into),
        }
    }
}
