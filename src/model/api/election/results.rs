use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::election::ElectionKind,
    db::election::{Candidate, Election},
};

/// The ranked results of an election, as shown on the results page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election: ElectionSummary,
    pub results: Vec<RankedCandidate>,
}

/// Just enough about an election to head its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    pub id: ApiId,
    pub title: String,
    pub kind: ElectionKind,
    pub total_votes: u64,
}

/// A candidate's standing within the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: ApiId,
    pub name: String,
    pub party: String,
    pub image: String,
    pub color: String,
    pub votes: u64,
    /// Share of the total, rounded to two decimal places. Zero when nobody has voted.
    pub percentage: f64,
}

/// `votes / total * 100`, rounded to two decimal places.
pub fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 / total as f64 * 10_000.0).round() / 100.0
}

impl RankedCandidate {
    fn new(candidate: Candidate, total: u64) -> Self {
        Self {
            id: candidate.id.into(),
            percentage: percentage(candidate.votes, total),
            name: candidate.name,
            party: candidate.party,
            image: candidate.image,
            color: candidate.color,
            votes: candidate.votes,
        }
    }
}

impl From<Election> for ElectionResults {
    /// Rank candidates by votes, highest first. Ties keep the order the
    /// candidates were declared in.
    fn from(election: Election) -> Self {
        let id = election.id.into();
        let election = election.election;
        let total = election.total_votes;

        let mut candidates = election.candidates;
        // `sort_by` is stable.
        candidates.sort_by(|a, b| b.votes.cmp(&a.votes));

        Self {
            election: ElectionSummary {
                id,
                title: election.title,
                kind: election.kind,
                total_votes: total,
            },
            results: candidates
                .into_iter()
                .map(|candidate| RankedCandidate::new(candidate, total))
                .collect(),
        }
    }
}
