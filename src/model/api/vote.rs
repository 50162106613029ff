use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::election::ElectionKind,
    db::{election::Election, ledger::LedgerEntry},
};

/// A vote, as submitted by a voter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastRequest {
    pub election_id: ApiId,
    pub candidate_id: ApiId,
}

/// Proof that a vote was counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub election_id: ApiId,
    pub candidate_id: ApiId,
    pub timestamp: DateTime<Utc>,
}

impl From<LedgerEntry> for VoteReceipt {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            election_id: entry.election_id.into(),
            candidate_id: entry.candidate_id.into(),
            timestamp: entry.timestamp,
        }
    }
}

/// Response to a successful cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastResponse {
    pub message: String,
    pub vote: VoteReceipt,
}

impl From<LedgerEntry> for CastResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            message: "Vote cast successfully".to_string(),
            vote: entry.into(),
        }
    }
}

/// Whether the caller has voted in an election, and if so, how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCheck {
    pub has_voted: bool,
    pub vote: Option<CheckedVote>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedVote {
    pub candidate_id: ApiId,
    pub timestamp: DateTime<Utc>,
}

impl From<Option<LedgerEntry>> for VoteCheck {
    fn from(entry: Option<LedgerEntry>) -> Self {
        Self {
            has_voted: entry.is_some(),
            vote: entry.map(|entry| CheckedVote {
                candidate_id: entry.candidate_id.into(),
                timestamp: entry.timestamp,
            }),
        }
    }
}

/// One of a voter's past votes, with enough election context to list it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterVote {
    pub election_id: ApiId,
    pub election_title: Option<String>,
    pub election_kind: Option<ElectionKind>,
    pub candidate_id: ApiId,
    pub candidate_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl VoterVote {
    /// Describe a ledger entry. The election may be missing if it was removed
    /// out from under the ledger, in which case only the IDs are reported.
    pub fn new(entry: LedgerEntry, election: Option<&Election>) -> Self {
        Self {
            election_id: entry.election_id.into(),
            election_title: election.map(|e| e.title.clone()),
            election_kind: election.map(|e| e.kind),
            candidate_id: entry.candidate_id.into(),
            candidate_name: election
                .and_then(|e| e.candidate(entry.candidate_id))
                .map(|c| c.name.clone()),
            timestamp: entry.timestamp,
        }
    }
}
