//! Frames exchanged with live observers over the WebSocket channel.

use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::tally::TallyDelta};

/// A frame sent by an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    JoinElection { election_id: ApiId },
    #[serde(rename_all = "camelCase")]
    LeaveElection { election_id: ApiId },
}

/// A frame sent to an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Joined { election_id: ApiId },
    #[serde(rename_all = "camelCase")]
    Left { election_id: ApiId },
    #[serde(rename_all = "camelCase")]
    VoteUpdate {
        election_id: ApiId,
        candidate_id: ApiId,
        new_candidate_votes: u64,
        new_total_votes: u64,
    },
    Error { message: String },
}

impl From<TallyDelta> for ServerFrame {
    fn from(delta: TallyDelta) -> Self {
        ServerFrame::VoteUpdate {
            election_id: delta.election_id.into(),
            candidate_id: delta.candidate_id.into(),
            new_candidate_votes: delta.new_candidate_votes,
            new_total_votes: delta.new_total_votes,
        }
    }
}
