use crate::model::mongodb::Id;

/// The change in counts caused by one committed vote, as pushed to live
/// observers of the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyDelta {
    pub election_id: Id,
    pub candidate_id: Id,
    /// The candidate's count after the vote.
    pub new_candidate_votes: u64,
    /// The election's aggregate count after the vote.
    pub new_total_votes: u64,
}
