mod desc;
mod results;
mod spec;

pub use desc::{CandidateDescription, ElectionDescription};
pub use results::{percentage, ElectionResults, ElectionSummary, RankedCandidate};
pub use spec::{CandidateSpec, ElectionSpec, StatusUpdate};
