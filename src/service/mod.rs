//! The operations the API is built from.

mod casting;
mod query;

pub use casting::{CastSequencer, VoteService};
pub use query::QueryService;
