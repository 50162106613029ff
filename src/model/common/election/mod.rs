mod kind;
mod state;

pub use kind::ElectionKind;
pub use state::ElectionStatus;

/// Glyph shown for an election when none is given.
pub const DEFAULT_ELECTION_ICON: &str = "🗳️";
/// Glyph shown for a candidate when none is given.
pub const DEFAULT_CANDIDATE_IMAGE: &str = "👤";
/// Colour shown for a candidate when none is given.
pub const DEFAULT_CANDIDATE_COLOR: &str = "#006A4E";
