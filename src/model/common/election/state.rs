use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the Election lifecycle. Transitions are driven by admins.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Announced, but not yet accepting votes.
    Upcoming,
    /// Accepting votes.
    Active,
    /// Finished; the tallies are final.
    Closed,
}

impl ElectionStatus {
    /// May an election move from `self` to `next`?
    ///
    /// Re-setting the current status is always allowed. `Closed` is terminal,
    /// and an election never goes back to `Upcoming` once it has opened.
    pub fn can_transition_to(self, next: ElectionStatus) -> bool {
        use ElectionStatus::*;
        matches!(
            (self, next),
            (Upcoming, _) | (Active, Active) | (Active, Closed) | (Closed, Closed)
        )
    }
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Closed => "closed",
        })
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ElectionStatus::*;

    #[test]
    fn lifecycle_transitions() {
        assert!(Upcoming.can_transition_to(Active));
        assert!(Upcoming.can_transition_to(Closed));
        assert!(Active.can_transition_to(Closed));
        assert!(Active.can_transition_to(Active));

        assert!(!Active.can_transition_to(Upcoming));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Closed.can_transition_to(Upcoming));
    }

    #[test]
    fn serialises_lowercase() {
        assert_eq!(Bson::from(Active), Bson::String("active".to_string()));
        assert_eq!(Closed.to_string(), "closed");
    }
}
