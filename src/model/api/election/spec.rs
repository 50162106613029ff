use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::election::{
        ElectionKind, ElectionStatus, DEFAULT_CANDIDATE_COLOR, DEFAULT_CANDIDATE_IMAGE,
        DEFAULT_ELECTION_ICON,
    },
    db::election::{Candidate, NewElection},
    mongodb::Id,
};

/// An election specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub kind: ElectionKind,
    pub category: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Initial status; elections open immediately unless told otherwise.
    #[serde(default)]
    pub status: Option<ElectionStatus>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub candidates: Vec<CandidateSpec>,
}

/// A candidate specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub party: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl ElectionSpec {
    /// Validate this spec and convert it into an election owned by `created_by`,
    /// with fresh candidate IDs and zeroed tallies.
    pub fn into_election(self, created_by: Id) -> Result<NewElection> {
        let title = non_empty(self.title, "title")?;
        let description = non_empty(self.description, "description")?;
        let category = non_empty(self.category, "category")?;
        if self.candidates.is_empty() {
            return Err(Error::validation("an election needs at least one candidate"));
        }

        let now = Utc::now();
        let start_date = self.start_date.unwrap_or(now);
        if let Some(end_date) = self.end_date {
            if end_date <= start_date {
                return Err(Error::validation("end date must be after start date"));
            }
        }

        let candidates = self
            .candidates
            .into_iter()
            .map(CandidateSpec::into_candidate)
            .collect::<Result<Vec<_>>>()?;

        Ok(NewElection {
            title,
            description,
            kind: self.kind,
            category,
            icon: self
                .icon
                .filter(|icon| !icon.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ELECTION_ICON.to_string()),
            status: self.status.unwrap_or(ElectionStatus::Active),
            candidates,
            total_votes: 0,
            start_date,
            end_date: self.end_date,
            created_at: now,
            created_by: Some(created_by),
        })
    }
}

impl CandidateSpec {
    fn into_candidate(self) -> Result<Candidate> {
        Ok(Candidate {
            id: Id::new(),
            name: non_empty(self.name, "candidate name")?,
            party: non_empty(self.party, "candidate party")?,
            image: self
                .image
                .filter(|image| !image.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CANDIDATE_IMAGE.to_string()),
            color: self
                .color
                .filter(|color| !color.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CANDIDATE_COLOR.to_string()),
            votes: 0,
        })
    }
}

fn non_empty(value: String, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation(format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

/// A requested status change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ElectionStatus,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionSpec {
        pub fn example() -> Self {
            Self {
                title: "National Election 2026".to_string(),
                description: "Choose the next government".to_string(),
                kind: ElectionKind::Election,
                category: "National".to_string(),
                icon: None,
                status: None,
                start_date: None,
                end_date: None,
                candidates: vec![CandidateSpec::example("A"), CandidateSpec::example("B")],
            }
        }

        pub fn upcoming_example() -> Self {
            Self {
                title: "Best Street Food".to_string(),
                kind: ElectionKind::Poll,
                category: "Food".to_string(),
                status: Some(ElectionStatus::Upcoming),
                ..Self::example()
            }
        }
    }

    impl CandidateSpec {
        pub fn example(name: &str) -> Self {
            Self {
                name: name.to_string(),
                party: format!("{name} League"),
                image: None,
                color: None,
            }
        }
    }
}
