use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{contact::Contact, id::ApiId},
    db::voter::{NewVoter, Voter},
};

pub const MIN_NAME_LENGTH: usize = 2;

/// A registration request. The phone number is the identity; registering
/// again with the same number signs the existing voter back in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub phone: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl RegistrationRequest {
    /// Validate the request, producing the voter it describes.
    pub fn into_voter(self, config: &Config) -> Result<NewVoter> {
        let contact: Contact = self
            .phone
            .parse()
            .map_err(|e| Error::validation(format!("Invalid phone number: {e}")))?;

        let name = if self.is_anonymous {
            None
        } else {
            let name = self.name.as_deref().map(str::trim).unwrap_or_default();
            if name.chars().count() < MIN_NAME_LENGTH {
                return Err(Error::validation(format!(
                    "Name must be at least {MIN_NAME_LENGTH} characters"
                )));
            }
            Some(name.to_string())
        };

        Ok(NewVoter::new(
            name,
            contact.into_hmac(config),
            self.is_anonymous,
        ))
    }
}

/// What a voter is shown about themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterProfile {
    pub id: ApiId,
    pub name: Option<String>,
    pub is_anonymous: bool,
    pub voted_elections: Vec<ApiId>,
    pub created_at: DateTime<Utc>,
}

impl From<Voter> for VoterProfile {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id.into(),
            name: voter.voter.name,
            is_anonymous: voter.voter.is_anonymous,
            voted_elections: voter
                .voter
                .voted_elections
                .into_iter()
                .map(Into::into)
                .collect(),
            created_at: voter.voter.created_at,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_voter() {
        let voter = RegistrationRequest::example()
            .into_voter(&Config::example())
            .unwrap();
        assert_eq!(voter.name.as_deref(), Some("Rahim Uddin"));
        assert!(!voter.is_anonymous);
    }

    #[test]
    fn anonymous_voter_drops_name() {
        let mut request = RegistrationRequest::example2();
        request.name = Some("Ignored".to_string());
        let voter = request.into_voter(&Config::example()).unwrap();
        assert_eq!(voter.name, None);
        assert!(voter.is_anonymous);
    }

    #[test]
    fn named_voter_needs_a_real_name() {
        let mut request = RegistrationRequest::example();
        request.name = Some(" A ".to_string());
        assert!(matches!(
            request.into_voter(&Config::example()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn reject_bad_phone() {
        let mut request = RegistrationRequest::example();
        request.phone = "12345".to_string();
        assert!(matches!(
            request.into_voter(&Config::example()),
            Err(Error::Validation(_))
        ));
    }
}
