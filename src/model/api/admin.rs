use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::db::admin::NewAdmin;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Raw admin credentials, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl TryFrom<AdminCredentials> for NewAdmin {
    type Error = Error;

    /// Convert [`AdminCredentials`] to a new [`Admin`] by hashing the password.
    /// This enforces that the username is non-empty, and the password meets minimum length.
    fn try_from(cred: AdminCredentials) -> Result<Self, Self::Error> {
        if cred.username.trim().is_empty() {
            return Err(Error::validation("admin username must not be empty"));
        }
        if cred.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::validation(format!(
                "admin password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash = argon2::hash_encoded(cred.password.as_bytes(), &salt, &Config::default())?;
        Ok(Self {
            username: cred.username.trim().to_string(),
            password_hash,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies() {
        let admin = NewAdmin::try_from(AdminCredentials::example()).unwrap();
        assert_eq!(admin.username, "coordinator");
        assert!(admin.verify_password("livevote-admin"));
    }

    #[test]
    fn reject_weak_credentials() {
        let short = AdminCredentials {
            username: "someone".into(),
            password: "short".into(),
        };
        assert!(NewAdmin::try_from(short).is_err());

        let blank = AdminCredentials {
            username: "   ".into(),
            password: "long enough password".into(),
        };
        assert!(NewAdmin::try_from(blank).is_err());
    }
}
