use std::{ops::Deref, ops::RangeInclusive, str::FromStr};

use data_encoding::HEXLOWER;
use hmac::Mac;
use phonenumber::{country, Mode, PhoneNumber};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{config::Config, model::db::voter::HmacSha256};

/// A voter's contact handle: a Bangladeshi mobile number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Contact {
    inner: PhoneNumber,
}

#[derive(Debug, Error)]
pub enum ContactError {
    #[error(transparent)]
    Parse(#[from] phonenumber::ParseError),
    #[error("not a valid Bangladesh phone number")]
    Invalid,
    #[error("not a Bangladesh mobile number")]
    NotMobile,
}

/// National significant numbers of Bangladeshi mobiles: a `1`, an operator
/// digit from 3 to 9, then eight digits.
const MOBILE_NATIONAL: RangeInclusive<u64> = 1_300_000_000..=1_999_999_999;

impl Deref for Contact {
    type Target = PhoneNumber;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Contact {
    /// The number in E.164 form, e.g. `+8801712345678`. Every accepted
    /// spelling of a number normalises to the same string.
    pub fn normalised(&self) -> String {
        self.inner.format().mode(Mode::E164).to_string()
    }

    /// The dedup key stored in place of the number.
    pub fn into_hmac(self, config: &Config) -> String {
        let mut hmac = HmacSha256::new_from_slice(config.hmac_secret())
            .expect("HMAC can take key of any size");
        hmac.update(self.normalised().as_bytes());
        HEXLOWER.encode(&hmac.finalize().into_bytes())
    }
}

impl FromStr for Contact {
    type Err = ContactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = phonenumber::parse(Some(country::Id::BD), s.trim())?;
        if !phonenumber::is_valid(&inner) {
            return Err(ContactError::Invalid);
        }
        // Numbers written with another country code still parse.
        if inner.country().id() != Some(country::Id::BD)
            || !MOBILE_NATIONAL.contains(&inner.national().value())
        {
            return Err(ContactError::NotMobile);
        }
        Ok(Contact { inner })
    }
}

impl TryFrom<String> for Contact {
    type Error = ContactError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Contact> for String {
    fn from(contact: Contact) -> Self {
        contact.normalised()
    }
}
