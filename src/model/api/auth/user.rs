use std::fmt::{Display, Formatter};

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::mongodb::Id;

/// Someone who can hold an [`AuthToken`](super::AuthToken). Each kind of
/// account maps to exactly one set of [`Rights`].
pub trait User {
    const RIGHTS: Rights;

    fn id(&self) -> Id;
}

/// What a token lets its holder do. Stored in the token as a small integer
/// to keep cookies short.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    /// Cast votes and read back one's own ballot history.
    Voter = 0,
    /// Coordinators: create elections and move them through their lifecycle.
    Admin = 1,
}

impl Display for Rights {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Voter => "voter",
            Self::Admin => "admin",
        })
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::{from_str, to_string};

    use super::*;

    #[test]
    fn rights_are_compact() {
        assert_eq!(to_string(&Rights::Admin).unwrap(), "1");
        assert_eq!(from_str::<Rights>("0").unwrap(), Rights::Voter);
        assert!(from_str::<Rights>("2").is_err());
        assert_eq!(Rights::Admin.to_string(), "admin");
    }
}
