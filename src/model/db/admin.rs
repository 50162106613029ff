use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{
    api::auth::{Rights, User},
    mongodb::Id,
};

/// Core admin user data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct. A malformed stored hash
    /// never verifies.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;

    fn id(&self) -> Id {
        self.id
    }
}
