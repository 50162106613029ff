use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::mongodb::Id;
use crate::store::Store;

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<U> {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the given user, with the correct rights for that user type.
    pub fn new(user: &U) -> Self {
        Self {
            id: user.id(),
            rights: U::RIGHTS,
            phantom: PhantomData,
        }
    }

    /// Serialize this token into a signed cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>, Error> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build((AUTH_TOKEN_COOKIE, token))
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .build())
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it has the correct rights for this user
    /// type, and that the user still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = try_outcome!(req
            .guard::<&State<Config>>()
            .await
            .map_error(|(status, _)| (status, Error::internal("Config is not managed"))));
        let store = try_outcome!(req
            .guard::<&State<Store>>()
            .await
            .map_error(|(status, _)| (status, Error::internal("Store is not managed"))));

        // Forward to any routes that do not require an authentication token.
        let cookie = try_outcome!(req
            .cookies()
            .get(AUTH_TOKEN_COOKIE)
            .or_forward(Status::Unauthorized));

        // Decode the token.
        let token: Self =
            try_outcome!(Self::from_cookie(cookie, config).or_forward(Status::Unauthorized));

        // Check it represents the correct rights.
        if !token.permits(U::RIGHTS) {
            return Outcome::Forward(Status::Unauthorized);
        }

        // Check the user actually exists.
        let exists = match token.rights {
            Rights::Voter => store.voter(token.id).await.map(|v| v.is_some()),
            Rights::Admin => store.admin(token.id).await.map(|a| a.is_some()),
        };
        match exists {
            Ok(true) => Outcome::Success(token),
            Ok(false) => Outcome::Forward(Status::Unauthorized),
            Err(e) => Outcome::Error((Status::InternalServerError, e)),
        }
    }
}
