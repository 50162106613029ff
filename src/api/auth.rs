use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::{Entity, Error, Result},
    model::{
        api::{
            admin::AdminCredentials,
            auth::{AuthToken, AUTH_TOKEN_COOKIE},
            voter::{RegistrationRequest, VoterProfile},
        },
        db::{admin::Admin, voter::Voter},
    },
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![register, profile, authenticate, logout]
}

/// Register a voter, or sign an existing voter back in if the phone number is
/// already known.
#[post("/auth/register", data = "<request>", format = "json")]
pub async fn register(
    request: Json<RegistrationRequest>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
    store: &State<Store>,
) -> Result<(Status, Json<VoterProfile>)> {
    let new_voter = request.into_inner().into_voter(config)?;
    let contact_hmac = new_voter.contact_hmac.clone();

    let (status, voter) = match store.voter_by_contact(&contact_hmac).await? {
        Some(voter) => (Status::Ok, voter),
        None => match store.insert_voter(new_voter).await {
            Ok(voter) => {
                info!("Registered voter {}", voter.id);
                (Status::Created, voter)
            }
            // A concurrent registration with the same number won.
            Err(Error::Conflict(_)) => {
                let voter = store
                    .voter_by_contact(&contact_hmac)
                    .await?
                    .ok_or(Error::NotFound(Entity::Voter))?;
                (Status::Ok, voter)
            }
            Err(e) => return Err(e),
        },
    };

    cookies.add(AuthToken::new(&voter).into_cookie(config)?);
    Ok((status, Json(voter.into())))
}

#[get("/auth/profile")]
pub async fn profile(token: AuthToken<Voter>, store: &State<Store>) -> Result<Json<VoterProfile>> {
    let voter = store
        .voter(token.id)
        .await?
        .ok_or(Error::NotFound(Entity::Voter))?;
    Ok(Json(voter.into()))
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    credentials: Json<AdminCredentials>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
    store: &State<Store>,
) -> Result<()> {
    let admin: Admin = store
        .admin_by_username(&credentials.username)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::unauthorized("No admin found with the provided username and password combination.")
        })?;

    cookies.add(AuthToken::new(&admin).into_cookie(config)?);
    info!("Admin {} signed in", admin.username);
    Ok(())
}

#[post("/auth/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(AUTH_TOKEN_COOKIE);
    Status::Ok
}
