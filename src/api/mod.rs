use mongodb::bson::oid::Error as OidError;
use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::{Error, ErrorBody, Result};
use crate::model::mongodb::Id;

pub mod auth;
pub mod elections;
pub mod live;
pub mod votes;

/// Every route, to be mounted under `/api`.
pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(elections::routes());
    routes.extend(votes::routes());
    routes.extend(live::routes());
    routes
}

/// Catchers that give framework-level failures the same JSON shape as
/// handler errors.
pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        not_found,
        unprocessable,
        internal,
        fallback
    ]
}

/// Reject malformed IDs in paths as invalid input rather than as a missing route.
fn path_id(id: std::result::Result<Id, OidError>) -> Result<Id> {
    id.map_err(|e| Error::validation(format!("Malformed ID: {e}")))
}

#[catch(400)]
fn bad_request() -> Json<ErrorBody> {
    Json(ErrorBody::new("validation", "Malformed request"))
}

#[catch(401)]
fn unauthorized() -> Json<ErrorBody> {
    Json(ErrorBody::new("unauthorized", "Authentication required"))
}

#[catch(404)]
fn not_found(req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new(
        "not_found",
        format!("No route for {} {}", req.method(), req.uri()),
    ))
}

#[catch(422)]
fn unprocessable() -> Json<ErrorBody> {
    Json(ErrorBody::new("validation", "Request body could not be understood"))
}

#[catch(500)]
fn internal() -> Json<ErrorBody> {
    Json(ErrorBody::new("internal", "Internal server error"))
}

#[catch(default)]
fn fallback(status: Status, _req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new(
        "internal",
        status.reason().unwrap_or("Unknown error"),
    ))
}
