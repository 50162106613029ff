use mongodb::bson::oid::Error as OidError;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::Result,
    logging::RequestId,
    model::{
        api::{
            auth::AuthToken,
            vote::{CastRequest, CastResponse, VoteCheck, VoterVote},
        },
        db::{ledger::ClientMeta, voter::Voter},
        mongodb::Id,
    },
    service::{QueryService, VoteService},
};

use super::path_id;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, my_votes, check_vote]
}

#[post("/votes", data = "<vote>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    vote: Json<CastRequest>,
    meta: ClientMeta,
    votes: &State<VoteService>,
    request_id: &RequestId,
) -> Result<(Status, Json<CastResponse>)> {
    let entry = votes
        .cast_vote(
            token.id,
            vote.election_id.into(),
            vote.candidate_id.into(),
            meta,
        )
        .await?;
    debug!("{request_id} ledger entry {}", entry.id);
    Ok((Status::Created, Json(entry.into())))
}

#[get("/votes/my-votes")]
async fn my_votes(
    token: AuthToken<Voter>,
    query: &State<QueryService>,
) -> Result<Json<Vec<VoterVote>>> {
    Ok(Json(query.voter_votes(token.id).await?))
}

#[get("/votes/check/<election_id>")]
async fn check_vote(
    token: AuthToken<Voter>,
    election_id: std::result::Result<Id, OidError>,
    query: &State<QueryService>,
) -> Result<Json<VoteCheck>> {
    Ok(Json(
        query.vote_check(token.id, path_id(election_id)?).await?,
    ))
}
