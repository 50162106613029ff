use mongodb::bson::oid::Error as OidError;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            election::{ElectionDescription, ElectionResults, ElectionSpec, StatusUpdate},
        },
        db::admin::Admin,
        mongodb::Id,
    },
    service::QueryService,
    store::Store,
};

use super::path_id;

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        get_election,
        get_results,
        create_election,
        set_status
    ]
}

/// Active elections, newest first.
#[get("/elections")]
async fn list_elections(query: &State<QueryService>) -> Result<Json<Vec<ElectionDescription>>> {
    let elections = query.list_active().await?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[get("/elections/<id>")]
async fn get_election(
    id: std::result::Result<Id, OidError>,
    query: &State<QueryService>,
) -> Result<Json<ElectionDescription>> {
    let election = query.election(path_id(id)?).await?;
    Ok(Json(election.into()))
}

#[get("/elections/<id>/results")]
async fn get_results(
    id: std::result::Result<Id, OidError>,
    query: &State<QueryService>,
) -> Result<Json<ElectionResults>> {
    Ok(Json(query.results(path_id(id)?).await?))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    store: &State<Store>,
) -> Result<(Status, Json<ElectionDescription>)> {
    let election = spec.into_inner().into_election(token.id)?;
    let election = store.insert_election(election).await?;
    info!(
        "Admin {} created election {} ({})",
        token.id, election.id, election.title
    );
    Ok((Status::Created, Json(election.into())))
}

#[put("/elections/<id>/status", data = "<update>", format = "json")]
async fn set_status(
    token: AuthToken<Admin>,
    id: std::result::Result<Id, OidError>,
    update: Json<StatusUpdate>,
    store: &State<Store>,
) -> Result<Json<ElectionDescription>> {
    let election = store
        .set_election_status(path_id(id)?, update.status)
        .await?;
    info!(
        "Admin {} set election {} to {}",
        token.id, election.id, election.status
    );
    Ok(Json(election.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::{Client, LocalResponse},
        serde::json::{serde_json::json, Value},
    };

    use crate::model::{
        common::election::{ElectionKind, ElectionStatus},
        db::election::ElectionCore,
    };

    use super::*;

    async fn create(client: &Client, spec: &ElectionSpec) -> ElectionDescription {
        let response = client
            .post("/api/elections")
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        response.into_json().await.unwrap()
    }

    #[backend_test(admin)]
    async fn create_and_fetch(client: Client) {
        let created = create(&client, &ElectionSpec::example()).await;
        assert_eq!(created.status, ElectionStatus::Active);
        assert_eq!(created.kind, ElectionKind::Election);
        assert_eq!(created.total_votes, 0);
        assert_eq!(created.candidates.len(), 2);

        let response = client
            .get(format!("/api/elections/{}", created.id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let fetched: ElectionDescription = response.into_json().await.unwrap();
        assert_eq!(created, fetched);
    }

    #[backend_test(admin)]
    async fn create_rejects_invalid_spec(client: Client) {
        let response = client
            .post("/api/elections")
            .header(ContentType::JSON)
            .body(
                json!({
                    "title": "Empty",
                    "description": "No candidates",
                    "category": "Test",
                    "candidates": [],
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "validation");
    }

    #[backend_test]
    async fn create_requires_admin(client: Client) {
        let response = client
            .post("/api/elections")
            .header(ContentType::JSON)
            .body(json!(ElectionSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn list_only_active(client: Client) {
        let first = create(&client, &ElectionSpec::example()).await;
        create(&client, &ElectionSpec::upcoming_example()).await;
        let second = create(&client, &ElectionSpec::example()).await;

        let response = client.get("/api/elections").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<ElectionDescription> = response.into_json().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|e| e.id).collect();
        assert_eq!(ids, [second.id, first.id]);
    }

    #[backend_test]
    async fn unknown_and_malformed_ids(client: Client) {
        let response = client
            .get(format!("/api/elections/{}", Id::new()))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "Election not found");

        let response = client.get("/api/elections/not-an-id").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test]
    async fn results_are_public(client: Client, store: Store) {
        let election = store
            .insert_election(ElectionCore::example_with(
                ElectionStatus::Closed,
                &[("A", 30), ("B", 20), ("C", 0)],
            ))
            .await
            .unwrap();

        let response = client
            .get(format!("/api/elections/{}/results", election.id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let results: Value = response.into_json().await.unwrap();
        assert_eq!(results["election"]["totalVotes"], 50);
        assert_eq!(results["results"][0]["name"], "A");
        assert_eq!(results["results"][0]["percentage"], 60.0);
        assert_eq!(results["results"][1]["percentage"], 40.0);
        assert_eq!(results["results"][2]["percentage"], 0.0);
    }

    async fn set_to<'c>(client: &'c Client, path: &str, status: &str) -> LocalResponse<'c> {
        client
            .put(path.to_string())
            .header(ContentType::JSON)
            .body(json!({ "status": status }).to_string())
            .dispatch()
            .await
    }

    #[backend_test(admin)]
    async fn status_lifecycle(client: Client) {
        let election = create(&client, &ElectionSpec::upcoming_example()).await;
        let path = format!("/api/elections/{}/status", election.id);

        let response = set_to(&client, &path, "active").await;
        assert_eq!(Status::Ok, response.status());
        let updated: ElectionDescription = response.into_json().await.unwrap();
        assert_eq!(updated.status, ElectionStatus::Active);

        assert_eq!(Status::BadRequest, set_to(&client, &path, "upcoming").await.status());
        assert_eq!(Status::Ok, set_to(&client, &path, "closed").await.status());
        assert_eq!(Status::BadRequest, set_to(&client, &path, "active").await.status());
        assert_eq!(Status::UnprocessableEntity, set_to(&client, &path, "paused").await.status());
    }
}
