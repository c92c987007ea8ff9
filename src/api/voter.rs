use chrono::Utc;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        results::Results,
        session::SessionView,
        voter::{ProfileUpdate, VoteReceipt, VoteRequest},
    },
    store::{CredentialStore, Store},
};
use crate::service::{ballot_box::cast_vote, session::set_profile_url};

pub fn routes() -> Vec<Route> {
    routes![update_profile, vote, results]
}

#[put("/voter/profile", data = "<update>", format = "json")]
pub async fn update_profile(
    session: SessionView,
    update: Json<ProfileUpdate>,
    store: &State<Store>,
) -> Result<Status> {
    set_profile_url(
        store.inner().as_ref(),
        *session.voter_id,
        &update.profile_url,
        Utc::now(),
    )
    .await?;
    Ok(Status::Ok)
}

#[post("/voter/vote", data = "<vote>", format = "json")]
pub async fn vote(
    session: SessionView,
    vote: Json<VoteRequest>,
    store: &State<Store>,
) -> Result<Json<VoteReceipt>> {
    let receipt = cast_vote(
        store.inner().as_ref(),
        *session.voter_id,
        *vote.candidate_id,
        Utc::now(),
    )
    .await?;
    Ok(Json(receipt))
}

/// The tallies and who has voted, shown only to voters who have voted.
#[get("/results")]
pub async fn results(session: SessionView, store: &State<Store>) -> Result<Json<Results>> {
    if !session.has_voted {
        return Err(Error::NotYetVoted);
    }
    let candidates = store.candidates().await?;
    let voters = store.voters_who_voted().await?;
    Ok(Json(Results::tally(candidates, &voters)))
}

#[cfg(test)]
mod tests {
    use rocket::{http::ContentType, local::asynchronous::Client, serde::json::serde_json::json};

    use super::*;

    use crate::model::{
        api::{auth::RegisterRequest, id::ApiId},
        db::candidate::{Candidate, NewCandidate},
        mongodb::{Coll, Id},
    };

    const PROFILE: &str = "https://www.linkedin.com/in/jdoe";

    /// Register the example voter and seed two candidates.
    async fn signed_in(client: &Client, store: &dyn CredentialStore) -> Vec<Candidate> {
        client
            .post(uri!(crate::api::auth::register))
            .header(ContentType::JSON)
            .body(json!(RegisterRequest::example()).to_string())
            .dispatch()
            .await;
        store
            .insert_candidates(vec![NewCandidate::example1(), NewCandidate::example2()])
            .await
            .unwrap()
    }

    async fn put_profile(client: &Client, url: &str) -> Status {
        client
            .put(uri!(update_profile))
            .header(ContentType::JSON)
            .body(json!(ProfileUpdate { profile_url: url.into() }).to_string())
            .dispatch()
            .await
            .status()
    }

    async fn post_vote(client: &Client, candidate: &Candidate) -> Status {
        client
            .post(uri!(vote))
            .header(ContentType::JSON)
            .body(json!({ "candidate_id": ApiId::from(candidate.id) }).to_string())
            .dispatch()
            .await
            .status()
    }

    #[rocket::async_test]
    async fn signed_out_voters_are_turned_away() {
        let (client, store, _) = crate::memory_client().await;
        let candidates = store
            .insert_candidates(vec![NewCandidate::example1()])
            .await
            .unwrap();

        assert_eq!(put_profile(&client, PROFILE).await, Status::Unauthorized);
        assert_eq!(post_vote(&client, &candidates[0]).await, Status::Unauthorized);
        let response = client.get(uri!(results)).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn profile_then_vote_then_results() {
        let (client, store, _) = crate::memory_client().await;
        let candidates = signed_in(&client, &*store).await;

        // Profile first.
        assert_eq!(post_vote(&client, &candidates[0]).await, Status::BadRequest);
        assert_eq!(
            put_profile(&client, "https://example.com/jdoe").await,
            Status::BadRequest
        );
        assert_eq!(put_profile(&client, PROFILE).await, Status::Ok);

        // Results are hidden until the voter has voted.
        let response = client.get(uri!(results)).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .post(uri!(vote))
            .header(ContentType::JSON)
            .body(json!({ "candidate_id": ApiId::from(candidates[1].id) }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let receipt: VoteReceipt = response.into_json().await.unwrap();
        assert_eq!(receipt.candidate_name, "Grace Hopper");

        // The session cookie is unchanged, but the fresh read sees the vote.
        assert_eq!(post_vote(&client, &candidates[0]).await, Status::Conflict);

        let response = client.get(uri!(results)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let results: Results = response.into_json().await.unwrap();
        assert_eq!(results.total_votes, 1);
        assert_eq!(results.leader.unwrap().name, "Grace Hopper");
        assert_eq!(results.voters.len(), 1);
        assert_eq!(results.voters[0].profile_url, PROFILE);
    }

    #[rocket::async_test]
    async fn unknown_candidate_is_not_found() {
        let (client, store, _) = crate::memory_client().await;
        let mut candidates = signed_in(&client, &*store).await;
        put_profile(&client, PROFILE).await;

        candidates[0].id = Id::new();
        assert_eq!(post_vote(&client, &candidates[0]).await, Status::NotFound);
        let total: u64 = store
            .candidates()
            .await
            .unwrap()
            .iter()
            .map(|c| c.vote_count)
            .sum();
        assert_eq!(total, 0);
    }

    #[backend_test(voter)]
    async fn vote_against_mongodb(client: Client, candidates: Coll<NewCandidate>) {
        let inserted = candidates
            .insert_one(NewCandidate::example1(), None)
            .await
            .unwrap();
        let candidate_id: Id = inserted
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        put_profile(&client, PROFILE).await;

        let cast = |id: Id| {
            client
                .post(uri!(vote))
                .header(ContentType::JSON)
                .body(json!({ "candidate_id": ApiId::from(id) }).to_string())
                .dispatch()
        };
        assert_eq!(cast(candidate_id).await.status(), Status::Ok);
        assert_eq!(cast(candidate_id).await.status(), Status::Conflict);

        let response = client.get(uri!(results)).dispatch().await;
        let results: Results = response.into_json().await.unwrap();
        assert_eq!(results.total_votes, 1);
    }
}
