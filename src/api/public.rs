use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::results::CandidateDesc,
    store::{CredentialStore, Store},
};

pub fn routes() -> Vec<Route> {
    routes![candidates]
}

/// The ballot. Tallies are only revealed through the results.
#[get("/candidates")]
pub async fn candidates(store: &State<Store>) -> Result<Json<Vec<CandidateDesc>>> {
    let candidates = store.candidates().await?;
    Ok(Json(candidates.into_iter().map(CandidateDesc::from).collect()))
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use super::*;

    use crate::model::db::candidate::NewCandidate;

    #[rocket::async_test]
    async fn lists_candidates_without_tallies() {
        let (client, store, _) = crate::memory_client().await;
        let inserted = store
            .insert_candidates(vec![NewCandidate::example1(), NewCandidate::example2()])
            .await
            .unwrap();
        store.set_vote_count(inserted[0].id, 3).await.unwrap();

        let response = client.get(uri!(candidates)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        assert!(!body.contains("vote_count"));

        let listed: Vec<CandidateDesc> =
            rocket::serde::json::serde_json::from_str(&body).unwrap();
        assert_eq!(
            listed,
            inserted
                .into_iter()
                .map(CandidateDesc::from)
                .collect::<Vec<_>>()
        );
    }

    #[rocket::async_test]
    async fn empty_ballot() {
        let (client, _, _) = crate::memory_client().await;
        let response = client.get(uri!(candidates)).dispatch().await;
        let listed: Vec<CandidateDesc> = response.into_json().await.unwrap();
        assert!(listed.is_empty());
    }
}
