use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{api::auth::AuthToken, api::id::ApiId, db::voter::Voter, store::Store};
use crate::service::session::enrich_session;

/// The per-request view of a signed-in voter, always projected from the
/// freshly read voter record rather than from the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub voter_id: ApiId,
    pub has_voted: bool,
    pub profile_url: String,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<&Voter> for SessionView {
    fn from(voter: &Voter) -> Self {
        Self {
            voter_id: voter.id.into(),
            has_voted: voter.has_voted,
            profile_url: voter.profile_url.clone(),
            email: voter.display_email.clone(),
            name: voter.display_name.clone(),
            avatar_url: voter.avatar_url.clone(),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionView {
    type Error = Error;

    /// Materialize the session: decode the cookie, then re-read the voter.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = match req.guard::<AuthToken>().await {
            Outcome::Success(token) => token,
            Outcome::Failure(failure) => return Outcome::Failure(failure),
            Outcome::Forward(()) => {
                return Outcome::Failure((Status::Unauthorized, Error::Unauthenticated))
            }
        };

        // Unwrap is safe as the store is always managed.
        let store = req.guard::<&State<Store>>().await.unwrap();

        match enrich_session(store.inner().as_ref(), &token.identity).await {
            Ok(view) => Outcome::Success(view),
            // The account behind a valid cookie is gone: treat as signed out.
            Err(Error::VoterNotFound) => {
                Outcome::Failure((Status::Unauthorized, Error::Unauthenticated))
            }
            Err(e) => Outcome::Failure((e.status(), e)),
        }
    }
}
