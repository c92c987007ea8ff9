use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    api::session::SessionView, identity::CanonicalIdentity, mongodb::Id, store::CredentialStore,
};

/// Profile links must point here.
pub const REQUIRED_PROFILE_DOMAIN: &str = "linkedin.com";

/// Project the latest persisted state of the voter behind a session.
///
/// Called on every session materialization, so nothing that can change
/// (least of all `has_voted`) is ever served from the session token itself.
pub async fn enrich_session(
    store: &dyn CredentialStore,
    identity: &CanonicalIdentity,
) -> Result<SessionView> {
    let voter = store
        .voter_by_identity(identity)
        .await?
        .ok_or(Error::VoterNotFound)?;
    Ok(SessionView::from(&voter))
}

/// Record the voter's professional profile link.
pub async fn set_profile_url(
    store: &dyn CredentialStore,
    voter_id: Id,
    url: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let url = url.trim();
    if !url.contains(REQUIRED_PROFILE_DOMAIN) {
        return Err(Error::InvalidProfileUrl(REQUIRED_PROFILE_DOMAIN));
    }
    if store.set_profile_url(voter_id, url, now).await? {
        Ok(())
    } else {
        Err(Error::VoterNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{
        db::{candidate::NewCandidate, voter::NewVoter},
        identity::normalize,
        store::memory::MemoryStore,
    };
    use crate::service::ballot_box::cast_vote;

    #[rocket::async_test]
    async fn view_reflects_latest_state() {
        let store = MemoryStore::new();
        let voter = store.insert_voter(NewVoter::example()).await.unwrap();
        let candidate = store
            .insert_candidates(vec![NewCandidate::example1()])
            .await
            .unwrap()
            .remove(0);

        let before = enrich_session(&store, &voter.canonical_identity)
            .await
            .unwrap();
        assert_eq!(*before.voter_id, voter.id);
        assert!(!before.has_voted);
        assert_eq!(before.profile_url, "");

        set_profile_url(
            &store,
            voter.id,
            " https://www.linkedin.com/in/jdoe ",
            Utc::now(),
        )
        .await
        .unwrap();
        cast_vote(&store, voter.id, candidate.id, Utc::now())
            .await
            .unwrap();

        let after = enrich_session(&store, &voter.canonical_identity)
            .await
            .unwrap();
        assert!(after.has_voted);
        assert_eq!(after.profile_url, "https://www.linkedin.com/in/jdoe");
        assert_eq!(after.voter_id, before.voter_id);
    }

    #[rocket::async_test]
    async fn unknown_identity() {
        let store = MemoryStore::new();
        let result = enrich_session(&store, &normalize("ghost@nowhere.com").unwrap()).await;
        assert!(matches!(result, Err(Error::VoterNotFound)));
    }

    #[rocket::async_test]
    async fn profile_url_must_be_linkedin() {
        let store = MemoryStore::new();
        let voter = store.insert_voter(NewVoter::example()).await.unwrap();

        let result = set_profile_url(&store, voter.id, "https://example.com/jdoe", Utc::now()).await;
        assert!(matches!(result, Err(Error::InvalidProfileUrl(REQUIRED_PROFILE_DOMAIN))));
        assert_eq!(store.writes().await, 1);

        let result = set_profile_url(
            &store,
            Id::new(),
            "https://linkedin.com/in/ghost",
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(Error::VoterNotFound)));
    }
}
