use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    db::voter::{AuthMethod, NewVoter, Profile, Voter},
    identity::Normalizer,
    store::{CredentialStore, StoreError},
};

/// Resolve a successful sign-in onto the single voter for its canonical
/// identity, creating that voter on first sign-in.
///
/// Writes at most once: the insert for a new voter, or a metadata update when
/// `method` has not been seen for this voter before. The vote latch and reset
/// token are never touched.
pub async fn resolve_on_sign_in(
    store: &dyn CredentialStore,
    normalizer: &Normalizer,
    method: AuthMethod,
    raw_email: &str,
    profile: Profile,
    now: DateTime<Utc>,
) -> Result<Voter> {
    let identity = normalizer.normalize(raw_email)?;

    if let Some(voter) = store.voter_by_identity(&identity).await? {
        return record_method(store, voter, method, raw_email, &profile, now).await;
    }

    let new_voter = NewVoter::new(raw_email, identity.clone(), profile.clone(), method, now);
    match store.insert_voter(new_voter).await {
        Ok(voter) => {
            info!("Created voter {} via {method}", voter.id);
            Ok(voter)
        }
        Err(StoreError::Duplicate(_)) => {
            // Someone else signed in as this person between our read and insert.
            info!("Lost first sign-in race for {identity}, using the existing voter");
            let voter = store
                .voter_by_identity(&identity)
                .await?
                .ok_or(Error::VoterNotFound)?;
            record_method(store, voter, method, raw_email, &profile, now).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Add `method` to an existing voter, refreshing their display fields in the
/// same write. A method already on record is a no-op.
async fn record_method(
    store: &dyn CredentialStore,
    mut voter: Voter,
    method: AuthMethod,
    raw_email: &str,
    profile: &Profile,
    now: DateTime<Utc>,
) -> Result<Voter> {
    if voter.auth_methods.contains(&method) {
        return Ok(voter);
    }

    let display_email = raw_email.trim().to_string();
    store
        .record_sign_in(voter.id, method, &display_email, profile, now)
        .await?;
    debug!("Linked {method} sign-in to voter {}", voter.id);

    voter.auth_methods.insert(method);
    voter.display_email = display_email;
    voter.display_name = profile.name.clone();
    if profile.avatar_url.is_some() {
        voter.avatar_url = profile.avatar_url.clone();
    }
    voter.updated_at = now;
    Ok(voter)
}
