use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    api::voter::VoteReceipt,
    mongodb::Id,
    store::{CredentialStore, VoteOutcome},
};

/// Cast the voter's one and only vote.
///
/// Eligibility is checked against a fresh read of the voter, never a session
/// copy. The read is only advisory: the store's conditional latch is what
/// decides a race between two concurrent calls, and the loser gets
/// [`Error::AlreadyVoted`] with the tallies untouched.
pub async fn cast_vote(
    store: &dyn CredentialStore,
    voter_id: Id,
    candidate_id: Id,
    now: DateTime<Utc>,
) -> Result<VoteReceipt> {
    let voter = store
        .voter_by_id(voter_id)
        .await?
        .ok_or(Error::VoterNotFound)?;
    if voter.has_voted {
        warn!("Rejected second vote from voter {voter_id}");
        return Err(Error::AlreadyVoted);
    }
    if !voter.has_profile() {
        return Err(Error::ProfileRequired);
    }

    let candidate = store
        .candidate(candidate_id)
        .await?
        .ok_or(Error::UnknownCandidate(candidate_id))?;

    match store.record_vote(voter_id, candidate_id, now).await? {
        VoteOutcome::Recorded => {
            info!("Recorded vote from voter {voter_id}");
            Ok(VoteReceipt {
                voter_id: voter_id.into(),
                candidate_id: candidate_id.into(),
                candidate_name: candidate.candidate.name,
                recorded_at: now,
            })
        }
        VoteOutcome::AlreadyVoted => {
            warn!("Rejected concurrent duplicate vote from voter {voter_id}");
            Err(Error::AlreadyVoted)
        }
        VoteOutcome::UnknownCandidate => Err(Error::UnknownCandidate(candidate_id)),
        VoteOutcome::VoterNotFound => Err(Error::VoterNotFound),
    }
}
