//! The credential store: the only shared mutable state in the system.
//!
//! Every method is a single atomic operation against the backing store. The
//! guarantees the services rely on are:
//!
//! - at most one voter per canonical identity ([`StoreError::Duplicate`]);
//! - [`CredentialStore::record_vote`] latches the voter and bumps the tally
//!   together or not at all, and only while the voter has not yet voted;
//! - [`CredentialStore::consume_reset_token`] succeeds at most once per token.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::error::Error as DbError;
use thiserror::Error;

use crate::model::{
    db::{
        candidate::{Candidate, NewCandidate},
        voter::{AuthMethod, NewVoter, Profile, ResetToken, Voter},
    },
    identity::CanonicalIdentity,
    mongodb::Id,
};

#[cfg(test)]
pub mod memory;
pub mod mongo;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("a voter with canonical identity '{0}' already exists")]
    Duplicate(CanonicalIdentity),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Outcome of the conditional ballot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The latch was set and the tally incremented.
    Recorded,
    /// The voter's latch was already set; nothing changed.
    AlreadyVoted,
    /// No such candidate; nothing changed.
    UnknownCandidate,
    /// No such voter; nothing changed.
    VoterNotFound,
}

/// Shared handle on the store, as kept in managed state.
pub type Store = Arc<dyn CredentialStore>;

#[rocket::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn voter_by_identity(&self, identity: &CanonicalIdentity) -> StoreResult<Option<Voter>>;

    async fn voter_by_id(&self, id: Id) -> StoreResult<Option<Voter>>;

    /// Insert a new voter, failing with [`StoreError::Duplicate`] if its
    /// canonical identity is taken.
    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter>;

    /// Add `method` to the voter's auth methods and refresh their display
    /// fields. Never touches the vote latch or reset token.
    async fn record_sign_in(
        &self,
        id: Id,
        method: AuthMethod,
        display_email: &str,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Returns false if no such voter exists.
    async fn set_profile_url(&self, id: Id, url: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Open (or replace) the voter's reset window.
    async fn set_reset_token(&self, id: Id, token: ResetToken, now: DateTime<Utc>)
        -> StoreResult<()>;

    /// Atomically find the voter holding a live token with this hash, replace
    /// their password hash, and clear the token.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: String,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Voter>>;

    /// Clear any token with this hash, live or not. Returns true if one was found.
    async fn discard_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    async fn candidate(&self, id: Id) -> StoreResult<Option<Candidate>>;

    async fn candidates(&self) -> StoreResult<Vec<Candidate>>;

    async fn insert_candidates(&self, candidates: Vec<NewCandidate>) -> StoreResult<Vec<Candidate>>;

    /// Overwrite a candidate's tally. Only used by reconciliation.
    async fn set_vote_count(&self, id: Id, vote_count: u64) -> StoreResult<bool>;

    /// Latch the voter onto `candidate_id` and increment that candidate's
    /// tally, as one atomic unit, provided the voter has not already voted.
    async fn record_vote(
        &self,
        voter_id: Id,
        candidate_id: Id,
        now: DateTime<Utc>,
    ) -> StoreResult<VoteOutcome>;

    /// All voters whose latch is set, oldest vote first.
    async fn voters_who_voted(&self) -> StoreResult<Vec<Voter>>;

    /// All voters, in insertion order.
    async fn voters(&self) -> StoreResult<Vec<Voter>>;

    /// Overwrite a voter's canonical identity. Only used by the backfill.
    async fn set_canonical_identity(&self, id: Id, identity: &CanonicalIdentity)
        -> StoreResult<()>;
}
