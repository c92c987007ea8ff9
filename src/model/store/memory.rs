//! In-memory store for tests.
//!
//! A single lock around all records gives every method the same atomicity the
//! MongoDB store gets from its unique index, conditional updates and
//! transactions.

use chrono::{DateTime, Utc};
use rocket::tokio::{self, sync::Mutex};

use crate::model::{
    db::{
        candidate::{Candidate, NewCandidate},
        voter::{AuthMethod, NewVoter, Profile, ResetToken, Voter},
    },
    identity::CanonicalIdentity,
    mongodb::Id,
};

use super::{CredentialStore, StoreError, StoreResult, VoteOutcome};

#[derive(Default)]
struct Records {
    voters: Vec<Voter>,
    candidates: Vec<Candidate>,
    writes: usize,
    rejected: usize,
}

impl Records {
    fn voter_mut(&mut self, id: Id) -> Option<&mut Voter> {
        self.voters.iter_mut().find(|voter| voter.id == id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
    interleave: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that yields to other tasks after every voter read, so that
    /// concurrent callers all read before any of them writes.
    pub fn interleaved() -> Self {
        Self {
            interleave: true,
            ..Self::default()
        }
    }

    async fn after_read(&self) {
        if self.interleave {
            tokio::task::yield_now().await;
        }
    }

    /// Number of conditional writes refused so far: inserts of a taken
    /// identity and votes against a set latch.
    pub async fn rejected(&self) -> usize {
        self.records.lock().await.rejected
    }

    /// Number of successful mutations so far.
    pub async fn writes(&self) -> usize {
        self.records.lock().await.writes
    }

    /// Number of voter records, regardless of state.
    pub async fn voter_count(&self) -> usize {
        self.records.lock().await.voters.len()
    }
}

#[rocket::async_trait]
impl CredentialStore for MemoryStore {
    async fn voter_by_identity(&self, identity: &CanonicalIdentity) -> StoreResult<Option<Voter>> {
        let found = self
            .records
            .lock()
            .await
            .voters
            .iter()
            .find(|voter| &voter.canonical_identity == identity)
            .cloned();
        self.after_read().await;
        Ok(found)
    }

    async fn voter_by_id(&self, id: Id) -> StoreResult<Option<Voter>> {
        let found = self
            .records
            .lock()
            .await
            .voters
            .iter()
            .find(|voter| voter.id == id)
            .cloned();
        self.after_read().await;
        Ok(found)
    }

    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
        let mut records = self.records.lock().await;
        if records
            .voters
            .iter()
            .any(|existing| existing.canonical_identity == voter.canonical_identity)
        {
            records.rejected += 1;
            return Err(StoreError::Duplicate(voter.canonical_identity));
        }
        let voter = Voter {
            id: Id::new(),
            voter,
        };
        records.voters.push(voter.clone());
        records.writes += 1;
        Ok(voter)
    }

    async fn record_sign_in(
        &self,
        id: Id,
        method: AuthMethod,
        display_email: &str,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut records = self.records.lock().await;
        if let Some(voter) = records.voter_mut(id) {
            voter.auth_methods.insert(method);
            voter.display_email = display_email.to_string();
            voter.display_name = profile.name.clone();
            if profile.avatar_url.is_some() {
                voter.avatar_url = profile.avatar_url.clone();
            }
            voter.updated_at = now;
            records.writes += 1;
        }
        Ok(())
    }

    async fn set_profile_url(&self, id: Id, url: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut records = self.records.lock().await;
        match records.voter_mut(id) {
            Some(voter) => {
                voter.profile_url = url.to_string();
                voter.updated_at = now;
                records.writes += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_reset_token(
        &self,
        id: Id,
        token: ResetToken,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut records = self.records.lock().await;
        if let Some(voter) = records.voter_mut(id) {
            voter.reset_token = Some(token);
            voter.updated_at = now;
            records.writes += 1;
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: String,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Voter>> {
        let mut records = self.records.lock().await;
        let holder = records.voters.iter_mut().find(|voter| {
            voter
                .reset_token
                .as_ref()
                .map_or(false, |token| token.hash == token_hash && token.is_live_at(now))
        });
        let consumed = holder.map(|voter| {
            voter.password_hash = Some(new_password_hash);
            voter.reset_token = None;
            voter.updated_at = now;
            voter.clone()
        });
        if consumed.is_some() {
            records.writes += 1;
        }
        Ok(consumed)
    }

    async fn discard_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut records = self.records.lock().await;
        let mut discarded = 0;
        for voter in records.voters.iter_mut() {
            if voter
                .reset_token
                .as_ref()
                .map_or(false, |token| token.hash == token_hash)
            {
                voter.reset_token = None;
                voter.updated_at = now;
                discarded += 1;
            }
        }
        records.writes += discarded;
        Ok(discarded > 0)
    }

    async fn candidate(&self, id: Id) -> StoreResult<Option<Candidate>> {
        let records = self.records.lock().await;
        Ok(records
            .candidates
            .iter()
            .find(|candidate| candidate.id == id)
            .cloned())
    }

    async fn candidates(&self) -> StoreResult<Vec<Candidate>> {
        Ok(self.records.lock().await.candidates.clone())
    }

    async fn insert_candidates(&self, candidates: Vec<NewCandidate>) -> StoreResult<Vec<Candidate>> {
        let mut records = self.records.lock().await;
        let inserted: Vec<Candidate> = candidates
            .into_iter()
            .map(|candidate| Candidate {
                id: Id::new(),
                candidate,
            })
            .collect();
        records.candidates.extend(inserted.iter().cloned());
        records.writes += inserted.len();
        Ok(inserted)
    }

    async fn set_vote_count(&self, id: Id, vote_count: u64) -> StoreResult<bool> {
        let mut records = self.records.lock().await;
        match records.candidates.iter_mut().find(|c| c.id == id) {
            Some(candidate) => {
                candidate.vote_count = vote_count;
                records.writes += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_vote(
        &self,
        voter_id: Id,
        candidate_id: Id,
        now: DateTime<Utc>,
    ) -> StoreResult<VoteOutcome> {
        let mut records = self.records.lock().await;
        let Records {
            voters,
            candidates,
            rejected,
            ..
        } = &mut *records;

        let voter = match voters.iter_mut().find(|voter| voter.id == voter_id) {
            Some(voter) => voter,
            None => return Ok(VoteOutcome::VoterNotFound),
        };
        if voter.has_voted {
            *rejected += 1;
            return Ok(VoteOutcome::AlreadyVoted);
        }
        let candidate = match candidates.iter_mut().find(|c| c.id == candidate_id) {
            Some(candidate) => candidate,
            None => return Ok(VoteOutcome::UnknownCandidate),
        };

        voter.has_voted = true;
        voter.voted_candidate_id = Some(candidate_id);
        voter.voted_at = Some(now);
        voter.updated_at = now;
        candidate.vote_count += 1;
        records.writes += 2;
        Ok(VoteOutcome::Recorded)
    }

    async fn voters_who_voted(&self) -> StoreResult<Vec<Voter>> {
        let records = self.records.lock().await;
        let mut voted: Vec<Voter> = records
            .voters
            .iter()
            .filter(|voter| voter.has_voted)
            .cloned()
            .collect();
        voted.sort_by_key(|voter| voter.voted_at);
        Ok(voted)
    }

    async fn voters(&self) -> StoreResult<Vec<Voter>> {
        Ok(self.records.lock().await.voters.clone())
    }

    async fn set_canonical_identity(
        &self,
        id: Id,
        identity: &CanonicalIdentity,
    ) -> StoreResult<()> {
        let mut records = self.records.lock().await;
        if records
            .voters
            .iter()
            .any(|voter| voter.id != id && &voter.canonical_identity == identity)
        {
            return Err(StoreError::Duplicate(identity.clone()));
        }
        if let Some(voter) = records.voter_mut(id) {
            voter.canonical_identity = identity.clone();
            records.writes += 1;
        }
        Ok(())
    }
}
