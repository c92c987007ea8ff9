use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

use crate::model::{
    db::{
        candidate::{Candidate, NewCandidate},
        voter::{AuthMethod, NewVoter, Profile, ResetToken, Voter},
    },
    identity::CanonicalIdentity,
    mongodb::{
        is_duplicate_key_error, is_transient_transaction_error, is_unknown_commit_result, Coll, Id,
    },
};

use super::{CredentialStore, StoreError, StoreResult, VoteOutcome};

/// How many times a vote transaction is attempted before giving up.
const MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// A [`CredentialStore`] backed by MongoDB.
///
/// Vote recording uses a multi-document transaction, so the deployment must be
/// a replica set (a single-node one is fine).
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    voters: Coll<Voter>,
    new_voters: Coll<NewVoter>,
    candidates: Coll<Candidate>,
    new_candidates: Coll<NewCandidate>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            voters: Coll::from_db(db),
            new_voters: Coll::from_db(db),
            candidates: Coll::from_db(db),
            new_candidates: Coll::from_db(db),
        }
    }

    /// One attempt at the vote transaction. Aborts (and so rolls back the
    /// latch) on every path that does not return `Recorded`.
    async fn try_record_vote(
        &self,
        session: &mut ClientSession,
        voter_id: Id,
        candidate_id: Id,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome, mongodb::error::Error> {
        session.start_transaction(None).await?;

        // Conditional latch: only matches while the voter has not voted.
        let latch_filter = doc! {
            "_id": voter_id,
            "has_voted": false,
        };
        let latch = doc! {
            "$set": {
                "has_voted": true,
                "voted_candidate_id": candidate_id,
                "voted_at": BsonDateTime::from_chrono(now),
                "updated_at": BsonDateTime::from_chrono(now),
            }
        };
        let latched = self
            .voters
            .update_one_with_session(latch_filter, latch, None, session)
            .await?;
        if latched.matched_count == 0 {
            session.abort_transaction().await?;
            let exists = self
                .voters
                .find_one(voter_id.as_doc(), None)
                .await?
                .is_some();
            return Ok(if exists {
                VoteOutcome::AlreadyVoted
            } else {
                VoteOutcome::VoterNotFound
            });
        }

        let increment = doc! {
            "$inc": { "vote_count": 1_i64 }
        };
        let tallied = self
            .candidates
            .update_one_with_session(candidate_id.as_doc(), increment, None, session)
            .await?;
        if tallied.matched_count == 0 {
            session.abort_transaction().await?;
            return Ok(VoteOutcome::UnknownCandidate);
        }

        // Retry the commit alone while its result is unknown.
        let mut commits = 1;
        loop {
            match session.commit_transaction().await {
                Ok(()) => return Ok(VoteOutcome::Recorded),
                Err(e) if is_unknown_commit_result(&e) && commits < MAX_TRANSACTION_ATTEMPTS => {
                    warn!("Vote commit result unknown for voter {voter_id}, retrying commit");
                    commits += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[rocket::async_trait]
impl CredentialStore for MongoStore {
    async fn voter_by_identity(&self, identity: &CanonicalIdentity) -> StoreResult<Option<Voter>> {
        let filter = doc! { "canonical_identity": identity };
        Ok(self.voters.find_one(filter, None).await?)
    }

    async fn voter_by_id(&self, id: Id) -> StoreResult<Option<Voter>> {
        Ok(self.voters.find_one(id.as_doc(), None).await?)
    }

    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
        let id: Id = match self.new_voters.insert_one(&voter, None).await {
            Ok(result) => result
                .inserted_id
                .as_object_id()
                .unwrap() // Valid because the ID comes directly from the DB
                .into(),
            Err(e) if is_duplicate_key_error(&e) => {
                return Err(StoreError::Duplicate(voter.canonical_identity))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Voter { id, voter })
    }

    async fn record_sign_in(
        &self,
        id: Id,
        method: AuthMethod,
        display_email: &str,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut set = doc! {
            "display_email": display_email,
            "display_name": profile.name.as_str(),
            "updated_at": BsonDateTime::from_chrono(now),
        };
        if let Some(ref avatar_url) = profile.avatar_url {
            set.insert("avatar_url", avatar_url.as_str());
        }
        let update = doc! {
            "$addToSet": { "auth_methods": method },
            "$set": set,
        };
        self.voters.update_one(id.as_doc(), update, None).await?;
        Ok(())
    }

    async fn set_profile_url(&self, id: Id, url: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let update = doc! {
            "$set": {
                "profile_url": url,
                "updated_at": BsonDateTime::from_chrono(now),
            }
        };
        let result = self.voters.update_one(id.as_doc(), update, None).await?;
        Ok(result.matched_count == 1)
    }

    async fn set_reset_token(
        &self,
        id: Id,
        token: ResetToken,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let update = doc! {
            "$set": {
                "reset_token": {
                    "hash": token.hash,
                    "expires_at": BsonDateTime::from_chrono(token.expires_at),
                },
                "updated_at": BsonDateTime::from_chrono(now),
            }
        };
        self.voters.update_one(id.as_doc(), update, None).await?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: String,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Voter>> {
        let filter = doc! {
            "reset_token.hash": token_hash,
            "reset_token.expires_at": { "$gt": BsonDateTime::from_chrono(now) },
        };
        let update = doc! {
            "$set": {
                "password_hash": new_password_hash,
                "updated_at": BsonDateTime::from_chrono(now),
            },
            "$unset": { "reset_token": "" },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .voters
            .find_one_and_update(filter, update, options)
            .await?)
    }

    async fn discard_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let filter = doc! { "reset_token.hash": token_hash };
        let update = doc! {
            "$set": { "updated_at": BsonDateTime::from_chrono(now) },
            "$unset": { "reset_token": "" },
        };
        let result = self.voters.update_many(filter, update, None).await?;
        Ok(result.modified_count > 0)
    }

    async fn candidate(&self, id: Id) -> StoreResult<Option<Candidate>> {
        Ok(self.candidates.find_one(id.as_doc(), None).await?)
    }

    async fn candidates(&self) -> StoreResult<Vec<Candidate>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let candidates = self
            .candidates
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn insert_candidates(&self, candidates: Vec<NewCandidate>) -> StoreResult<Vec<Candidate>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let result = self.new_candidates.insert_many(&candidates, None).await?;
        let inserted = candidates
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| Candidate {
                // Valid because `insert_many` reports an ID for every index.
                id: result.inserted_ids[&i].as_object_id().unwrap().into(),
                candidate,
            })
            .collect();
        Ok(inserted)
    }

    async fn set_vote_count(&self, id: Id, vote_count: u64) -> StoreResult<bool> {
        let update = doc! {
            "$set": { "vote_count": i64::try_from(vote_count).unwrap_or(i64::MAX) }
        };
        let result = self.candidates.update_one(id.as_doc(), update, None).await?;
        Ok(result.matched_count == 1)
    }

    async fn record_vote(
        &self,
        voter_id: Id,
        candidate_id: Id,
        now: DateTime<Utc>,
    ) -> StoreResult<VoteOutcome> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            match self
                .try_record_vote(&mut session, voter_id, candidate_id, now)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(e) if is_transient_transaction_error(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    // Typically a write conflict with a concurrent vote by the
                    // same voter; the retry will observe their latch.
                    debug!("Transient error recording vote for voter {voter_id} (attempt {attempt}): {e}");
                    let _ = session.abort_transaction().await;
                    attempt += 1;
                }
                Err(e) => {
                    let _ = session.abort_transaction().await;
                    return Err(e.into());
                }
            }
        }
    }

    async fn voters_who_voted(&self) -> StoreResult<Vec<Voter>> {
        let options = FindOptions::builder().sort(doc! { "voted_at": 1, "_id": 1 }).build();
        let voters = self
            .voters
            .find(doc! { "has_voted": true }, options)
            .await?
            .try_collect()
            .await?;
        Ok(voters)
    }

    async fn voters(&self) -> StoreResult<Vec<Voter>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let voters = self.voters.find(None, options).await?.try_collect().await?;
        Ok(voters)
    }

    async fn set_canonical_identity(
        &self,
        id: Id,
        identity: &CanonicalIdentity,
    ) -> StoreResult<()> {
        let update = doc! {
            "$set": { "canonical_identity": identity }
        };
        match self.voters.update_one(id.as_doc(), update, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => Err(StoreError::Duplicate(identity.clone())),
            Err(e) => Err(e.into()),
        }
    }
}
