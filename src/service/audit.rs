//! Offline integrity checks, run from the admin tool.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::error::Result;
use crate::model::{
    identity::{CanonicalIdentity, Normalizer},
    mongodb::Id,
    store::{CredentialStore, StoreError},
};

/// A candidate whose stored tally disagrees with the voter latches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyDrift {
    pub candidate_id: Id,
    pub name: String,
    pub stored: u64,
    pub latched: u64,
}

/// The outcome of comparing stored tallies against the votes recorded on
/// voters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TallyReport {
    /// Voters whose latch is set.
    pub voters_latched: u64,
    /// Latched voters whose choice names no existing candidate, or is missing.
    pub orphaned: Vec<Id>,
    pub drift: Vec<TallyDrift>,
    /// Whether the drifted tallies were overwritten.
    pub applied: bool,
}

impl TallyReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned.is_empty() && self.drift.is_empty()
    }
}

impl Display for TallyReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} voter(s) have voted", self.voters_latched)?;
        for drift in &self.drift {
            writeln!(
                f,
                "{} ({}): stored {} vote{}, latched {}",
                drift.name,
                drift.candidate_id,
                drift.stored,
                if drift.stored != 1 { "s" } else { "" },
                drift.latched
            )?;
        }
        for voter in &self.orphaned {
            writeln!(f, "voter {voter} voted for an unknown candidate")?;
        }
        if self.is_consistent() {
            write!(f, "tallies are consistent")
        } else if self.applied {
            write!(f, "tallies corrected")
        } else {
            write!(f, "tallies NOT corrected")
        }
    }
}

/// Recompute every candidate's tally from the voter latches and report any
/// drift. With `apply`, drifted tallies are overwritten with the recomputed
/// count.
pub async fn reconcile(store: &dyn CredentialStore, apply: bool) -> Result<TallyReport> {
    let candidates = store.candidates().await?;
    let voters = store.voters_who_voted().await?;

    let mut latched: HashMap<Id, u64> = candidates.iter().map(|c| (c.id, 0)).collect();
    let mut report = TallyReport {
        voters_latched: voters.len() as u64,
        ..Default::default()
    };
    for voter in &voters {
        match voter
            .voted_candidate_id
            .and_then(|id| latched.get_mut(&id))
        {
            Some(count) => *count += 1,
            None => report.orphaned.push(voter.id),
        }
    }

    for candidate in candidates {
        let count = latched.get(&candidate.id).copied().unwrap_or_default();
        if count != candidate.vote_count {
            warn!(
                "Tally drift for candidate {}: stored {}, latched {count}",
                candidate.id, candidate.vote_count
            );
            report.drift.push(TallyDrift {
                candidate_id: candidate.id,
                stored: candidate.vote_count,
                name: candidate.candidate.name,
                latched: count,
            });
        }
    }

    if apply {
        for drift in &report.drift {
            store
                .set_vote_count(drift.candidate_id, drift.latched)
                .await?;
            info!(
                "Corrected tally for candidate {} to {}",
                drift.candidate_id, drift.latched
            );
        }
        report.applied = true;
    }
    Ok(report)
}

/// What the canonical-identity backfill changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Voters whose key was (re)computed.
    pub updated: Vec<Id>,
    /// Voters whose key collided with an existing voter's and was suffixed
    /// with their own ID, pending manual review.
    pub collisions: Vec<Id>,
    /// Voters whose display email cannot be normalized at all.
    pub invalid: Vec<Id>,
}

/// Recompute every voter's canonical identity from their display email.
///
/// Needed for records that predate the identity key and after the domain
/// rule table changes. Earlier voters keep a contested key.
pub async fn renormalize_identities(
    store: &dyn CredentialStore,
    normalizer: &Normalizer,
) -> Result<BackfillReport> {
    let mut report = BackfillReport::default();

    for voter in store.voters().await? {
        let identity = match normalizer.normalize(&voter.display_email) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Cannot backfill voter {}: {e}", voter.id);
                report.invalid.push(voter.id);
                continue;
            }
        };
        if identity == voter.canonical_identity {
            continue;
        }

        match store.set_canonical_identity(voter.id, &identity).await {
            Ok(()) => report.updated.push(voter.id),
            Err(StoreError::Duplicate(_)) => {
                let suffixed = CanonicalIdentity::from_normalized(format!("{identity}#{}", voter.id));
                store.set_canonical_identity(voter.id, &suffixed).await?;
                warn!(
                    "Voter {} shares identity {identity} with an existing voter, stored as {suffixed}",
                    voter.id
                );
                report.collisions.push(voter.id);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(report)
}
