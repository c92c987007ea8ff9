use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::{candidate::Candidate, voter::Voter},
};

/// A candidate as shown on the ballot; tallies are not included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDesc {
    pub id: ApiId,
    pub name: String,
    pub description: String,
    pub profile_url: String,
    pub image_url: String,
}

impl From<Candidate> for CandidateDesc {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            description: candidate.candidate.description,
            profile_url: candidate.candidate.profile_url,
            image_url: candidate.candidate.image_url,
        }
    }
}

/// One candidate's share of the vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: ApiId,
    pub name: String,
    pub votes: u64,
    /// Percentage of all votes, to one decimal place.
    pub percentage: f64,
}

/// Someone who has voted. Their choice is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterSummary {
    pub name: String,
    pub profile_url: String,
    pub voted_at: DateTime<Utc>,
}

/// Everything shown once a voter has cast their vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub total_votes: u64,
    /// Most votes first.
    pub candidates: Vec<CandidateResult>,
    pub leader: Option<CandidateResult>,
    /// The leader's margin over the runner-up is within 5% of all votes.
    pub close_race: bool,
    pub voters: Vec<VoterSummary>,
}

impl Results {
    pub fn tally(candidates: Vec<Candidate>, voters: &[Voter]) -> Self {
        let total_votes: u64 = candidates.iter().map(|c| c.vote_count).sum();

        let mut results: Vec<CandidateResult> = candidates
            .into_iter()
            .map(|candidate| CandidateResult {
                id: candidate.id.into(),
                percentage: percentage(candidate.vote_count, total_votes),
                votes: candidate.vote_count,
                name: candidate.candidate.name,
            })
            .collect();
        results.sort_by(|a, b| b.votes.cmp(&a.votes));

        let leader = results.first().cloned();
        let close_race = match (results.first(), results.get(1)) {
            (Some(first), Some(second)) => {
                let margin = first.votes - second.votes;
                // ceil(5% of total)
                margin <= (total_votes * 5 + 99) / 100
            }
            _ => false,
        };

        let voters = voters
            .iter()
            .filter(|voter| voter.has_voted)
            .map(|voter| VoterSummary {
                name: voter.display_name.clone(),
                profile_url: voter.profile_url.clone(),
                // Records latched before the vote time was kept fall back to
                // their last update.
                voted_at: voter.voted_at.unwrap_or(voter.updated_at),
            })
            .collect();

        Self {
            total_votes,
            candidates: results,
            leader,
            close_race,
            voters,
        }
    }
}

fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 / total as f64 * 1000.0).round() / 10.0
}
