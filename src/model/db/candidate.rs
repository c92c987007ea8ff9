use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    pub description: String,
    /// Link to the candidate's professional profile.
    pub profile_url: String,
    pub image_url: String,
    /// Number of votes received. Never decreases under normal operation.
    #[serde(default)]
    pub vote_count: u64,
}

impl CandidateCore {
    /// A fresh candidate with no votes.
    pub fn new(name: String, description: String, profile_url: String, image_url: String) -> Self {
        Self {
            name,
            description,
            profile_url,
            image_url,
            vote_count: 0,
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example1() -> Self {
            Self::new(
                "Ada Lovelace".to_string(),
                "Analytical engines and beyond.".to_string(),
                "https://www.linkedin.com/in/ada-lovelace/".to_string(),
                "/images/ada.jpeg".to_string(),
            )
        }

        pub fn example2() -> Self {
            Self::new(
                "Grace Hopper".to_string(),
                "Compilers, COBOL, and nanoseconds.".to_string(),
                "https://www.linkedin.com/in/grace-hopper/".to_string(),
                "/images/grace.jpeg".to_string(),
            )
        }
    }
}
