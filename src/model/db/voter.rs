use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, Bson};
use serde::{Deserialize, Serialize};

use crate::model::{identity::CanonicalIdentity, mongodb::Id};

/// The ways a voter can prove who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Email and password held by us.
    Password,
    /// Google sign-in.
    Google,
    /// LinkedIn sign-in.
    LinkedIn,
}

impl Display for AuthMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Password => "password",
            Self::Google => "google",
            Self::LinkedIn => "linkedin",
        };
        write!(f, "{name}")
    }
}

impl From<AuthMethod> for Bson {
    fn from(method: AuthMethod) -> Self {
        Bson::String(method.to_string())
    }
}

/// Presentation metadata supplied by whichever sign-in method was used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// An open password-reset window. Only the SHA-256 of the emailed token is
/// ever stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetToken {
    /// Lower-case hex SHA-256 of the raw token.
    pub hash: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// Is this token still usable at time `now`?
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// The address last used to authenticate, as typed (trimmed). Display only.
    pub display_email: String,
    /// The true identity key. Unique across all voters. Empty only on records
    /// that predate it, until the backfill runs.
    #[serde(default)]
    pub canonical_identity: CanonicalIdentity,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Argon2 encoded hash; absent for voters who never registered a password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Professional profile link, empty until supplied. Required to vote.
    #[serde(default)]
    pub profile_url: String,
    /// One-way latch.
    #[serde(default)]
    pub has_voted: bool,
    /// Present iff `has_voted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voted_candidate_id: Option<Id>,
    /// When the latch was set. Later writes never move it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_bson_datetime"
    )]
    pub voted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<ResetToken>,
    /// Every method ever used to sign in. Reporting only; never trusted.
    #[serde(default)]
    pub auth_methods: BTreeSet<AuthMethod>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl VoterCore {
    /// Create a voter that has not voted, signed in for the first time via `method`.
    pub fn new(
        raw_email: &str,
        canonical_identity: CanonicalIdentity,
        profile: Profile,
        method: AuthMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            display_email: raw_email.trim().to_string(),
            canonical_identity,
            display_name: profile.name,
            avatar_url: profile.avatar_url,
            password_hash: None,
            profile_url: String::new(),
            has_voted: false,
            voted_candidate_id: None,
            voted_at: None,
            reset_token: None,
            auth_methods: BTreeSet::from([method]),
            created_at: now,
            updated_at: now,
        }
    }

    /// Has the voter supplied the profile link needed before voting?
    pub fn has_profile(&self) -> bool {
        !self.profile_url.is_empty()
    }
}

/// `chrono_datetime_as_bson_datetime` for optional fields.
mod optional_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson::DateTime as BsonDateTime;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(BsonDateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<BsonDateTime>::deserialize(deserializer)?.map(BsonDateTime::to_chrono))
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::identity::normalize;

    impl Profile {
        pub fn example() -> Self {
            Self {
                name: "Jane Doe".to_string(),
                avatar_url: Some("https://avatars.example.com/jdoe.png".to_string()),
            }
        }
    }

    impl VoterCore {
        pub fn example() -> Self {
            let email = "J.Doe@gmail.com";
            Self::new(
                email,
                normalize(email).unwrap(),
                Profile::example(),
                AuthMethod::Google,
                Utc::now(),
            )
        }
    }
}
