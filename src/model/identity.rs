//! Email normalization: mapping a raw address onto the canonical identity
//! that keys exactly one voter.

use std::fmt::{Display, Formatter};
use std::ops::Deref;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A mailbox provider whose addressing ignores certain punctuation in the
/// local part, so that e.g. `j.doe@gmail.com` and `jdoe@gmail.com` reach the
/// same inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRule {
    /// Lower-case domain this rule applies to.
    pub domain: &'static str,
    /// Characters removed from the local part.
    pub ignored: &'static [char],
}

/// The providers we currently know about.
pub const DEFAULT_RULES: &[DomainRule] = &[
    DomainRule {
        domain: "gmail.com",
        ignored: &['.'],
    },
    DomainRule {
        domain: "googlemail.com",
        ignored: &['.'],
    },
];

/// The raw string could not be split into a local part and a domain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid email address")]
pub struct InvalidEmail(pub String);

/// A normalized email address. Two raw addresses with equal canonical
/// identities belong to the same person for all purposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalIdentity(String);

impl CanonicalIdentity {
    /// Wrap an already-normalized key, e.g. one read back from a session token.
    /// No normalization is performed.
    pub fn from_normalized(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for CanonicalIdentity {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for CanonicalIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&CanonicalIdentity> for Bson {
    fn from(identity: &CanonicalIdentity) -> Self {
        Bson::String(identity.0.clone())
    }
}

/// A table-driven email normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<DomainRule>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_rules(DEFAULT_RULES.iter().cloned())
    }
}

impl Normalizer {
    /// A normalizer applying exactly the given domain rules.
    pub fn with_rules(rules: impl IntoIterator<Item = DomainRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Normalize a raw address: trim and lower-case the whole thing, then apply
    /// the matching domain rule to the local part, if any.
    pub fn normalize(&self, raw_email: &str) -> Result<CanonicalIdentity, InvalidEmail> {
        let lowered = raw_email.trim().to_lowercase();
        let invalid = || InvalidEmail(raw_email.to_string());

        let (local, domain) = lowered.split_once('@').ok_or_else(invalid)?;
        if domain.contains('@') || domain.is_empty() {
            return Err(invalid());
        }

        let local = match self.rules.iter().find(|rule| rule.domain == domain) {
            Some(rule) => local.replace(rule.ignored, ""),
            None => local.to_string(),
        };
        if local.is_empty() {
            return Err(invalid());
        }

        Ok(CanonicalIdentity(format!("{local}@{domain}")))
    }
}

/// Normalize with the default rule table.
pub fn normalize(raw_email: &str) -> Result<CanonicalIdentity, InvalidEmail> {
    Normalizer::default().normalize(raw_email)
}
