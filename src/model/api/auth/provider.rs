use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::model::db::voter::{AuthMethod, Profile};

/// The outcome of an external provider handshake, as vouched for by the
/// component that ran it. Arrives as an HS256 JWT signed with the shared
/// provider secret, so the email inside can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAssertion {
    pub provider: ExternalProvider,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    /// Expiry, as seconds since the epoch.
    pub exp: i64,
}

/// The external identity providers we accept assertions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalProvider {
    Google,
    LinkedIn,
}

impl From<ExternalProvider> for AuthMethod {
    fn from(provider: ExternalProvider) -> Self {
        match provider {
            ExternalProvider::Google => AuthMethod::Google,
            ExternalProvider::LinkedIn => AuthMethod::LinkedIn,
        }
    }
}

impl ProviderAssertion {
    /// Verify and decode a signed assertion.
    pub fn verify(signed: &str, config: &Config) -> Result<Self> {
        let data = jsonwebtoken::decode::<Self>(
            signed,
            &DecodingKey::from_secret(config.provider_secret()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    /// The presentation metadata carried by this assertion.
    pub fn profile(&self) -> Profile {
        Profile {
            name: self.name.clone(),
            avatar_url: self.picture.clone(),
        }
    }
}


#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::error::Error;

    #[test]
    fn verifies_signed_assertion() {
        let config = Config::example();
        let assertion = ProviderAssertion::example(ExternalProvider::LinkedIn, "jdoe@gmail.com");
        let verified = ProviderAssertion::verify(&assertion.sign(&config), &config).unwrap();
        assert_eq!(verified, assertion);
        assert_eq!(AuthMethod::from(verified.provider), AuthMethod::LinkedIn);
    }

    #[test]
    fn rejects_forged_and_expired_assertions() {
        let config = Config::example();
        let forger = Config::example_with_secret("forged");
        let assertion = ProviderAssertion::example(ExternalProvider::Google, "jdoe@gmail.com");
        assert!(matches!(
            ProviderAssertion::verify(&assertion.sign(&forger), &config),
            Err(Error::Jwt(_))
        ));

        let mut expired = assertion;
        expired.exp = (Utc::now() - Duration::hours(1)).timestamp();
        assert!(matches!(
            ProviderAssertion::verify(&expired.sign(&config), &config),
            Err(Error::Jwt(_))
        ));
    }
}
