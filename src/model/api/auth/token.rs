use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rocket::{
    http::{Cookie, SameSite},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::identity::CanonicalIdentity;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// A long-lived session token naming a canonical identity.
///
/// It deliberately carries nothing else: vote status, profile, and even the
/// voter ID are re-read from the store on every request (see
/// [`crate::service::session`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "sub")]
    pub identity: CanonicalIdentity,
}

impl AuthToken {
    pub fn new(identity: CanonicalIdentity) -> Self {
        Self { identity }
    }

    /// Serialize this token into a signed cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish())
    }

    /// Deserialize a token from a cookie, checking signature and expiry.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self> {
        let claims = jsonwebtoken::decode::<Claims>(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )?;
        Ok(claims.claims.token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        // Forward to any routes that do not require an authentication token.
        let cookie = try_outcome!(req.cookies().get(AUTH_TOKEN_COOKIE).or_forward(()));

        // Decode the token; a bad or expired cookie is treated as signed out.
        match Self::from_cookie(cookie, config) {
            Ok(token) => Outcome::Success(token),
            Err(e) => {
                debug!("Rejected session cookie: {e}");
                Outcome::Forward(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::identity::normalize;

    #[test]
    fn cookie_round_trip_keeps_identity() {
        let config = Config::example();
        let identity = normalize("J.Doe@gmail.com").unwrap();
        let cookie = AuthToken::new(identity.clone()).into_cookie(&config).unwrap();
        assert_eq!(cookie.name(), AUTH_TOKEN_COOKIE);
        assert!(cookie.http_only().unwrap_or(false));

        let token = AuthToken::from_cookie(&cookie, &config).unwrap();
        assert_eq!(token.identity, identity);
    }

    #[test]
    fn cookie_signed_with_other_secret_is_rejected() {
        let config = Config::example();
        let cookie = AuthToken::new(normalize("a@b.com").unwrap())
            .into_cookie(&config)
            .unwrap();

        let other = Config::example_with_secret("a different secret");
        assert!(matches!(
            AuthToken::from_cookie(&cookie, &other),
            Err(Error::Jwt(_))
        ));
    }
}
