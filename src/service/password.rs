//! Password accounts: registration, login, and the reset-by-email flow.

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    credentials::{
        hash_password, hash_reset_token, is_strong_enough, verify_password, RawResetToken,
        MIN_PASSWORD_LENGTH,
    },
    db::voter::{AuthMethod, NewVoter, Profile, ResetToken, Voter},
    identity::Normalizer,
    mail::ResetMailer,
    store::{CredentialStore, StoreError},
};

/// The only thing a reset request ever reports, whether or not the account
/// exists.
pub const RESET_CONFIRMATION: &str =
    "If an account exists with this email, a password reset link has been sent.";

fn check_strength(password: &str) -> Result<()> {
    if is_strong_enough(password) {
        Ok(())
    } else {
        Err(Error::WeakPassword(MIN_PASSWORD_LENGTH))
    }
}

/// Create a password account.
pub async fn register(
    store: &dyn CredentialStore,
    normalizer: &Normalizer,
    name: &str,
    raw_email: &str,
    raw_password: &str,
    now: DateTime<Utc>,
) -> Result<Voter> {
    check_strength(raw_password)?;
    let identity = normalizer.normalize(raw_email)?;
    if store.voter_by_identity(&identity).await?.is_some() {
        return Err(Error::EmailTaken);
    }

    let profile = Profile {
        name: name.trim().to_string(),
        avatar_url: None,
    };
    let mut voter = NewVoter::new(raw_email, identity, profile, AuthMethod::Password, now);
    voter.password_hash = Some(hash_password(raw_password)?);

    match store.insert_voter(voter).await {
        Ok(voter) => {
            info!("Registered voter {}", voter.id);
            Ok(voter)
        }
        Err(StoreError::Duplicate(_)) => Err(Error::EmailTaken),
        Err(e) => Err(e.into()),
    }
}

/// Check a password. Every way of failing looks the same to the caller.
pub async fn login(
    store: &dyn CredentialStore,
    normalizer: &Normalizer,
    raw_email: &str,
    raw_password: &str,
) -> Result<Voter> {
    let identity = normalizer
        .normalize(raw_email)
        .map_err(|_| Error::InvalidCredentials)?;
    let voter = store
        .voter_by_identity(&identity)
        .await?
        .ok_or(Error::InvalidCredentials)?;

    match &voter.password_hash {
        Some(hash) if verify_password(hash, raw_password) => Ok(voter),
        _ => Err(Error::InvalidCredentials),
    }
}

/// Email a reset link if a password account exists for `raw_email`.
///
/// Never fails observably: internal errors are logged and the same
/// [`RESET_CONFIRMATION`] is returned regardless.
pub async fn request_reset(
    store: &dyn CredentialStore,
    mailer: &dyn ResetMailer,
    normalizer: &Normalizer,
    config: &Config,
    raw_email: &str,
    now: DateTime<Utc>,
) -> &'static str {
    match issue_reset(store, mailer, normalizer, config, raw_email, now).await {
        Ok(()) => {}
        Err(Error::Delivery(e)) => error!("Issued a reset token but could not send it: {e}"),
        Err(e) => error!("Failed to issue a reset token: {e}"),
    }
    RESET_CONFIRMATION
}

async fn issue_reset(
    store: &dyn CredentialStore,
    mailer: &dyn ResetMailer,
    normalizer: &Normalizer,
    config: &Config,
    raw_email: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let identity = match normalizer.normalize(raw_email) {
        Ok(identity) => identity,
        Err(e) => {
            debug!("Ignoring reset request: {e}");
            return Ok(());
        }
    };
    let voter = match store.voter_by_identity(&identity).await? {
        Some(voter) if voter.password_hash.is_some() => voter,
        _ => {
            info!("Reset requested for an address with no password account");
            return Ok(());
        }
    };

    // A newer token replaces any older one.
    let token = RawResetToken::generate();
    let expires_at = now + config.reset_ttl();
    let stored = ResetToken {
        hash: token.hash(),
        expires_at,
    };
    store.set_reset_token(voter.id, stored, now).await?;
    info!("Issued reset token for voter {}", voter.id);

    mailer
        .send_reset_link(
            &voter.display_email,
            &voter.display_name,
            &config.reset_link(token.as_str()),
            expires_at,
        )
        .await?;
    Ok(())
}

/// Redeem a reset token for a new password. Each token works once, and only
/// before it expires.
pub async fn confirm_reset(
    store: &dyn CredentialStore,
    raw_token: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    check_strength(new_password)?;
    let token_hash = hash_reset_token(raw_token.trim());
    let password_hash = hash_password(new_password)?;

    match store
        .consume_reset_token(&token_hash, password_hash, now)
        .await?
    {
        Some(voter) => {
            info!("Password reset for voter {}", voter.id);
            Ok(())
        }
        None => {
            if store.discard_reset_token(&token_hash, now).await? {
                info!("Discarded an expired reset token");
            }
            Err(Error::InvalidOrExpiredToken)
        }
    }
}
