use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::logging::RequestId;
use crate::model::{identity::InvalidEmail, mail::DeliveryError, mongodb::Id, store::StoreError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Validation.
    #[error(transparent)]
    InvalidEmail(#[from] InvalidEmail),
    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("Profile URL must be a {0} link")]
    InvalidProfileUrl(&'static str),
    #[error("A profile URL is required before voting")]
    ProfileRequired,
    // Conflicts and lookups.
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Voter has already voted")]
    AlreadyVoted,
    #[error("No candidate with ID {0}")]
    UnknownCandidate(Id),
    #[error("Voter not found")]
    VoterNotFound,
    // Authentication. Deliberately vague.
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,
    #[error("Not signed in")]
    Unauthenticated,
    #[error("Results are only visible once you have voted")]
    NotYetVoted,
    // Infrastructure.
    #[error("Credential store unavailable: {0}")]
    IdentityStoreUnavailable(#[from] StoreError),
    #[error("Failed to deliver reset link: {0}")]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
}

impl Error {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidEmail(_)
            | Self::WeakPassword(_)
            | Self::InvalidProfileUrl(_)
            | Self::ProfileRequired => Status::BadRequest,
            Self::EmailTaken | Self::AlreadyVoted => Status::Conflict,
            Self::UnknownCandidate(_) | Self::VoterNotFound => Status::NotFound,
            Self::InvalidCredentials | Self::Unauthenticated => Status::Unauthorized,
            Self::NotYetVoted => Status::Forbidden,
            Self::InvalidOrExpiredToken => Status::BadRequest,
            Self::IdentityStoreUnavailable(_) => Status::ServiceUnavailable,
            Self::Delivery(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let id = RequestId::of(req);
        let status = self.status();
        if status.code >= 500 {
            error!("  req{id}: {self}");
        } else {
            warn!("  req{id}: {self}");
        }
        Err(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_errors_do_not_leak_detail() {
        assert_eq!(Error::InvalidCredentials.to_string(), "Invalid email or password");
        assert_eq!(
            Error::InvalidOrExpiredToken.to_string(),
            "Invalid or expired reset token"
        );
    }

    #[test]
    fn conflicts_map_to_409() {
        assert_eq!(Error::AlreadyVoted.status(), Status::Conflict);
        assert_eq!(Error::EmailTaken.status(), Status::Conflict);
        assert_eq!(Error::UnknownCandidate(Id::new()).status(), Status::NotFound);
    }
}
