use serde::{Deserialize, Serialize};

/// Create a password account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Sign in with a password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Sign in with the result of an external provider handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSignInRequest {
    /// A signed [`super::ProviderAssertion`].
    pub assertion: String,
}

/// Ask for a reset link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Redeem a reset link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub password: String,
}

/// A human-readable confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
