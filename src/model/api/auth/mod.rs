mod provider;
mod request;
mod token;

pub use provider::{ExternalProvider, ProviderAssertion};
pub use request::{
    LoginRequest, Message, ProviderSignInRequest, RegisterRequest, ResetConfirmRequest,
    ResetRequest,
};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
